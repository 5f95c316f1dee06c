//! Persisted record shapes

pub mod coaching;
pub mod compatibility;
pub mod identity;
pub mod match_profile;

pub use coaching::*;
pub use compatibility::*;
pub use identity::*;
pub use match_profile::*;

//! # Wingman Common Library
//!
//! Persistence shared by the Wingman crates:
//! - Versioned document store (schema chain, migrations, table shapes)
//! - Record models for match profiles, the user identity, coaching history
//!   and the inference audit log
//! - Legacy aspect → virtue compatibility model conversion
//! - Typed store access and store-change events
//! - Configuration loading

pub mod compat_migration;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod store;

pub use error::{Error, Result};
pub use events::{EventBus, StoreEvent};
pub use store::{ArtifactStore, IdentityRepository, SessionGuard};

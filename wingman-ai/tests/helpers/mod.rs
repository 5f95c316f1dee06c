//! Test Helper Utilities
//!
//! Scripted stand-ins for the inference service and media extractor, plus
//! payload and record fixtures.

#![allow(dead_code)]

pub mod fixtures;
pub mod scripted;

pub use fixtures::*;
pub use scripted::{Behavior, ScriptedInference, StaticFrames};

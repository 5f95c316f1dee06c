//! Document store plumbing: connection setup, schema shapes and migrations

pub mod init;
pub mod migrations;
pub mod schema_sync;
pub mod versions;

pub use init::*;
pub use migrations::*;
pub use schema_sync::*;
pub use versions::{
    schema_versions, COACHING_SESSIONS, CURRENT_SCHEMA_VERSION, INFERENCE_RECORDS, MATCH_PROFILES,
    USER_IDENTITY,
};

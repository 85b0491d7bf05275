//! Persistent relay state across invocations.
//!
//! * `config.json`: durable settings, merged with the project file
//! * `preferences.json`: front-end preferences ([`JsonPreferenceStore`])
//! * `sessions.json`: containers that can be resumed ([`SessionStateStore`])

pub mod preferences;
pub mod sessions;
pub mod storage;

pub use preferences::JsonPreferenceStore;
pub use sessions::{PersistedSession, SessionStateStore};
pub use storage::StatePaths;

//! Configuration management
//!
//! Handles connection profiles and the persisted user preferences.

pub mod connections;
pub mod preferences;

pub use connections::{CONNECT_TIMEOUT, ConnectionProfile, SslMode};
pub use preferences::{PreferenceStore, SplitterState, WindowState};

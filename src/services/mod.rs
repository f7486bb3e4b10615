pub mod toggle_service;

pub use toggle_service::{toggle_server, ToggleOutcome};

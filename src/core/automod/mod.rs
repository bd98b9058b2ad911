// Core auto-moderation module - sliding-window detectors and the service
// that runs them against per-guild configuration.

pub mod automod_models;
pub mod automod_service;
pub mod detectors;
pub mod event_window;

pub use automod_models::*;
pub use automod_service::{AutomodConfigStore, AutomodError, AutomodService};

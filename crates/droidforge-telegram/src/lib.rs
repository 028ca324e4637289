//! Telegram gateway for DroidForge.
//!
//! Translates chat commands into build-target configuration and build
//! attempts, and delivers built artifacts (or failure logs) back to the
//! chat. All build mechanics live in `droidforge-orchestrator`; this crate
//! only speaks Telegram.

pub mod admin;
pub mod bot;
pub mod callback;
pub mod error;
pub mod github;
pub mod handlers;
pub mod logtoken;
pub mod state;

pub use bot::DroidForgeBot;
pub use error::{Result, TelegramError};
pub use state::{create_shared_state, BotState};

//! Source code for the recruit ledger bot: a blacklist of flagged passports,
//! an intake pipeline where managers approve or reject recruits, and a
//! leaderboard of recruiters by approved recruits.
//!
//! The core ([`blacklist`], [`recruits`], [`ranking`] and [`store`]) knows
//! nothing about Telegram. All IDs of people, chats and messages are opaque
//! strings there.

/// Record types and the rules for changing them.
pub mod types;

/// Record ID generation.
pub mod ids;

/// Durable storage, as JSON files or SQLite.
pub mod store;

/// Configuration from the environment.
pub mod config;

/// Blacklist of flagged passports.
pub mod blacklist;

/// Recruit request lifecycle.
pub mod recruits;

/// Recruiter leaderboard.
pub mod ranking;

/// HTML texts and inline keyboards for Telegram.
mod render;

/// Functions that handle events from Telegram.
mod handlers;

/// Entry function that starts the bot.
mod entry;
pub use entry::*;

//! `dogstory_client`
//!
//! Client-side systems:
//! - Input tracking and movement command generation
//! - Snapshot reconciliation (players, roster, loot lifecycle)
//! - Interpolation between sparse snapshots
//! - Fetch scheduling against the game server
//! - A headless scene for terminal runs and tests

pub mod client;
pub mod headless;
pub mod http;
pub mod input;
pub mod interp;
pub mod state;

pub use client::GameClient;

//! `dogstory_shared`
//!
//! Shared libraries used by the client crates and their tests.
//!
//! Design goals:
//! - Deterministic and modular where practical.
//! - Clear separation of concerns (wire types, math, map, config, scene).
//! - Traits for abstraction and dependency injection.
//! - No `unsafe`.

pub mod config;
pub mod error;
pub mod map;
pub mod math;
pub mod net;
pub mod render;


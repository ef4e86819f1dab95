//! # summon-relay-store
//!
//! Storage for the summon result relay.
//!
//! This crate provides:
//! - `ResultStore` trait and the file-backed single-slot `FsResultStore`
//! - `CreatureAssets` for creature profiles and model artifacts
//! - Bounded poll windows for artifacts written by the desktop agent
//! - `RelayConfig`

pub mod assets;
pub mod config;
pub mod results;
pub mod wait;

pub use assets::{CreatureAssets, ModelFiles, SummonStatus};
pub use config::RelayConfig;
pub use results::{FsResultStore, ResultStore};
pub use wait::{PollWindow, poll_until};

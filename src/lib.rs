//! atlaswatch - font atlas rebuild service
//!
//! Regenerates signed-distance-field font atlases and their metric tables
//! whenever a font's character list changes, and writes them back into the
//! project's font assets.

pub mod asset;
pub mod atlas;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod output;
pub mod progress;
pub mod task;
pub mod updater;
pub mod watch;

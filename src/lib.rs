//! cachecheck - configuration cache verification for build-tool plugins
//!
//! Writes a synthetic project, runs the build tool against it twice with
//! the configuration cache enabled, and checks that the first run stores a
//! clean cache entry and the second run reuses it.

pub mod cli;
pub mod config;
pub mod error;
pub mod expect;
pub mod fixture;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod ui;

pub use error::{HarnessError, HarnessResult};

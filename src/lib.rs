//! # release-pilot
//!
//! Semantic version lifecycle for repositories driven by Git and pull request
//! events.
//!
//! A run classifies the triggering event into a [`event::RuntimeContext`],
//! fixes or upgrades the version declared in project files, performs the
//! resulting git, changelog and pull request side effects, and reports a
//! build/publish [`release::Decision`].
//!
//! ## Quick Start
//!
//! ```rust
//! use release_pilot::version::create_next_version;
//!
//! let next = create_next_version("1.2.3");
//! assert_eq!(next.next_minor.as_deref(), Some("1.3.0"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod changelog;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod git;
pub mod github;
pub mod output;
pub mod release;
pub mod utils;
pub mod version;

pub use crate::cli::Cli;
pub use crate::error::ReleaseError;

/// The current version of release-pilot.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

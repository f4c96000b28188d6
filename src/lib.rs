//! jj-land - land a stack of Jujutsu revisions through their pull requests
//!
//! Given a linear stack of revisions that each already have an open PR, this
//! library merges them into trunk one at a time, bottom up. Between merges it
//! rebases the remaining revisions onto the new trunk, pushes them, and
//! retargets the next PR's base so the platform always sees an up-to-date PR.
//!
//! # Architecture
//!
//! - [`stack`] - the revision/stack model shown to the user
//! - [`merge`] - the orchestration engine: a pure state machine plus the
//!   async runner that executes its commands one at a time
//! - [`repo`] - the version-control backend (`jj` CLI)
//! - [`platform`] - the review platform (GitHub)
//!
//! All I/O is async and state is passed explicitly (no globals).

pub mod auth;
pub mod config;
pub mod error;
pub mod merge;
pub mod platform;
pub mod repo;
pub mod stack;
pub mod types;

pub use error::{Error, Result};
pub use types::*;

//! Time-bucketed contributor rankings from git history.
//!
//! The [`tally`] module holds the engine: it turns an oldest-first stream of
//! [`model::Commit`]s into a [`tally::TimeSeries`] whose buckets name the top
//! author by commits, files touched or lines changed. [`git`] supplies such a
//! stream from a repository; [`cli`] wires both into the `gtally` binary.

pub mod cli;
pub mod error;
pub mod git;
pub mod model;
pub mod rank;
pub mod tally;
pub mod timeline;

pub use error::{GtallyError, Result, TallyFailure};

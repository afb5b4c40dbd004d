//! Time-bucketed author tallies.
//!
//! Commits are streamed once, oldest first, into a gap-free series of buckets
//! whose size depends on how much history is covered. Each bucket keeps a
//! running [`Tally`] per author key and can be ranked by a [`Metric`].

pub mod author;
pub mod bucket;
pub mod parallel;
pub mod resolution;

pub use author::{rank, total, FinalTally, KeyFn, Metric, Tally, TallyMode, TallyOpts};
pub use bucket::{tally_commits_by_date, tally_commits_with_resolution, TimeBucket, TimeSeries};
pub use parallel::tally_commits_parallel;
pub use resolution::Resolution;

//! Per-author tallies, tally modes and ranking.

use crate::error::{GtallyError, Result};
use crate::model::Commit;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// What the user asked to rank authors by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum TallyMode {
    Commits,
    Files,
    Lines,
    /// Blame-style attribution. Not implemented.
    LastModified,
}

impl TallyMode {
    /// The metric backing this mode, or an error for modes that cannot be
    /// tallied by date.
    pub fn metric(self) -> Result<Metric> {
        match self {
            TallyMode::Commits => Ok(Metric::Commits),
            TallyMode::Files => Ok(Metric::Files),
            TallyMode::Lines => Ok(Metric::Lines),
            TallyMode::LastModified => Err(GtallyError::UnsupportedMode(self)),
        }
    }
}

impl fmt::Display for TallyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TallyMode::Commits => "commits",
            TallyMode::Files => "files",
            TallyMode::Lines => "lines",
            TallyMode::LastModified => "last-modified",
        };
        f.write_str(s)
    }
}

/// Scalar extracted from a [`FinalTally`] to order authors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Commits,
    Files,
    Lines,
}

impl Metric {
    pub fn score(self, tally: &FinalTally) -> u64 {
        match self {
            Metric::Commits => tally.commits,
            Metric::Files => tally.file_count,
            Metric::Lines => tally.lines_changed(),
        }
    }
}

impl From<Metric> for TallyMode {
    fn from(metric: Metric) -> Self {
        match metric {
            Metric::Commits => TallyMode::Commits,
            Metric::Files => TallyMode::Files,
            Metric::Lines => TallyMode::Lines,
        }
    }
}

pub type KeyFn = Arc<dyn Fn(&Commit) -> String + Send + Sync>;

/// Options for a tally run: the mode and the author grouping key.
#[derive(Clone)]
pub struct TallyOpts {
    pub mode: TallyMode,
    pub key: KeyFn,
}

impl TallyOpts {
    pub fn new<F>(mode: TallyMode, key: F) -> Self
    where
        F: Fn(&Commit) -> String + Send + Sync + 'static,
    {
        Self {
            mode,
            key: Arc::new(key),
        }
    }

    /// Group authors by email, ignoring case and surrounding whitespace.
    pub fn by_email(mode: TallyMode) -> Self {
        Self::new(mode, |c: &Commit| c.author_email.trim().to_lowercase())
    }

    /// Group authors by display name.
    pub fn by_name(mode: TallyMode) -> Self {
        Self::new(mode, |c: &Commit| c.author_name.trim().to_string())
    }

    pub fn metric(&self) -> Result<Metric> {
        self.mode.metric()
    }

    pub fn key_for(&self, commit: &Commit) -> String {
        (self.key)(commit)
    }
}

impl fmt::Debug for TallyOpts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TallyOpts")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Running totals for one author inside one bucket.
///
/// The display identity is taken from the earliest commit folded in, with the
/// smaller name and email winning ties, so merging tallies in any order names
/// the author the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    name: String,
    email: String,
    first_seen: Option<DateTime<Utc>>,
    commits: u64,
    added: u64,
    removed: u64,
    fileset: HashSet<String>,
}

impl Tally {
    pub fn for_author(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    /// Fold one commit into the tally.
    pub fn add_commit(&mut self, commit: &Commit) {
        let claim = (
            false,
            Some(commit.timestamp),
            false,
            commit.author_name.as_str(),
            commit.author_email.as_str(),
        );
        if claim < self.identity_key() {
            self.name = commit.author_name.clone();
            self.email = commit.author_email.clone();
            self.first_seen = Some(commit.timestamp);
        }

        self.commits += 1;
        for diff in &commit.file_diffs {
            self.added += diff.lines_added;
            self.removed += diff.lines_removed;
            if !self.fileset.contains(&diff.path) {
                self.fileset.insert(diff.path.clone());
            }
        }
    }

    /// Tallies without commits sort last, then empty identities.
    fn identity_key(&self) -> (bool, Option<DateTime<Utc>>, bool, &str, &str) {
        (
            self.first_seen.is_none(),
            self.first_seen,
            self.name.is_empty() && self.email.is_empty(),
            &self.name,
            &self.email,
        )
    }

    fn absorb(&mut self, other: &Tally) {
        self.commits += other.commits;
        self.added += other.added;
        self.removed += other.removed;
        self.fileset.extend(other.fileset.iter().cloned());
    }

    /// Add another tally's counts into this one.
    pub fn merge(&mut self, other: &Tally) {
        if other.identity_key() < self.identity_key() {
            self.name = other.name.clone();
            self.email = other.email.clone();
            self.first_seen = other.first_seen;
        }
        self.absorb(other);
    }

    pub fn combine(mut self, other: Tally) -> Tally {
        self.merge(&other);
        self
    }

    pub fn final_tally(&self) -> FinalTally {
        FinalTally {
            name: self.name.clone(),
            email: self.email.clone(),
            commits: self.commits,
            file_count: self.fileset.len() as u64,
            lines_added: self.added,
            lines_removed: self.removed,
        }
    }
}

/// Frozen view of a [`Tally`], used for display and ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalTally {
    pub name: String,
    pub email: String,
    pub commits: u64,
    pub file_count: u64,
    pub lines_added: u64,
    pub lines_removed: u64,
}

impl FinalTally {
    pub fn lines_changed(&self) -> u64 {
        self.lines_added + self.lines_removed
    }
}

/// Order tallies best-first by `metric`.
///
/// Ties are broken by ascending author key, so the result never depends on
/// map iteration order.
pub fn rank(tallies: &HashMap<String, Tally>, metric: Metric) -> Vec<FinalTally> {
    let mut finals: Vec<(&str, FinalTally)> = tallies
        .iter()
        .map(|(key, tally)| (key.as_str(), tally.final_tally()))
        .collect();

    finals.sort_by(|(key_a, a), (key_b, b)| {
        metric
            .score(b)
            .cmp(&metric.score(a))
            .then_with(|| key_a.cmp(key_b))
    });

    finals.into_iter().map(|(_, tally)| tally).collect()
}

/// Sum of every tally in the map, with no author identity attached.
pub fn total(tallies: &HashMap<String, Tally>) -> FinalTally {
    // Counts only; the total never takes an author's identity.
    let mut running = Tally::default();
    for tally in tallies.values() {
        running.absorb(tally);
    }
    running.final_tally()
}

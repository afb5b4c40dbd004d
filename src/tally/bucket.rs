//! Time buckets, time series and the by-date tally.

use super::author::{rank, total, FinalTally, Metric, Tally, TallyOpts};
use super::resolution::Resolution;
use crate::error::{GtallyError, Result, TallyFailure};
use crate::model::Commit;
use chrono::{DateTime, FixedOffset, Offset, TimeZone};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::iter;
use tracing::{debug, warn};

/// One interval of a [`TimeSeries`] and the per-author tallies inside it.
///
/// `tally` and `total_tally` are views computed by [`TimeBucket::rank`];
/// they stay zero-valued until the bucket is ranked or when it is empty.
#[derive(Debug, Clone, Serialize)]
pub struct TimeBucket {
    pub name: String,
    pub time: DateTime<FixedOffset>,
    /// Winning author's tally
    pub tally: FinalTally,
    /// Sum over every author in the bucket
    pub total_tally: FinalTally,
    #[serde(skip)]
    ranked_by: Option<Metric>,
    #[serde(skip)]
    tallies: HashMap<String, Tally>,
}

impl TimeBucket {
    pub fn new(name: impl Into<String>, time: DateTime<FixedOffset>) -> Self {
        Self {
            name: name.into(),
            time,
            tally: FinalTally::default(),
            total_tally: FinalTally::default(),
            ranked_by: None,
            tallies: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }

    /// Metric the cached views were computed with, if any.
    pub fn ranked_by(&self) -> Option<Metric> {
        self.ranked_by
    }

    /// Fold `commit` into the tally stored under `key`.
    pub fn record(&mut self, key: String, commit: &Commit) {
        self.tallies
            .entry(key)
            .or_insert_with(|| Tally::for_author(&commit.author_name, &commit.author_email))
            .add_commit(commit);
    }

    pub fn value(&self, metric: Metric) -> u64 {
        metric.score(&self.tally)
    }

    pub fn total_value(&self, metric: Metric) -> u64 {
        metric.score(&self.total_tally)
    }

    /// Every author in the bucket, best first.
    pub fn ranking(&self, metric: Metric) -> Vec<FinalTally> {
        rank(&self.tallies, metric)
    }

    pub fn rank(mut self, metric: Metric) -> Self {
        self.rank_in_place(metric);
        self
    }

    fn rank_in_place(&mut self, metric: Metric) {
        self.ranked_by = Some(metric);
        if self.tallies.is_empty() {
            self.tally = FinalTally::default();
            self.total_tally = FinalTally::default();
            return;
        }
        self.tally = rank(&self.tallies, metric)
            .into_iter()
            .next()
            .unwrap_or_default();
        self.total_tally = total(&self.tallies);
    }

    /// Merge two buckets covering the same interval.
    ///
    /// Tallies under the same author key are summed. The buckets must agree on
    /// both name and start instant.
    pub fn combine(mut self, other: TimeBucket) -> Result<TimeBucket> {
        if self.name != other.name || self.time != other.time {
            return Err(GtallyError::BucketMismatch {
                left: format!("{} ({})", self.name, self.time),
                right: format!("{} ({})", other.name, other.time),
            });
        }

        let ranked_by = self.ranked_by.or(other.ranked_by);
        for (key, tally) in other.tallies {
            let merged = match self.tallies.remove(&key) {
                Some(existing) => existing.combine(tally),
                None => tally,
            };
            self.tallies.insert(key, merged);
        }

        match ranked_by {
            Some(metric) => self.rank_in_place(metric),
            None => {
                self.tally = FinalTally::default();
                self.total_tally = FinalTally::default();
            }
        }
        Ok(self)
    }
}

/// Time-ascending, gap-free sequence of buckets at a single resolution.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct TimeSeries {
    buckets: Vec<TimeBucket>,
}

impl TimeSeries {
    pub(crate) fn from_buckets(buckets: Vec<TimeBucket>) -> Self {
        Self { buckets }
    }

    pub fn buckets(&self) -> &[TimeBucket] {
        &self.buckets
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimeBucket> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn rank(self, metric: Metric) -> Self {
        Self {
            buckets: self.buckets.into_iter().map(|b| b.rank(metric)).collect(),
        }
    }

    /// Merge two series keyed by bucket start instant.
    ///
    /// Buckets present on both sides are combined, the rest are carried over,
    /// and the result is sorted by time.
    pub fn combine(self, other: TimeSeries) -> Result<TimeSeries> {
        let mut merged: BTreeMap<i64, TimeBucket> = BTreeMap::new();
        for bucket in self.buckets.into_iter().chain(other.buckets) {
            let key = bucket.time.timestamp();
            let bucket = match merged.remove(&key) {
                Some(existing) => existing.combine(bucket)?,
                None => bucket,
            };
            merged.insert(key, bucket);
        }
        Ok(Self {
            buckets: merged.into_values().collect(),
        })
    }

    /// Rank authors over the whole series rather than per bucket.
    pub fn leaderboard(&self, metric: Metric) -> Vec<FinalTally> {
        let mut overall: HashMap<String, Tally> = HashMap::new();
        for bucket in &self.buckets {
            for (key, tally) in &bucket.tallies {
                overall.entry(key.clone()).or_default().merge(tally);
            }
        }
        rank(&overall, metric)
    }
}

impl IntoIterator for TimeSeries {
    type Item = TimeBucket;
    type IntoIter = std::vec::IntoIter<TimeBucket>;

    fn into_iter(self) -> Self::IntoIter {
        self.buckets.into_iter()
    }
}

impl<'a> IntoIterator for &'a TimeSeries {
    type Item = &'a TimeBucket;
    type IntoIter = std::slice::Iter<'a, TimeBucket>;

    fn into_iter(self) -> Self::IntoIter {
        self.buckets.iter()
    }
}

/// Tally commits into a time series with a winning tally per bucket.
///
/// The resolution is chosen from the span between the first commit and `end`.
/// Buckets run from the first commit's bucket up to, but not including, the
/// first bucket starting at or after `end`, and are computed in `end`'s
/// timezone. `commits` must be ordered by non-decreasing timestamp.
///
/// On failure the buckets built so far are returned inside the error.
pub fn tally_commits_by_date<I, E, Tz>(
    commits: I,
    opts: &TallyOpts,
    end: DateTime<Tz>,
) -> std::result::Result<TimeSeries, TallyFailure>
where
    I: IntoIterator<Item = std::result::Result<Commit, E>>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
    Tz: TimeZone,
{
    tally_series(commits, opts, None, end)
}

/// Like [`tally_commits_by_date`], with the bucket resolution fixed by the
/// caller. Used when several partial tallies must line up.
pub fn tally_commits_with_resolution<I, E, Tz>(
    commits: I,
    opts: &TallyOpts,
    resolution: Resolution,
    end: DateTime<Tz>,
) -> std::result::Result<TimeSeries, TallyFailure>
where
    I: IntoIterator<Item = std::result::Result<Commit, E>>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
    Tz: TimeZone,
{
    tally_series(commits, opts, Some(resolution), end)
}

fn tally_series<I, E, Tz>(
    commits: I,
    opts: &TallyOpts,
    resolution: Option<Resolution>,
    end: DateTime<Tz>,
) -> std::result::Result<TimeSeries, TallyFailure>
where
    I: IntoIterator<Item = std::result::Result<Commit, E>>,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
    Tz: TimeZone,
{
    let metric = opts
        .metric()
        .map_err(|e| TallyFailure::new(e, TimeSeries::default()))?;

    let mut commits = commits.into_iter();
    let first = match commits.next() {
        None => return Ok(TimeSeries::default()),
        Some(Err(err)) => {
            let error = GtallyError::stream(err);
            warn!(%error, "commit source failed before the first commit");
            return Err(TallyFailure::new(error, TimeSeries::default()));
        }
        Some(Ok(first)) => first,
    };

    let tz = end.timezone();
    let resolution =
        resolution.unwrap_or_else(|| Resolution::for_span(&first.timestamp, &end));
    let mut buckets = init_buckets(
        resolution,
        &first.timestamp.with_timezone(&tz),
        &end,
    );
    debug!(
        %resolution,
        buckets = buckets.len(),
        first = %first.timestamp,
        "allocated time buckets"
    );

    let mut cursor = 0;
    let mut tallied = 0usize;
    for item in iter::once(Ok(first)).chain(commits) {
        let commit = match item {
            Ok(commit) => commit,
            Err(err) => {
                let error = GtallyError::stream(err);
                warn!(%error, tallied, "commit source failed, returning partial series");
                return Err(partial(error, buckets, metric));
            }
        };

        let local = commit.timestamp.with_timezone(&tz);
        let bucket_time = to_fixed(&resolution.apply(&local));
        cursor = match advance(&buckets, cursor, &bucket_time) {
            Ok(i) => i,
            Err(Misplaced::Before(current)) => {
                let error = GtallyError::CommitOutOfOrder {
                    commit: commit.short_id().to_string(),
                    bucket: resolution.label(&local),
                    current,
                };
                return Err(partial(error, buckets, metric));
            }
            Err(Misplaced::After) => {
                let error = GtallyError::CommitAfterEnd {
                    commit: commit.short_id().to_string(),
                    bucket: resolution.label(&local),
                };
                return Err(partial(error, buckets, metric));
            }
        };

        let key = opts.key_for(&commit);
        buckets[cursor].record(key, &commit);
        tallied += 1;
    }

    debug!(tallied, "tallied commits by date");
    Ok(TimeSeries::from_buckets(buckets).rank(metric))
}

fn init_buckets<Tz: TimeZone>(
    resolution: Resolution,
    first: &DateTime<Tz>,
    end: &DateTime<Tz>,
) -> Vec<TimeBucket> {
    let mut buckets = Vec::new();
    let mut t = resolution.apply(first);
    while *end > t {
        buckets.push(TimeBucket::new(resolution.label(&t), to_fixed(&t)));
        let following = resolution.next(&t);
        if following <= t {
            break;
        }
        t = following;
    }
    buckets
}

fn to_fixed<Tz: TimeZone>(t: &DateTime<Tz>) -> DateTime<FixedOffset> {
    t.with_timezone(&t.offset().fix())
}

enum Misplaced {
    Before(String),
    After,
}

/// Move the cursor forward to the bucket starting at `time`, skipping empty
/// buckets. The cursor never moves backwards.
fn advance(
    buckets: &[TimeBucket],
    cursor: usize,
    time: &DateTime<FixedOffset>,
) -> std::result::Result<usize, Misplaced> {
    let Some(current) = buckets.get(cursor) else {
        return Err(Misplaced::After);
    };
    if *time < current.time {
        return Err(Misplaced::Before(current.name.clone()));
    }

    match buckets[cursor..].iter().position(|b| b.time >= *time) {
        Some(offset) if buckets[cursor + offset].time == *time => Ok(cursor + offset),
        Some(offset) => Err(Misplaced::Before(buckets[cursor + offset].name.clone())),
        None => Err(Misplaced::After),
    }
}

fn partial(error: GtallyError, buckets: Vec<TimeBucket>, metric: Metric) -> TallyFailure {
    TallyFailure::new(error, TimeSeries::from_buckets(buckets).rank(metric))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileDiff;
    use crate::tally::TallyMode;
    use chrono::Utc;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn commit(author: &str, when: DateTime<Utc>, files: &[(&str, u64, u64)]) -> Commit {
        Commit {
            id: format!("{author}{}", when.timestamp()),
            author_name: author.to_string(),
            author_email: format!("{author}@example.com"),
            timestamp: when,
            file_diffs: files
                .iter()
                .map(|(p, a, r)| FileDiff::new(*p, *a, *r))
                .collect(),
        }
    }

    fn ok(commits: Vec<Commit>) -> Vec<std::result::Result<Commit, std::io::Error>> {
        commits.into_iter().map(Ok).collect()
    }

    fn opts(mode: TallyMode) -> TallyOpts {
        TallyOpts::by_email(mode)
    }

    #[test]
    fn empty_stream_is_empty_series() {
        let series = tally_commits_by_date(ok(vec![]), &opts(TallyMode::Commits), at(2024, 1, 1))
            .expect("empty stream should not fail");
        assert!(series.is_empty());
    }

    #[test]
    fn last_modified_fails_without_buckets() {
        let commits = ok(vec![commit("ada", at(2024, 1, 5), &[])]);
        let failure = tally_commits_by_date(commits, &opts(TallyMode::LastModified), at(2024, 2, 1))
            .unwrap_err();
        assert!(matches!(failure.error, GtallyError::UnsupportedMode(TallyMode::LastModified)));
        assert!(failure.partial.is_empty());
    }

    #[test]
    fn monthly_buckets_with_first_commit_counted() {
        let commits = ok(vec![
            commit("ada", at(2024, 1, 5), &[("a.rs", 1, 0)]),
            commit("ada", at(2024, 1, 20), &[("b.rs", 1, 0)]),
            commit("bob", at(2024, 2, 2), &[("a.rs", 2, 2)]),
        ]);
        let series =
            tally_commits_by_date(commits, &opts(TallyMode::Commits), at(2024, 4, 10)).unwrap();

        let names: Vec<_> = series.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["Jan 2024", "Feb 2024", "Mar 2024", "Apr 2024"]);
        assert_eq!(series.buckets()[0].total_tally.commits, 2);
        assert_eq!(series.buckets()[0].tally.name, "ada");
        assert_eq!(series.buckets()[1].total_tally.commits, 1);
        assert_eq!(series.buckets()[1].tally.name, "bob");
        assert!(series.buckets()[2].is_empty());
        assert_eq!(series.buckets()[2].total_tally, FinalTally::default());
    }

    #[test]
    fn short_span_uses_daily_buckets() {
        let commits = ok(vec![
            commit("ada", at(2024, 1, 5), &[]),
            commit("ada", at(2024, 1, 20), &[]),
            commit("ada", at(2024, 2, 2), &[]),
        ]);
        let series =
            tally_commits_by_date(commits, &opts(TallyMode::Commits), at(2024, 2, 10)).unwrap();

        // Jan 5 through Feb 10 inclusive; the end instant is midday.
        assert_eq!(series.len(), 37);
        assert_eq!(series.buckets()[0].name, "2024-01-05");
        assert_eq!(series.buckets()[36].name, "2024-02-10");
        let busy: Vec<_> = series
            .iter()
            .filter(|b| !b.is_empty())
            .map(|b| b.name.as_str())
            .collect();
        assert_eq!(busy, ["2024-01-05", "2024-01-20", "2024-02-02"]);
    }

    #[test]
    fn buckets_are_contiguous_and_ascending() {
        let commits = ok(vec![
            commit("ada", at(2015, 3, 1), &[]),
            commit("ada", at(2023, 6, 1), &[]),
        ]);
        let series =
            tally_commits_by_date(commits, &opts(TallyMode::Commits), at(2024, 6, 1)).unwrap();

        assert_eq!(series.len(), 10);
        for pair in series.buckets().windows(2) {
            assert_eq!(Resolution::Yearly.next(&pair[0].time), pair[1].time);
        }
    }

    #[test]
    fn stream_error_returns_partial_series() {
        let items: Vec<std::result::Result<Commit, std::io::Error>> = vec![
            Ok(commit("ada", at(2024, 1, 2), &[("a.rs", 3, 0)])),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "pack read failed")),
            Ok(commit("ada", at(2024, 1, 3), &[])),
        ];
        let failure =
            tally_commits_by_date(items, &opts(TallyMode::Lines), at(2024, 1, 5)).unwrap_err();

        assert!(failure.error.to_string().contains("error iterating commits"));
        assert!(failure.error.to_string().contains("pack read failed"));
        assert_eq!(failure.partial.len(), 4);
        assert_eq!(failure.partial.buckets()[0].tally.lines_added, 3);
    }

    #[test]
    fn error_before_first_commit() {
        let items: Vec<std::result::Result<Commit, std::io::Error>> =
            vec![Err(std::io::Error::new(std::io::ErrorKind::Other, "no HEAD"))];
        let failure =
            tally_commits_by_date(items, &opts(TallyMode::Commits), at(2024, 1, 5)).unwrap_err();
        assert!(matches!(failure.error, GtallyError::CommitStream { .. }));
        assert!(failure.partial.is_empty());
    }

    #[test]
    fn out_of_order_commit_is_rejected() {
        let commits = ok(vec![
            commit("ada", at(2024, 1, 2), &[]),
            commit("ada", at(2024, 1, 4), &[]),
            commit("bob", at(2024, 1, 3), &[]),
        ]);
        let failure =
            tally_commits_by_date(commits, &opts(TallyMode::Commits), at(2024, 1, 10)).unwrap_err();

        match failure.error {
            GtallyError::CommitOutOfOrder { bucket, current, .. } => {
                assert_eq!(bucket, "2024-01-03");
                assert_eq!(current, "2024-01-04");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(failure.partial.buckets()[2].total_tally.commits, 1);
    }

    #[test]
    fn commit_after_end_is_rejected() {
        let commits = ok(vec![
            commit("ada", at(2024, 1, 2), &[]),
            commit("ada", at(2024, 1, 9), &[]),
        ]);
        let failure =
            tally_commits_by_date(commits, &opts(TallyMode::Commits), at(2024, 1, 5)).unwrap_err();
        assert!(matches!(failure.error, GtallyError::CommitAfterEnd { .. }));
    }

    #[test]
    fn combine_rejects_mismatched_buckets() {
        let t = to_fixed(&at(2024, 1, 1));
        let a = TimeBucket::new("Jan 2024", t);
        let b = TimeBucket::new("2024", t);
        assert!(matches!(a.combine(b), Err(GtallyError::BucketMismatch { .. })));
    }

    #[test]
    fn combine_sums_shared_keys_and_reranks() {
        let t = to_fixed(&Resolution::Daily.apply(&at(2024, 1, 1)));
        let mut a = TimeBucket::new("2024-01-01", t);
        a.record("ada".into(), &commit("ada", at(2024, 1, 1), &[("x", 1, 0)]));
        let mut b = TimeBucket::new("2024-01-01", t);
        b.record("ada".into(), &commit("ada", at(2024, 1, 1), &[("x", 0, 1)]));
        b.record("bob".into(), &commit("bob", at(2024, 1, 1), &[("y", 9, 0)]));

        let merged = a.rank(Metric::Commits).combine(b).unwrap();
        assert_eq!(merged.ranked_by(), Some(Metric::Commits));
        assert_eq!(merged.tally.name, "ada");
        assert_eq!(merged.tally.commits, 2);
        assert_eq!(merged.tally.file_count, 1);
        assert_eq!(merged.total_tally.commits, 3);
        assert_eq!(merged.total_value(Metric::Lines), 11);
    }

    #[test]
    fn leaderboard_spans_buckets() {
        let commits = ok(vec![
            commit("ada", at(2024, 1, 1), &[("a", 1, 0)]),
            commit("bob", at(2024, 1, 2), &[("b", 5, 0)]),
            commit("ada", at(2024, 1, 3), &[("c", 1, 0)]),
        ]);
        let series =
            tally_commits_by_date(commits, &opts(TallyMode::Commits), at(2024, 1, 4)).unwrap();

        let by_commits = series.leaderboard(Metric::Commits);
        assert_eq!(by_commits[0].name, "ada");
        assert_eq!(by_commits[0].commits, 2);
        let by_lines = series.leaderboard(Metric::Lines);
        assert_eq!(by_lines[0].name, "bob");
    }
}

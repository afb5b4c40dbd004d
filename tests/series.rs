use chrono::{DateTime, Duration, TimeZone, Utc};
use gtally::model::{Commit, FileDiff};
use gtally::tally::{
    tally_commits_by_date, tally_commits_with_resolution, FinalTally, Metric, Resolution,
    TallyMode, TallyOpts, TimeSeries,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::convert::Infallible;

const AUTHORS: [&str; 4] = ["ada", "bob", "cy", "dee"];

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 2, 28, 18, 30, 0).unwrap()
}

fn commit(seq: usize, author: usize, hours: i64, file: usize, added: u64, removed: u64) -> Commit {
    let name = AUTHORS[author % AUTHORS.len()];
    Commit {
        id: format!("{seq:040x}"),
        author_name: name.to_string(),
        author_email: format!("{name}@example.com"),
        timestamp: start() + Duration::hours(hours),
        file_diffs: vec![FileDiff::new(format!("src/m{file}.rs"), added, removed)],
    }
}

fn ok(commits: &[Commit]) -> impl Iterator<Item = Result<Commit, Infallible>> + '_ {
    commits.iter().cloned().map(Ok)
}

type Row = (String, i64, FinalTally, FinalTally, Vec<FinalTally>);

fn rows(series: &TimeSeries, metric: Metric) -> Vec<Row> {
    series
        .iter()
        .map(|b| {
            (
                b.name.clone(),
                b.time.timestamp(),
                b.tally.clone(),
                b.total_tally.clone(),
                b.ranking(metric),
            )
        })
        .collect()
}

fn split_tally(commits: &[Commit], at: usize, opts: &TallyOpts, end: DateTime<Utc>) -> TimeSeries {
    let resolution = Resolution::for_span(&commits[0].timestamp, &end);
    let left = tally_commits_with_resolution(ok(&commits[..at]), opts, resolution, end).unwrap();
    let right = tally_commits_with_resolution(ok(&commits[at..]), opts, resolution, end).unwrap();
    left.combine(right).unwrap()
}

#[test]
fn yearly_series_covers_every_year() {
    let commits = vec![
        commit(0, 0, 0, 0, 10, 0),
        commit(1, 1, 24 * 365 * 3, 1, 5, 5),
        commit(2, 0, 24 * 365 * 6, 0, 1, 1),
    ];
    let end = Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap();
    let opts = TallyOpts::by_email(TallyMode::Lines);

    let series = tally_commits_by_date(ok(&commits), &opts, end).unwrap();
    let names: Vec<_> = series.iter().map(|b| b.name.clone()).collect();
    assert_eq!(names, ["2020", "2021", "2022", "2023", "2024", "2025", "2026"]);
    assert_eq!(series.buckets()[0].value(Metric::Lines), 10);
    assert_eq!(series.buckets()[3].tally.name, "bob");
    assert!(series.buckets()[1].is_empty());
}

#[test]
fn split_history_matches_single_pass() {
    let commits: Vec<Commit> = (0..40)
        .map(|i| commit(i, i * 3, (i as i64) * 37, i % 5, (i % 7) as u64, (i % 3) as u64))
        .collect();
    let end = start() + Duration::days(90);
    let opts = TallyOpts::by_email(TallyMode::Files);

    let whole = tally_commits_by_date(ok(&commits), &opts, end).unwrap();
    for at in [0, 1, 17, 39, 40] {
        let merged = split_tally(&commits, at, &opts, end);
        assert_eq!(rows(&merged, Metric::Files), rows(&whole, Metric::Files), "split at {at}");
    }
}

#[test]
fn tally_is_deterministic() {
    let commits: Vec<Commit> = (0..25)
        .map(|i| commit(i, i, (i as i64) * 5, 0, 1, 0))
        .collect();
    let end = start() + Duration::days(10);
    let opts = TallyOpts::by_name(TallyMode::Commits);

    let a = tally_commits_by_date(ok(&commits), &opts, end).unwrap();
    let b = tally_commits_by_date(ok(&commits), &opts, end).unwrap();
    assert_eq!(rows(&a, Metric::Commits), rows(&b, Metric::Commits));
    assert_eq!(a.leaderboard(Metric::Commits), b.leaderboard(Metric::Commits));
}

#[test]
fn custom_key_merges_aliases() {
    let mut commits = vec![commit(0, 0, 0, 0, 1, 0), commit(1, 0, 1, 1, 1, 0)];
    commits[1].author_email = "ada@users.noreply.example.com".into();
    let opts = TallyOpts::new(TallyMode::Commits, |c: &Commit| c.author_name.clone());
    let end = start() + Duration::days(1);

    let series = tally_commits_by_date(ok(&commits), &opts, end).unwrap();
    let board = series.leaderboard(Metric::Commits);
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].commits, 2);
    assert_eq!(board[0].email, "ada@example.com");
}

#[test]
fn series_serializes_as_bucket_array() {
    let commits = vec![commit(0, 1, 0, 0, 2, 1)];
    let end = start() + Duration::hours(12);
    let series =
        tally_commits_by_date(ok(&commits), &TallyOpts::by_email(TallyMode::Lines), end).unwrap();

    let json = serde_json::to_value(&series).unwrap();
    let buckets = json.as_array().unwrap();
    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0]["name"], "2020-02-28");
    assert_eq!(buckets[0]["tally"]["name"], "bob");
    assert_eq!(buckets[1]["name"], "2020-02-29");
    assert_eq!(buckets[1]["total_tally"]["commits"], 0);
}

/// Same email, a different display name per alias.
fn aliased(mut c: Commit, alias: usize) -> Commit {
    const SURNAMES: [&str; 3] = ["", " Lovelace", " L."];
    c.author_name.push_str(SURNAMES[alias % SURNAMES.len()]);
    c
}

fn history() -> impl Strategy<Value = Vec<Commit>> {
    prop::collection::vec(
        (0usize..4, 0usize..3, 0i64..24 * 400, 0usize..6, 0u64..40, 0u64..40),
        1..60,
    )
    .prop_map(|mut raw| {
        raw.sort_by_key(|r| r.2);
        raw.into_iter()
            .enumerate()
            .map(|(i, (a, alias, h, f, add, rm))| aliased(commit(i, a, h, f, add, rm), alias))
            .collect()
    })
}

#[test]
fn combine_names_author_from_earliest_commit() {
    let early = aliased(commit(0, 0, 0, 0, 1, 0), 1);
    let late = aliased(commit(1, 0, 2, 1, 1, 0), 0);
    let end = start() + Duration::hours(3);
    let opts = TallyOpts::by_email(TallyMode::Commits);
    let resolution = Resolution::Daily;

    let a = tally_commits_with_resolution(ok(&[early]), &opts, resolution, end).unwrap();
    let b = tally_commits_with_resolution(ok(&[late]), &opts, resolution, end).unwrap();
    let ab = a.clone().combine(b.clone()).unwrap();
    let ba = b.combine(a).unwrap();

    assert_eq!(rows(&ab, Metric::Commits), rows(&ba, Metric::Commits));
    assert_eq!(ab.buckets()[0].tally.name, "ada Lovelace");
    assert_eq!(ab.buckets()[0].tally.commits, 2);
}

proptest! {
    #[test]
    fn any_split_matches_single_pass(commits in history(), at in any::<prop::sample::Index>()) {
        let end = start() + Duration::hours(24 * 400 + 1);
        let opts = TallyOpts::by_email(TallyMode::Lines);
        let at = at.index(commits.len() + 1);

        let whole = tally_commits_by_date(ok(&commits), &opts, end).unwrap();
        let merged = split_tally(&commits, at, &opts, end);
        prop_assert_eq!(rows(&merged, Metric::Lines), rows(&whole, Metric::Lines));
    }

    #[test]
    fn combine_commutes(commits in history(), at in any::<prop::sample::Index>()) {
        let end = start() + Duration::hours(24 * 400 + 1);
        let opts = TallyOpts::by_email(TallyMode::Commits);
        let at = at.index(commits.len() + 1);
        let resolution = Resolution::for_span(&commits[0].timestamp, &end);

        let left = tally_commits_with_resolution(ok(&commits[..at]), &opts, resolution, end).unwrap();
        let right = tally_commits_with_resolution(ok(&commits[at..]), &opts, resolution, end).unwrap();
        let lr = left.clone().combine(right.clone()).unwrap();
        let rl = right.combine(left).unwrap();
        prop_assert_eq!(rows(&lr, Metric::Commits), rows(&rl, Metric::Commits));
    }

    #[test]
    fn combine_associates(
        commits in history(),
        cuts in (any::<prop::sample::Index>(), any::<prop::sample::Index>()),
    ) {
        let end = start() + Duration::hours(24 * 400 + 1);
        let opts = TallyOpts::by_email(TallyMode::Files);
        let (i, j) = (cuts.0.index(commits.len() + 1), cuts.1.index(commits.len() + 1));
        let (i, j) = (i.min(j), i.max(j));
        let resolution = Resolution::for_span(&commits[0].timestamp, &end);
        let part = |range: std::ops::Range<usize>| {
            tally_commits_with_resolution(ok(&commits[range]), &opts, resolution, end).unwrap()
        };

        let (x, y, z) = (part(0..i), part(i..j), part(j..commits.len()));
        let left_first = x.clone().combine(y.clone()).unwrap().combine(z.clone()).unwrap();
        let right_first = x.combine(y.combine(z).unwrap()).unwrap();
        prop_assert_eq!(rows(&left_first, Metric::Files), rows(&right_first, Metric::Files));

        let whole = tally_commits_by_date(ok(&commits), &opts, end).unwrap();
        prop_assert_eq!(rows(&left_first, Metric::Files), rows(&whole, Metric::Files));
    }
}

use super::{output_json, output_ndjson, output_table};
use crate::cli::{CommonArgs, TallyArgs};
use crate::git::GitRepo;
use crate::model::Commit;
use crate::tally::{tally_commits_by_date, tally_commits_parallel};
use anyhow::Context;
use tracing::{info, warn};

pub fn exec(common: CommonArgs, tally: TallyArgs, jobs: usize, json: bool, ndjson: bool) -> anyhow::Result<()> {
    let opts = tally.opts();
    let metric = opts.metric().context("Cannot build a timeline")?;

    let repo = GitRepo::open(common.repo.as_ref()).context("Failed to open git repository")?;
    let range = repo
        .resolve_range(common.since.as_deref(), common.until.as_deref())
        .context("Failed to resolve date range")?;

    // Disable progress indicators in JSON/NDJSON mode to keep output clean
    let walk = repo
        .commits(&range, common.walk_options(!json && !ndjson))
        .context("Failed to collect commits from repository")?;
    let end = common.end(&range, walk.latest());

    let result = if jobs > 1 {
        let commits: Vec<Commit> = walk
            .collect::<crate::error::Result<_>>()
            .context("Failed to load commit diffs")?;
        tally_commits_parallel(&commits, &opts, end, jobs)
    } else {
        tally_commits_by_date(walk, &opts, end)
    };

    let series = match result {
        Ok(series) => series,
        Err(failure) => {
            warn!(buckets = failure.partial.len(), "discarding partial timeline");
            return Err(failure).context("Failed to tally commits by date");
        }
    };
    info!(buckets = series.len(), mode = %opts.mode, jobs, "timeline ready");

    if json {
        output_json(&series, metric, &repo, &common)?;
    } else if ndjson {
        output_ndjson(&series, metric)?;
    } else {
        output_table(&series, metric, &common)?;
    }

    Ok(())
}

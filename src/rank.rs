use crate::cli::{CommonArgs, TallyArgs};
use crate::git::GitRepo;
use crate::model::{RankOutput, SCHEMA_VERSION};
use crate::tally::{tally_commits_by_date, FinalTally, Metric, TallyMode};
use anyhow::Context;
use chrono::Utc;
use console::style;

pub fn exec(common: CommonArgs, tally: TallyArgs, limit: usize, json: bool) -> anyhow::Result<()> {
    let opts = tally.opts();
    let metric = opts.metric().context("Cannot rank authors")?;

    let repo = GitRepo::open(common.repo.as_ref()).context("Failed to open git repository")?;
    let range = repo
        .resolve_range(common.since.as_deref(), common.until.as_deref())
        .context("Failed to resolve date range")?;

    let walk = repo
        .commits(&range, common.walk_options(!json))
        .context("Failed to collect commits from repository")?;
    let end = common.end(&range, walk.latest());

    let series = tally_commits_by_date(walk, &opts, end).context("Failed to tally commits")?;
    let mut entries = series.leaderboard(metric);
    entries.truncate(limit);

    if json {
        output_json(&entries, metric, &repo, &common)
    } else {
        output_table(&entries, metric)
    }
}

fn output_json(
    entries: &[FinalTally],
    metric: Metric,
    repo: &GitRepo,
    common: &CommonArgs,
) -> anyhow::Result<()> {
    let output = RankOutput {
        version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        repository_path: repo.path().to_string_lossy().to_string(),
        mode: TallyMode::from(metric).to_string(),
        since: common.since.clone(),
        until: common.until.clone(),
        entries: entries.to_vec(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn output_table(entries: &[FinalTally], metric: Metric) -> anyhow::Result<()> {
    if entries.is_empty() {
        println!("No data to display");
        return Ok(());
    }

    println!(
        "{:<4} {:<40} {:>8} {:>8} {:>8} {:>8}",
        style("#").bold(),
        style("Author").bold(),
        style("Commits").bold(),
        style("Files").bold(),
        style("Added").bold(),
        style("Removed").bold()
    );
    println!("{}", "─".repeat(82));
    for (i, e) in entries.iter().enumerate() {
        let author = format!("{} <{}>", e.name, e.email);
        println!(
            "{:<4} {:<40} {:>8} {:>8} {:>8} {:>8}",
            i + 1,
            author,
            e.commits,
            e.file_count,
            style(e.lines_added).green(),
            style(e.lines_removed).red()
        );
    }
    println!("\nRanked by {}", TallyMode::from(metric));
    Ok(())
}

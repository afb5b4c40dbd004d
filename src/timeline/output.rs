use crate::cli::CommonArgs;
use crate::git::GitRepo;
use crate::model::{TimelineEntry, TimelineOutput, SCHEMA_VERSION};
use crate::tally::{Metric, TallyMode, TimeSeries};
use anyhow::Result;
use chrono::Utc;
use console::style;

pub fn output_json(
    series: &TimeSeries,
    metric: Metric,
    repo: &GitRepo,
    common: &CommonArgs,
) -> Result<()> {
    let output = TimelineOutput {
        version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        repository_path: repo.path().to_string_lossy().to_string(),
        mode: TallyMode::from(metric).to_string(),
        since: common.since.clone(),
        until: common.until.clone(),
        buckets: series
            .iter()
            .map(|bucket| TimelineEntry::from_bucket(bucket, metric))
            .collect(),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn output_ndjson(series: &TimeSeries, metric: Metric) -> Result<()> {
    for bucket in series {
        println!("{}", serde_json::to_string(&TimelineEntry::from_bucket(bucket, metric))?);
    }
    Ok(())
}

pub fn output_table(series: &TimeSeries, metric: Metric, common: &CommonArgs) -> Result<()> {
    if series.is_empty() {
        println!("No data to display");
        return Ok(());
    }

    if let (Some(since), Some(until)) = (&common.since, &common.until) {
        println!("Filtering commits from {} to {}", since, until);
    } else if let Some(since) = &common.since {
        println!("Filtering commits since {}", since);
    } else if let Some(until) = &common.until {
        println!("Filtering commits until {}", until);
    }

    let max_total = series
        .iter()
        .map(|b| b.total_value(metric))
        .max()
        .unwrap_or(1)
        .max(1);

    println!(
        "{}",
        style(format!("Top contributor by {}", TallyMode::from(metric))).bold()
    );
    println!("{}", "─".repeat(72));
    println!(
        "{:<12}   {:<32} {:>10} {:>10}",
        style("Period").bold(),
        style("Author").bold(),
        style("Value").bold(),
        style("Total").bold()
    );

    for bucket in series {
        let intensity = ((bucket.total_value(metric) as f64 / max_total as f64) * 5.0) as u32;
        let bar = match intensity {
            0 => " ",
            1 => "▁",
            2 => "▃",
            3 => "▅",
            4 => "▇",
            _ => "█",
        };

        let winner = if bucket.is_empty() {
            style("-".to_string()).dim()
        } else {
            style(truncate(&bucket.tally.name, 32)).cyan()
        };

        println!(
            "{:<12} {} {:<32} {:>10} {:>10}",
            bucket.name,
            style(bar).green(),
            winner,
            bucket.value(metric),
            bucket.total_value(metric)
        );
    }

    Ok(())
}

fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    let mut out: String = name.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

use crate::git::WalkOptions;
use crate::model::DateRange;
use crate::tally::{TallyMode, TallyOpts};
use anyhow::Result;
use chrono::{DateTime, Duration, Local};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gtally")]
#[command(about = "Rank git contributors over time by commits, files or lines")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Path to git repository")]
    pub repo: Option<PathBuf>,

    #[arg(long, help = "Include merge commits")]
    pub include_merges: bool,

    #[arg(long, help = "Include binary files", default_value_t = false)]
    pub binary: bool,

    #[arg(long, help = "Start from this commit or date (RFC3339, YYYY-MM-DD, or natural language)")]
    pub since: Option<String>,

    #[arg(long, help = "End at this commit or date (RFC3339, YYYY-MM-DD, or natural language)")]
    pub until: Option<String>,

    #[arg(short, long, global = true, help = "Log debug output to stderr")]
    pub verbose: bool,
}

impl CommonArgs {
    pub fn walk_options(&self, progress: bool) -> WalkOptions {
        WalkOptions {
            include_merges: self.include_merges,
            binary: self.binary,
            progress,
        }
    }

    /// End of the tallied range: `--until` when given, otherwise now. Never
    /// earlier than just past the newest commit.
    pub fn end(&self, range: &DateRange, newest: Option<DateTime<chrono::Utc>>) -> DateTime<Local> {
        let end = range
            .until
            .map(|u| u.with_timezone(&Local))
            .unwrap_or_else(Local::now);
        match newest {
            Some(newest) if newest.with_timezone(&Local) >= end => {
                newest.with_timezone(&Local) + Duration::seconds(1)
            }
            _ => end,
        }
    }
}

#[derive(Args, Clone)]
pub struct TallyArgs {
    #[arg(long, value_enum, default_value_t = TallyMode::Commits, help = "Metric used to rank authors")]
    pub mode: TallyMode,

    #[arg(long, help = "Group authors by name instead of email")]
    pub name: bool,
}

impl TallyArgs {
    pub fn opts(&self) -> TallyOpts {
        if self.name {
            TallyOpts::by_name(self.mode)
        } else {
            TallyOpts::by_email(self.mode)
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Top contributor per day, month or year
    Timeline {
        #[command(flatten)]
        tally: TallyArgs,

        #[arg(long, default_value_t = 1, help = "Tally history in this many parallel shards")]
        jobs: usize,

        #[arg(long, help = "Output as JSON")]
        json: bool,

        #[arg(long, help = "Output as NDJSON")]
        ndjson: bool,
    },
    /// Contributors ranked over the whole range
    Rank {
        #[command(flatten)]
        tally: TallyArgs,

        #[arg(long, default_value_t = 10, help = "Number of authors to show")]
        limit: usize,

        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Timeline { tally, jobs, json, ndjson } => {
                crate::timeline::exec(self.common, tally, jobs, json, ndjson)
            }
            Commands::Rank { tally, limit, json } => {
                crate::rank::exec(self.common, tally, limit, json)
            }
        }
    }
}

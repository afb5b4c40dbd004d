use crate::error::{GtallyError, Result};
use crate::model::{Commit, DateRange, FileDiff};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use gix::object::tree::diff::ChangeDetached;
use gix::{discover, ObjectId, Repository};
use indicatif::{ProgressBar, ProgressStyle};
use similar::{ChangeTag, TextDiff};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

pub struct GitRepo {
    repo: Repository,
    path: PathBuf,
}

/// Which commits a walk yields and how.
#[derive(Debug, Clone, Copy)]
pub struct WalkOptions {
    pub include_merges: bool,
    pub binary: bool,
    pub progress: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            include_merges: true,
            binary: false,
            progress: false,
        }
    }
}

struct PendingCommit {
    id: ObjectId,
    timestamp: DateTime<Utc>,
    first_parent: Option<ObjectId>,
}

impl GitRepo {
    /// Open a repository at `path`, or current dir if `None`
    pub fn open<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let repo_path = path
            .map(|p| p.as_ref().to_path_buf())
            .unwrap_or(std::env::current_dir()?);

        let repo = discover(&repo_path)?;
        let path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();

        Ok(Self { repo, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn resolve_range(&self, since: Option<&str>, until: Option<&str>) -> Result<DateRange> {
        let mut range = DateRange::new();

        let since_dt = since.map(|s| self.parse_commit_or_date(s)).transpose()?;
        let until_dt = until.map(|u| self.parse_commit_or_date(u)).transpose()?;

        if let (Some(s), Some(u)) = (since_dt, until_dt) {
            if s > u {
                return Err(GtallyError::InvalidDate(format!(
                    "Invalid range: since ({s}) is after until ({u})"
                )));
            }
        }

        if let Some(s) = since_dt {
            range = range.with_since(s);
        }
        if let Some(u) = until_dt {
            range = range.with_until(u);
        }

        Ok(range)
    }

    fn parse_commit_or_date(&self, input: &str) -> Result<DateTime<Utc>> {
        if let Some(dt) = parse_date(input) {
            return Ok(dt);
        }

        // Fallback to Git ref
        let id = self
            .repo
            .rev_parse_single(input)
            .map_err(|e| GtallyError::Parse(format!("Invalid commit or date '{input}': {e}")))?;

        let commit = id
            .object()?
            .try_into_commit()
            .map_err(|_| GtallyError::Parse(format!("Not a commit: {input}")))?;

        let secs = commit.time()?.seconds;
        DateTime::<Utc>::from_timestamp(secs, 0)
            .ok_or_else(|| GtallyError::InvalidDate(format!("Invalid timestamp: {secs}")))
    }

    /// Walk every commit reachable from HEAD inside `range`, oldest first.
    ///
    /// Ids and times are gathered up front; file diffs are computed lazily as
    /// the returned iterator is pulled.
    pub fn commits(&self, range: &DateRange, options: WalkOptions) -> Result<CommitWalk<'_>> {
        let mut head = self.repo.head()?;
        let head_commit = head.peel_to_commit_in_place()?;

        let mut pending = Vec::new();
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut stack: VecDeque<ObjectId> = VecDeque::from([head_commit.id]);

        let pb = if options.progress {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} {pos}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message("Collecting commits...");

        while let Some(commit_id) = stack.pop_back() {
            if !seen.insert(commit_id) {
                continue;
            }

            let commit = self.repo.find_commit(commit_id)?;
            let secs = commit.time()?.seconds;
            let timestamp = DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| GtallyError::InvalidDate(format!("Invalid timestamp: {secs}")))?;

            let parents: Vec<ObjectId> = commit.parent_ids().map(|id| id.into()).collect();
            let keep = range.contains(&timestamp) && (options.include_merges || parents.len() < 2);

            if keep {
                pending.push(PendingCommit {
                    id: commit_id,
                    timestamp,
                    first_parent: parents.first().copied(),
                });
                pb.inc(1);
            }

            stack.extend(parents);
        }

        pb.finish_and_clear();
        pending.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        debug!(commits = pending.len(), path = %self.path.display(), "collected commit ids");

        Ok(CommitWalk {
            repo: self,
            pending: pending.into_iter(),
            binary: options.binary,
        })
    }

    fn load_commit(&self, pending: &PendingCommit, binary: bool) -> Result<Commit> {
        let commit = self.repo.find_commit(pending.id)?;
        let author = commit.author()?;
        let commit_tree = commit.tree()?;

        let changes: Vec<ChangeDetached> = match pending.first_parent {
            Some(parent_id) => {
                let parent_tree = self.repo.find_commit(parent_id)?.tree()?;
                self.repo
                    .diff_tree_to_tree(Some(&parent_tree), Some(&commit_tree), None)?
            }
            None => self.repo.diff_tree_to_tree(None, Some(&commit_tree), None)?,
        };

        let mut file_diffs = Vec::new();
        for change in changes {
            if let Some(diff) = self.file_diff(change, binary) {
                file_diffs.push(diff);
            }
        }

        Ok(Commit {
            id: pending.id.to_string(),
            author_name: author.name.to_string(),
            author_email: author.email.to_string(),
            timestamp: pending.timestamp,
            file_diffs,
        })
    }

    /// Line counts for one tree change, or `None` for trees and skipped
    /// binaries.
    fn file_diff(&self, change: ChangeDetached, binary: bool) -> Option<FileDiff> {
        match change {
            ChangeDetached::Addition { id, location, .. } => {
                let obj = self.blob(id)?;
                let is_binary = is_binary_object(&obj);
                (binary || !is_binary).then(|| {
                    FileDiff::new(location.to_string(), if is_binary { 0 } else { count_lines(&obj) }, 0)
                })
            }
            ChangeDetached::Deletion { id, location, .. } => {
                let obj = self.blob(id)?;
                let is_binary = is_binary_object(&obj);
                (binary || !is_binary).then(|| {
                    FileDiff::new(location.to_string(), 0, if is_binary { 0 } else { count_lines(&obj) })
                })
            }
            ChangeDetached::Modification {
                previous_id,
                id,
                location,
                ..
            } => {
                let (old_obj, new_obj) = (self.blob(previous_id)?, self.blob(id)?);
                let is_binary = is_binary_object(&old_obj) || is_binary_object(&new_obj);
                (binary || !is_binary).then(|| {
                    let (added, removed) = if is_binary { (0, 0) } else { line_diff(&old_obj, &new_obj) };
                    FileDiff::new(location.to_string(), added, removed)
                })
            }
            ChangeDetached::Rewrite {
                source_id,
                id,
                location,
                copy,
                ..
            } => {
                let (old_obj, new_obj) = (self.blob(source_id)?, self.blob(id)?);
                let is_binary = is_binary_object(&old_obj) || is_binary_object(&new_obj);
                (binary || !is_binary).then(|| {
                    let (added, removed) = if is_binary { (0, 0) } else { line_diff(&old_obj, &new_obj) };
                    FileDiff::new(location.to_string(), added, if copy { 0 } else { removed })
                })
            }
        }
    }

    fn blob(&self, id: ObjectId) -> Option<gix::Object<'_>> {
        self.repo
            .find_object(id)
            .ok()
            .filter(|obj| obj.kind == gix::object::Kind::Blob)
    }
}

/// Commits of a walk, oldest first.
pub struct CommitWalk<'r> {
    repo: &'r GitRepo,
    pending: std::vec::IntoIter<PendingCommit>,
    binary: bool,
}

impl CommitWalk<'_> {
    /// Timestamp of the newest commit not yet yielded.
    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.pending.as_slice().last().map(|p| p.timestamp)
    }
}

impl Iterator for CommitWalk<'_> {
    type Item = Result<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        let pending = self.pending.next()?;
        Some(self.repo.load_commit(&pending, self.binary))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pending.size_hint()
    }
}

impl ExactSizeIterator for CommitWalk<'_> {}

fn is_binary_object(object: &gix::Object) -> bool {
    object.data.as_slice().iter().take(8192).any(|&b| b == 0)
}

fn count_lines(object: &gix::Object) -> u64 {
    std::str::from_utf8(object.data.as_slice())
        .map(|t| t.lines().count() as u64)
        .unwrap_or(0)
}

fn line_diff(old_object: &gix::Object, new_object: &gix::Object) -> (u64, u64) {
    let old_text = std::str::from_utf8(old_object.data.as_slice()).unwrap_or("");
    let new_text = std::str::from_utf8(new_object.data.as_slice()).unwrap_or("");
    count_changes(old_text, new_text)
}

fn count_changes(old_text: &str, new_text: &str) -> (u64, u64) {
    let diff = TextDiff::from_lines(old_text, new_text);
    let mut added = 0u64;
    let mut removed = 0u64;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => removed += 1,
            ChangeTag::Equal => {}
        }
    }
    (added, removed)
}

/// Parse RFC3339, `YYYY-MM-DD` or a relative duration into an instant.
fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|datetime| Utc.from_utc_datetime(&datetime));
    }

    // Relative duration (e.g. "2 weeks ago")
    let duration = parse_natural_duration(input)?;
    SystemTime::now()
        .checked_sub(duration)
        .map(DateTime::<Utc>::from)
}

fn parse_natural_duration(input: &str) -> Option<Duration> {
    let input = input.trim().to_lowercase();

    let units: [(&str, u64); 6] = [
        (" day ago", 86400),
        (" days ago", 86400),
        (" week ago", 7 * 86400),
        (" weeks ago", 7 * 86400),
        (" month ago", 30 * 86400),
        (" months ago", 30 * 86400),
    ];

    units.iter().find_map(|(suffix, secs)| {
        let n = input.strip_suffix(suffix)?.trim().parse::<u64>().ok()?;
        n.checked_mul(*secs).map(Duration::from_secs)
    })
}

//! Tally disjoint shards of history on the rayon pool and merge the results.

use super::author::TallyOpts;
use super::bucket::{tally_commits_with_resolution, TimeSeries};
use super::resolution::Resolution;
use crate::error::{GtallyError, TallyFailure};
use crate::model::Commit;
use chrono::{DateTime, TimeZone};
use rayon::prelude::*;
use std::convert::Infallible;
use tracing::{debug, warn};

/// Split `commits` into `shards` contiguous chunks, tally each concurrently and
/// combine the partial series.
///
/// Every shard uses the resolution picked from the first commit of the whole
/// slice, so the result matches a sequential [`super::tally_commits_by_date`].
/// Ordering is checked across the whole slice before sharding; a commit whose
/// bucket precedes its predecessor's fails with the same error and partial
/// series the sequential tally would return.
pub fn tally_commits_parallel<Tz>(
    commits: &[Commit],
    opts: &TallyOpts,
    end: DateTime<Tz>,
    shards: usize,
) -> Result<TimeSeries, TallyFailure>
where
    Tz: TimeZone + Sync,
    Tz::Offset: Sync,
{
    opts.metric()
        .map_err(|e| TallyFailure::new(e, TimeSeries::default()))?;

    let Some(first) = commits.first() else {
        return Ok(TimeSeries::default());
    };

    let resolution = Resolution::for_span(&first.timestamp, &end);
    let tz = end.timezone();
    let bucket_of = |c: &Commit| resolution.apply(&c.timestamp.with_timezone(&tz));
    if let Some(i) = commits
        .windows(2)
        .position(|pair| bucket_of(&pair[1]) < bucket_of(&pair[0]))
    {
        let (current, late) = (&commits[i], &commits[i + 1]);
        let partial = tally_commits_with_resolution(
            commits[..=i].iter().cloned().map(Ok::<_, Infallible>),
            opts,
            resolution,
            end.clone(),
        )?;
        let error = GtallyError::CommitOutOfOrder {
            commit: late.short_id().to_string(),
            bucket: resolution.label(&late.timestamp.with_timezone(&tz)),
            current: resolution.label(&current.timestamp.with_timezone(&tz)),
        };
        warn!(%error, position = i + 1, "commit slice is not ordered by bucket");
        return Err(TallyFailure::new(error, partial));
    }

    let chunk_size = commits.len().div_ceil(shards.max(1));
    debug!(
        commits = commits.len(),
        chunk_size,
        %resolution,
        "tallying commit shards in parallel"
    );

    commits
        .par_chunks(chunk_size)
        .map(|chunk| {
            tally_commits_with_resolution(
                chunk.iter().cloned().map(Ok::<_, Infallible>),
                opts,
                resolution,
                end.clone(),
            )
        })
        .try_reduce(TimeSeries::default, |left, right| {
            left.combine(right)
                .map_err(|e| TallyFailure::new(e, TimeSeries::default()))
        })
}

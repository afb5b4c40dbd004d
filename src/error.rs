use crate::tally::{TallyMode, TimeSeries};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GtallyError>;

#[derive(Error, Debug)]
pub enum GtallyError {
    #[error("{0} mode not implemented")]
    UnsupportedMode(TallyMode),
    #[error("error iterating commits: {source}")]
    CommitStream {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("commit {commit} belongs to bucket {bucket}, which precedes the current bucket {current}")]
    CommitOutOfOrder {
        commit: String,
        bucket: String,
        current: String,
    },
    #[error("commit {commit} belongs to bucket {bucket}, which is not before the end of the series")]
    CommitAfterEnd { commit: String, bucket: String },
    #[error("cannot combine bucket {left} with bucket {right}")]
    BucketMismatch { left: String, right: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Object find error: {0}")]
    ObjectFind(#[from] Box<gix::object::find::existing::Error>),
    #[error("Commit error: {0}")]
    Commit(#[from] Box<gix::object::commit::Error>),
    #[error("Reference find error: {0}")]
    RefFind(#[from] Box<gix::reference::find::existing::Error>),
    #[error("Head peel error: {0}")]
    HeadPeel(#[from] Box<gix::head::peel::to_commit::Error>),
    #[error("Object find with conversion error: {0}")]
    ObjectFindConv(#[from] Box<gix::object::find::existing::with_conversion::Error>),
    #[error("Object decode error: {0}")]
    ObjectDecode(#[from] Box<gix::objs::decode::Error>),
    #[error("Diff tree to tree error: {0}")]
    DiffTreeToTree(#[from] Box<gix::repository::diff_tree_to_tree::Error>),
    #[error("Git discover error: {0}")]
    GitDiscover(#[from] Box<gix::discover::Error>),
}

impl GtallyError {
    /// Wrap an error raised by the commit source.
    pub fn stream<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        GtallyError::CommitStream { source: err.into() }
    }
}

/// A tally that stopped early.
///
/// Carries the buckets built before the failure so callers can decide whether
/// the partial series is still useful.
#[derive(Error, Debug)]
#[error("error while tallying commits by date")]
pub struct TallyFailure {
    #[source]
    pub error: GtallyError,
    pub partial: TimeSeries,
}

impl TallyFailure {
    pub fn new(error: GtallyError, partial: TimeSeries) -> Self {
        Self { error, partial }
    }
}

// Manual From implementations for unboxed to boxed conversions
impl From<gix::object::find::existing::Error> for GtallyError {
    fn from(err: gix::object::find::existing::Error) -> Self {
        GtallyError::ObjectFind(Box::new(err))
    }
}

impl From<gix::object::commit::Error> for GtallyError {
    fn from(err: gix::object::commit::Error) -> Self {
        GtallyError::Commit(Box::new(err))
    }
}

impl From<gix::reference::find::existing::Error> for GtallyError {
    fn from(err: gix::reference::find::existing::Error) -> Self {
        GtallyError::RefFind(Box::new(err))
    }
}

impl From<gix::head::peel::to_commit::Error> for GtallyError {
    fn from(err: gix::head::peel::to_commit::Error) -> Self {
        GtallyError::HeadPeel(Box::new(err))
    }
}

impl From<gix::object::find::existing::with_conversion::Error> for GtallyError {
    fn from(err: gix::object::find::existing::with_conversion::Error) -> Self {
        GtallyError::ObjectFindConv(Box::new(err))
    }
}

impl From<gix::objs::decode::Error> for GtallyError {
    fn from(err: gix::objs::decode::Error) -> Self {
        GtallyError::ObjectDecode(Box::new(err))
    }
}

impl From<gix::repository::diff_tree_to_tree::Error> for GtallyError {
    fn from(err: gix::repository::diff_tree_to_tree::Error) -> Self {
        GtallyError::DiffTreeToTree(Box::new(err))
    }
}

impl From<gix::discover::Error> for GtallyError {
    fn from(err: gix::discover::Error) -> Self {
        GtallyError::GitDiscover(Box::new(err))
    }
}

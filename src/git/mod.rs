mod repo;

pub use repo::{CommitWalk, GitRepo, WalkOptions};

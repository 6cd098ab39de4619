//! Error types for the solver.

use thiserror::Error;

/// Result type alias for solver operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring, populating or solving an
/// exact cover problem.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// The problem was configured without any constraint.
    #[error("there must be at least one constraint")]
    NoConstraints,

    /// A secondary constraint index does not refer to a declared constraint.
    #[error("secondary constraint index {index} must be less than {constraints}")]
    SecondaryIndexOutOfRange { index: usize, constraints: usize },

    /// Multithreading was requested with an empty thread pool.
    #[error("number of threads must be greater than 0")]
    NoThreads,

    /// The configuration was finished before the number of constraints was set.
    #[error("number of constraints must be set")]
    ConstraintsNotSet,

    /// A choice covers no constraint at all.
    #[error("constraint indices of a choice cannot be empty")]
    EmptyChoice,

    /// The constraint indices of a choice are not strictly increasing.
    #[error("constraint indices must be strictly increasing (violated at position {position})")]
    UnorderedIndices { position: usize },

    /// A choice lists the same constraint twice.
    #[error("constraint index {index} appears more than once in the choice")]
    DuplicateIndex { index: usize },

    /// A choice refers to a constraint that was never declared.
    #[error("constraint index {index} must be less than {constraints}")]
    IndexOutOfRange { index: usize, constraints: usize },

    /// The matrix was mutated after the search had started.
    #[error("choices cannot be added once solving has started")]
    AlreadySolving,

    /// Statistics were requested before solving started.
    #[error("the problem has not been solved yet")]
    NotSolved,

    /// A prior protocol violation or failure left the solver unusable.
    #[error("the solver is broken by an earlier failure")]
    Broken,

    /// The thread pool for forked sub-searches could not be created.
    #[error("failed to create thread pool: {0}")]
    ThreadPool(String),

    /// A forked sub-search panicked.
    #[error("forked search failed: {0}")]
    ForkFailed(String),
}

impl From<rayon::ThreadPoolBuildError> for Error {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool(err.to_string())
    }
}

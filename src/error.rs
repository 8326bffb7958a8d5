use compact_str::CompactString;
use thiserror::Error;

use crate::script_deploy::HGW;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    /// The node cannot hold the job it was assigned. The job is skipped.
    #[error(
        "{node} has {free_hundredths} hundredths of a GB free but needs \
         {needed_hundredths}"
    )]
    InsufficientCapacity {
        node: CompactString,
        needed_hundredths: u64,
        free_hundredths: u64,
    },

    /// The game refused to start the job. The job is skipped.
    #[error("{op:?} on {node} was rejected: {reason}")]
    LaunchRejected {
        node: CompactString,
        op: HGW,
        reason: String,
    },

    /// The target does not resolve to a known, accessible server. Ends the
    /// attack loop.
    #[error("invalid target {0:?}")]
    InvalidTarget(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot parse {file}: {source}")]
    Parse {
        file: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid money amount {0:?}")]
    MoneyAmount(String),
}

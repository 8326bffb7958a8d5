use compact_str::{
    format_compact,
    CompactString,
};

use crate::{
    scheduler::Stage,
    script_deploy::HGW,
};

/// One planned `exec` of a worker script.
///
/// Jobs are never changed after planning. `group` ties the jobs of a grow
/// pair or a hack batch together so the launcher can drop the whole group
/// when its correction fails.
#[derive(Clone, Debug, PartialEq)]
pub struct Job {
    pub op: HGW,
    pub threads: u64,
    pub node: CompactString,
    pub target: CompactString,
    pub start_delay: f64,
    pub planned_duration: f64,
    pub correlation_id: u64,
    pub group: u64,
    pub stage: Stage,
}

impl Job {
    /// Milliseconds from the start of the pass until the operation takes
    /// effect.
    pub fn landing(&self) -> f64 {
        self.start_delay + self.planned_duration
    }

    pub fn memory_hundredths(&self) -> u64 {
        self.threads * self.op.memory_hundredths()
    }

    /// Extra script argument that keeps two otherwise equal launches apart.
    pub fn tag(&self) -> CompactString {
        format_compact!("{}-{}", self.group, self.correlation_id)
    }
}

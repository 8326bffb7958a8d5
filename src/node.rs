use compact_str::CompactString;

use crate::{
    effect::to_hundredths,
    env::NodeCapacity,
    error::ScheduleError,
    script_deploy::HGW,
};

/// A worker the scheduler can run jobs on.
///
/// Capacity is in hundredths of a GB. `reserved` is what the current pass
/// has planned on this node and not launched yet; refreshing keeps it.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceNode {
    id: CompactString,
    capacity_total: u64,
    capacity_used: u64,
    locked: u64,
    reserved: u64,
}

impl ResourceNode {
    pub fn new(
        id: impl Into<CompactString>,
        locked: u64,
    ) -> ResourceNode {
        ResourceNode {
            id: id.into(),
            capacity_total: 0,
            capacity_used: 0,
            locked,
            reserved: 0,
        }
    }

    /// A node whose capacity is already known, mostly for planning without
    /// a game at hand.
    pub fn with_capacity(
        id: impl Into<CompactString>,
        capacity_total: u64,
        capacity_used: u64,
    ) -> ResourceNode {
        ResourceNode {
            capacity_total,
            capacity_used,
            ..ResourceNode::new(id, 0)
        }
    }

    pub fn id(&self) -> &CompactString {
        &self.id
    }

    pub fn capacity_used(&self) -> u64 {
        self.capacity_used
    }

    pub fn reserved(&self) -> u64 {
        self.reserved
    }

    /// Re-reads total and used RAM from the game.
    pub fn refresh(
        &mut self,
        env: &impl NodeCapacity,
    ) {
        let (total, used) = env.capacity(&self.id);
        self.capacity_total = to_hundredths(total);
        self.capacity_used = to_hundredths(used);
    }

    /// What the game says is free, minus the locked reserve.
    pub fn unplanned_free(&self) -> u64 {
        self.capacity_total
            .saturating_sub(self.capacity_used)
            .saturating_sub(self.locked)
    }

    pub fn capacity_free(&self) -> u64 {
        self.unplanned_free().saturating_sub(self.reserved)
    }

    pub fn max_threads(
        &self,
        op: HGW,
    ) -> u64 {
        self.capacity_free() / op.memory_hundredths()
    }

    pub fn fits(
        &self,
        hundredths: u64,
    ) -> bool {
        hundredths <= self.capacity_free()
    }

    pub fn reserve(
        &mut self,
        op: HGW,
        threads: u64,
    ) -> Result<(), ScheduleError> {
        self.reserve_hundredths(threads * op.memory_hundredths())
    }

    pub fn ensure_fits(
        &self,
        hundredths: u64,
    ) -> Result<(), ScheduleError> {
        if !self.fits(hundredths) {
            return Err(ScheduleError::InsufficientCapacity {
                node: self.id.clone(),
                needed_hundredths: hundredths,
                free_hundredths: self.capacity_free(),
            });
        }

        Ok(())
    }

    pub fn reserve_hundredths(
        &mut self,
        hundredths: u64,
    ) -> Result<(), ScheduleError> {
        self.ensure_fits(hundredths)?;
        self.reserved += hundredths;
        Ok(())
    }

    /// Drops the planned reservations, at the start of a pass.
    pub fn clear_reservations(&mut self) {
        self.reserved = 0;
    }
}

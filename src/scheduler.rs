//! Plans one pass of weaken/grow/hack jobs over the worker nodes and then
//! launches them.
//!
//! Planning never touches the game except to read capacity. It threads a
//! [`PassContext`] through one handler per [`Stage`], reserving RAM on the
//! nodes as it goes. [`Scheduler::issue`] then launches the planned jobs
//! group by group.

use std::collections::HashSet;

use compact_str::CompactString;
use itertools::Itertools;
use smallvec::SmallVec;
use tracing::{
    debug,
    info,
    warn,
};

use crate::{
    effect::{
        div_ceil,
        hack_threads_for_fraction,
        weaken_threads_to_offset_grow,
        weaken_threads_to_offset_hack,
    },
    env::{
        JobLauncher,
        NodeCapacity,
        Pid,
        TargetQuery,
    },
    error::ScheduleError,
    job::Job,
    node::ResourceNode,
    script_deploy::HGW,
    target::TargetState,
};

// a third cycle would land its corrections on the first cycle's
const MAX_CYCLES: u64 = 2;

// one thread each of hack, grow and weaken
const TRIPLE_HUNDREDTHS: u64 = HGW::Hack.memory_hundredths()
    + HGW::Grow.memory_hundredths()
    + HGW::Weaken.memory_hundredths();

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Weaken,
    Grow,
    Hack,
}

impl Stage {
    /// Picks where a pass starts from the observed target.
    pub fn select(
        target: &TargetState,
        bounds: &StageBounds,
    ) -> Stage {
        if target.security_current > target.security_min + bounds.security {
            Stage::Weaken
        }
        else if target.money_current < target.money_max * bounds.money {
            Stage::Grow
        }
        else {
            Stage::Hack
        }
    }

    fn next(self) -> Option<Stage> {
        use Stage::*;

        match self {
            Weaken => Some(Grow),
            Grow => Some(Hack),
            Hack => None,
        }
    }
}

/// How far the target may drift before a pass goes back to weakening or
/// growing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageBounds {
    /// Security points above the minimum.
    pub security: f64,
    /// Fraction of the maximum money.
    pub money: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BatchShape {
    /// Steal `fraction` of the money per batch and grow all of it back.
    Steal { fraction: f64 },
    /// Fixed hack to grow ratio, scaled by how many copies fit the node.
    Ratio { hack: u64, grow: u64 },
}

impl Default for BatchShape {
    fn default() -> BatchShape {
        BatchShape::Steal { fraction: 0.5 }
    }
}

/// Tunables of the scheduler. Times are in milliseconds.
#[derive(Clone, Debug, PartialEq)]
pub struct SchedulerSettings {
    /// Gap between two landings that must not be reordered.
    pub tick: f64,
    /// Added to the last landing to get the length of a pass.
    pub slack: f64,
    /// Gap between the landings of two batches of the same cycle.
    pub batch_offset: f64,
    /// Grow threads per weaken thread when a node is split.
    pub grow_per_weaken: u64,
    pub shape: BatchShape,
    /// Most of the money a single batch may steal.
    pub steal_cap: f64,
    pub max_batches_per_node: u64,
    pub min_sleep: f64,
    pub sleep_buffer: f64,
}

impl Default for SchedulerSettings {
    fn default() -> SchedulerSettings {
        SchedulerSettings {
            tick: 20.,
            slack: 20.,
            batch_offset: 80.,
            grow_per_weaken: 5,
            shape: BatchShape::default(),
            steal_cap: 0.9,
            max_batches_per_node: 20,
            min_sleep: 3000.,
            sleep_buffer: 100.,
        }
    }
}

impl SchedulerSettings {
    /// Pulls every tunable back into a range the planner can work with.
    pub fn validated(mut self) -> SchedulerSettings {
        self.tick = self.tick.max(1.);
        self.slack = self.slack.max(0.);
        // a batch spans four ticks, slots must not overlap
        self.batch_offset = self.batch_offset.max(4. * self.tick);
        self.grow_per_weaken = self.grow_per_weaken.max(1);
        self.steal_cap = self.steal_cap.clamp(0.01, 0.99);
        self.max_batches_per_node = self.max_batches_per_node.max(1);
        self.min_sleep = self.min_sleep.max(0.);
        self.sleep_buffer = self.sleep_buffer.max(0.);

        self.shape = match self.shape {
            BatchShape::Steal { fraction } => BatchShape::Steal {
                fraction: fraction.clamp(0.01, self.steal_cap),
            },
            BatchShape::Ratio { hack, grow } => BatchShape::Ratio {
                hack: hack.max(1),
                grow: grow.max(1),
            },
        };

        self
    }

    /// How long the orchestrator waits after a pass of `duration`.
    pub fn sleep_millis(
        &self,
        duration: f64,
    ) -> f64 {
        duration.max(self.min_sleep) + self.sleep_buffer
    }
}

/// Where the pass stands while it is being planned.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchPlan {
    pub entry_stage: Stage,
    pub stage: Stage,
    pub remaining_weaken: u64,
    pub remaining_grow: u64,
    pub remaining_batches: u64,
    /// Latest landing planned so far.
    pub virtual_duration: f64,
    pub next_slot: u64,
}

/// Everything a pass has decided so far. `target` is the projected state
/// after all of `jobs` have landed.
#[derive(Clone, Debug, PartialEq)]
pub struct PassContext {
    pub target: TargetState,
    pub plan: BatchPlan,
    pub jobs: Vec<Job>,
    next_correlation: u64,
    next_group: u64,
}

impl PassContext {
    pub fn new(
        target: TargetState,
        stage: Stage,
    ) -> PassContext {
        PassContext {
            target,
            plan: BatchPlan {
                entry_stage: stage,
                stage,
                remaining_weaken: 0,
                remaining_grow: 0,
                remaining_batches: 0,
                virtual_duration: 0.,
                next_slot: 0,
            },
            jobs: vec![],
            next_correlation: 0,
            next_group: 0,
        }
    }

    fn open_group(&mut self) -> u64 {
        let group = self.next_group;
        self.next_group += 1;
        group
    }

    /// `earliest`, or one tick after everything planned so far.
    fn first_landing(
        &self,
        earliest: f64,
        tick: f64,
    ) -> f64 {
        if self.jobs.is_empty() {
            earliest
        }
        else {
            earliest.max(self.plan.virtual_duration + tick)
        }
    }

    fn push(
        &mut self,
        op: HGW,
        threads: u64,
        node: &CompactString,
        landing: f64,
        group: u64,
    ) {
        if threads == 0 {
            return;
        }

        let planned_duration = self.target.operation_time(op);
        let job = Job {
            op,
            threads,
            node: node.clone(),
            target: self.target.host.clone(),
            start_delay: (landing - planned_duration).max(0.),
            planned_duration,
            correlation_id: self.next_correlation,
            group,
            stage: self.plan.stage,
        };
        self.next_correlation += 1;

        debug!(
            node = %job.node,
            op = job.op.name(),
            threads,
            delay = job.start_delay,
            landing = job.landing(),
            "planned"
        );

        self.plan.virtual_duration = self.plan.virtual_duration.max(job.landing());
        self.jobs.push(job);
    }
}

/// Thread counts of one HWGW batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchThreads {
    pub hack: u64,
    pub weaken_hack: u64,
    pub grow: u64,
    pub weaken_grow: u64,
}

impl BatchThreads {
    pub fn new(
        hack: u64,
        grow: u64,
    ) -> BatchThreads {
        BatchThreads {
            hack,
            weaken_hack: weaken_threads_to_offset_hack(hack),
            grow,
            weaken_grow: weaken_threads_to_offset_grow(grow),
        }
    }

    pub fn memory_hundredths(&self) -> u64 {
        self.hack * HGW::Hack.memory_hundredths()
            + self.grow * HGW::Grow.memory_hundredths()
            + (self.weaken_hack + self.weaken_grow)
                * HGW::Weaken.memory_hundredths()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SkippedJob {
    pub job: Job,
    pub reason: ScheduleError,
}

/// What a pass actually launched.
#[derive(Clone, Debug, PartialEq)]
pub struct PassReport {
    pub target: CompactString,
    pub entry_stage: Stage,
    pub final_stage: Stage,
    pub issued: Vec<Job>,
    pub skipped: Vec<SkippedJob>,
    /// Milliseconds until the last issued job has landed, plus slack.
    pub duration: f64,
}

impl PassReport {
    pub fn threads(
        &self,
        op: HGW,
    ) -> u64 {
        self.issued
            .iter()
            .filter(|job| job.op == op)
            .map(|job| job.threads)
            .sum()
    }
}

pub struct Scheduler {
    settings: SchedulerSettings,
}

impl Scheduler {
    pub fn new(settings: SchedulerSettings) -> Scheduler {
        Scheduler {
            settings: settings.validated(),
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Plans and launches one pass.
    pub fn run_pass(
        &self,
        env: &(impl TargetQuery + NodeCapacity + JobLauncher),
        target: TargetState,
        bounds: &StageBounds,
        nodes: &mut [ResourceNode],
    ) -> PassReport {
        let context = self.plan_pass(env, target, bounds, nodes);
        self.issue(env, context, nodes)
    }

    /// Decides every job of the pass without launching anything.
    pub fn plan_pass(
        &self,
        env: &(impl TargetQuery + NodeCapacity),
        target: TargetState,
        bounds: &StageBounds,
        nodes: &mut [ResourceNode],
    ) -> PassContext {
        for node in nodes.iter_mut() {
            node.clear_reservations();
        }

        let entry = Stage::select(&target, bounds);
        let mut context = PassContext::new(target, entry);

        loop {
            let stage = context.plan.stage;
            context = match stage {
                Stage::Weaken => self.weaken_phase(env, context, nodes),
                Stage::Grow => self.grow_phase(env, context, nodes),
                Stage::Hack => self.hack_phase(env, context, nodes),
            };

            if !self.should_cascade(env, &context, nodes) {
                break;
            }

            match context.plan.stage.next() {
                Some(next) => context.plan.stage = next,
                None => break,
            }
        }

        context
    }

    fn should_cascade(
        &self,
        env: &impl NodeCapacity,
        context: &PassContext,
        nodes: &mut [ResourceNode],
    ) -> bool {
        let (done, next_op) = match context.plan.stage {
            Stage::Weaken => (context.plan.remaining_weaken == 0, HGW::Grow),
            Stage::Grow => (context.plan.remaining_grow == 0, HGW::Hack),
            Stage::Hack => return false,
        };

        done && nodes.iter_mut().any(|node| {
            node.refresh(env);
            0 < node.max_threads(next_op)
        })
    }

    fn weaken_phase(
        &self,
        env: &impl NodeCapacity,
        mut context: PassContext,
        nodes: &mut [ResourceNode],
    ) -> PassContext {
        context.plan.remaining_weaken = context.target.weaken_threads_needed();
        let landing = context.target.weaken_time;

        for node in nodes.iter_mut() {
            if context.plan.remaining_weaken == 0 {
                break;
            }

            node.refresh(env);
            let threads = node
                .max_threads(HGW::Weaken)
                .min(context.plan.remaining_weaken);
            if threads == 0 || node.reserve(HGW::Weaken, threads).is_err() {
                continue;
            }

            let group = context.open_group();
            context.push(HGW::Weaken, threads, node.id(), landing, group);

            context.plan.remaining_weaken -= threads;
            context.target = context.target.after_weaken(threads);
        }

        context
    }

    /// Splits `threads` into grow threads and the weaken threads that cover
    /// them, giving grow the larger share.
    fn split_grow(
        &self,
        threads: u64,
        grow_needed: u64,
    ) -> (u64, u64) {
        let per_weaken = self.settings.grow_per_weaken;
        let weakens_for = |grow: u64| {
            div_ceil(grow, per_weaken).max(weaken_threads_to_offset_grow(grow))
        };

        let mut grow = threads * per_weaken / (per_weaken + 1);
        while 0 < grow && threads - grow < weakens_for(grow) {
            grow -= 1;
        }

        let grow = grow.min(grow_needed);
        (grow, weakens_for(grow))
    }

    fn grow_phase(
        &self,
        env: &(impl TargetQuery + NodeCapacity),
        mut context: PassContext,
        nodes: &mut [ResourceNode],
    ) -> PassContext {
        let tick = self.settings.tick;

        context.plan.remaining_grow = context.target.grow_threads_needed(env);

        // the grow lands at `landing` and its weaken one tick later
        let earliest = context
            .target
            .grow_time
            .max(context.target.weaken_time - tick);
        let mut landing = context.first_landing(earliest, tick);

        for node in nodes.iter_mut() {
            if context.plan.remaining_grow == 0 {
                break;
            }

            node.refresh(env);
            let (grow, weaken) = self.split_grow(
                node.max_threads(HGW::Grow),
                context.plan.remaining_grow,
            );
            if grow == 0 {
                continue;
            }

            let memory = grow * HGW::Grow.memory_hundredths()
                + weaken * HGW::Weaken.memory_hundredths();
            if node.reserve_hundredths(memory).is_err() {
                continue;
            }

            let group = context.open_group();
            context.push(HGW::Grow, grow, node.id(), landing, group);
            context.push(HGW::Weaken, weaken, node.id(), landing + tick, group);

            let needed = context.plan.remaining_grow;
            context.target = context
                .target
                .after_grow(grow, needed)
                .after_weaken(weaken);
            context.plan.remaining_grow -= grow;

            landing += 2. * tick;
        }

        context
    }

    fn steal_batch(
        &self,
        env: &impl TargetQuery,
        target: &TargetState,
        fraction: f64,
    ) -> BatchThreads {
        let per_thread = target.hack_fraction;
        let cap = (self.settings.steal_cap / per_thread).floor() as u64;

        let hack = hack_threads_for_fraction(fraction, per_thread)
            .min(cap)
            .max(1);
        // grow back to max from what the hack leaves, not from max
        let grow = target
            .clone()
            .after_hack(hack)
            .grow_threads_needed(env)
            .max(1);

        BatchThreads::new(hack, grow)
    }

    /// The largest multiple of `hack:grow` that fits in `free`, if any.
    fn ratio_batch(
        &self,
        hack: u64,
        grow: u64,
        free: u64,
        target: &TargetState,
    ) -> Option<BatchThreads> {
        let unit = BatchThreads::new(hack, grow).memory_hundredths();
        let per_unit = hack as f64 * target.hack_fraction;
        let cap = (self.settings.steal_cap / per_unit).floor() as u64;
        let scale = (free / unit).min(cap.max(1));

        (0 < scale).then(|| BatchThreads::new(hack * scale, grow * scale))
    }

    /// Landing of the hack of the next batch slot.
    fn take_slot(
        &self,
        plan: &mut BatchPlan,
        first: f64,
        per_cycle: u64,
    ) -> f64 {
        let slot = plan.next_slot;
        plan.next_slot += 1;
        plan.remaining_batches = plan.remaining_batches.saturating_sub(1);

        first
            + (slot % per_cycle) as f64 * self.settings.batch_offset
            + (slot / per_cycle) as f64 * self.settings.tick
    }

    fn push_batch(
        &self,
        env: &impl TargetQuery,
        mut context: PassContext,
        node: &CompactString,
        batch: BatchThreads,
        landing: f64,
    ) -> PassContext {
        let tick = self.settings.tick;

        let group = context.open_group();
        context.push(HGW::Hack, batch.hack, node, landing, group);
        context.push(HGW::Weaken, batch.weaken_hack, node, landing + tick, group);
        context.push(HGW::Grow, batch.grow, node, landing + 2. * tick, group);
        context.push(
            HGW::Weaken,
            batch.weaken_grow,
            node,
            landing + 3. * tick,
            group,
        );

        let hacked = context
            .target
            .after_hack(batch.hack)
            .after_weaken(batch.weaken_hack);
        let needed = hacked.grow_threads_needed(env);
        context.target = hacked
            .after_grow(batch.grow, needed)
            .after_weaken(batch.weaken_grow);

        context
    }

    /// One thread each of hack, grow and weaken per `threads`, landing in
    /// that order. Used by nodes too small for a whole batch.
    fn push_triple(
        &self,
        env: &impl TargetQuery,
        mut context: PassContext,
        node: &CompactString,
        threads: u64,
        landing: f64,
    ) -> PassContext {
        let tick = self.settings.tick;

        let group = context.open_group();
        context.push(HGW::Hack, threads, node, landing, group);
        context.push(HGW::Grow, threads, node, landing + tick, group);
        context.push(HGW::Weaken, threads, node, landing + 2. * tick, group);

        let hacked = context.target.after_hack(threads);
        let needed = hacked.grow_threads_needed(env);
        context.target =
            hacked.after_grow(threads, needed).after_weaken(threads);

        context
    }

    fn hack_phase(
        &self,
        env: &(impl TargetQuery + NodeCapacity),
        mut context: PassContext,
        nodes: &mut [ResourceNode],
    ) -> PassContext {
        let tick = self.settings.tick;

        if context.target.hack_fraction <= 0. {
            warn!(host = %context.target.host, "hacking steals nothing");
            return context;
        }

        let per_cycle = (context.target.weaken_time / self.settings.batch_offset)
            .floor()
            .max(1.) as u64;
        context.plan.remaining_batches = per_cycle * MAX_CYCLES;

        // every step of the first batch has to start at or after zero
        let earliest = context
            .target
            .hack_time
            .max(context.target.grow_time - tick)
            .max(context.target.weaken_time - tick);
        let first = context.first_landing(earliest, tick);

        for node in nodes.iter_mut() {
            if context.plan.remaining_batches == 0 {
                break;
            }

            node.refresh(env);

            let mut emitted = 0;
            while emitted < self.settings.max_batches_per_node
                && 0 < context.plan.remaining_batches
            {
                let batch = match self.settings.shape {
                    BatchShape::Steal { fraction } => {
                        Some(self.steal_batch(env, &context.target, fraction))
                    },
                    BatchShape::Ratio { hack, grow } => self.ratio_batch(
                        hack,
                        grow,
                        node.capacity_free(),
                        &context.target,
                    ),
                };

                let batch = match batch {
                    Some(batch) => batch,
                    None => break,
                };
                if node.reserve_hundredths(batch.memory_hundredths()).is_err() {
                    break;
                }

                let landing = self.take_slot(&mut context.plan, first, per_cycle);
                context = self.push_batch(env, context, node.id(), batch, landing);
                emitted += 1;
            }

            if 0 < emitted || context.plan.remaining_batches == 0 {
                continue;
            }

            let threads = node.capacity_free() / TRIPLE_HUNDREDTHS;
            if threads == 0
                || node
                    .reserve_hundredths(threads * TRIPLE_HUNDREDTHS)
                    .is_err()
            {
                continue;
            }

            let landing = self.take_slot(&mut context.plan, first, per_cycle);
            context = self.push_triple(env, context, node.id(), threads, landing);
        }

        context
    }

    fn launch(
        &self,
        env: &(impl JobLauncher + NodeCapacity),
        job: &Job,
        nodes: &mut [ResourceNode],
    ) -> Result<Pid, ScheduleError> {
        let node = nodes
            .iter_mut()
            .find(|node| node.id() == &job.node)
            .ok_or_else(|| ScheduleError::InsufficientCapacity {
                node: job.node.clone(),
                needed_hundredths: job.memory_hundredths(),
                free_hundredths: 0,
            })?;

        // the game is authoritative again from here on
        node.refresh(env);
        node.ensure_fits(job.memory_hundredths())?;

        env.launch(
            &job.node,
            job.op,
            job.threads,
            &job.target,
            job.start_delay,
            &job.tag(),
        )
    }

    /// Launches the planned jobs. Failed jobs are skipped and never retried;
    /// a group whose weaken failed does not launch its grow or hack.
    pub fn issue(
        &self,
        env: &(impl JobLauncher + NodeCapacity),
        context: PassContext,
        nodes: &mut [ResourceNode],
    ) -> PassReport {
        let PassContext {
            target, plan, jobs, ..
        } = context;

        for node in nodes.iter_mut() {
            node.clear_reservations();
        }

        let mut issued = vec![];
        let mut skipped = vec![];
        let mut launched = HashSet::new();

        for (_, group) in &jobs.into_iter().group_by(|job| job.group) {
            let mut group = group.collect::<SmallVec<[Job; 4]>>();
            group.sort_by_key(|job| !job.op.is_correction());

            let mut failed_correction: Option<ScheduleError> = None;
            for job in group {
                if !launched.insert(job.correlation_id) {
                    continue;
                }

                let result = match &failed_correction {
                    Some(error) if !job.op.is_correction() => Err(error.clone()),
                    _ => self.launch(env, &job, nodes),
                };

                match result {
                    Ok(pid) => {
                        debug!(
                            pid,
                            node = %job.node,
                            op = job.op.name(),
                            threads = job.threads,
                            "launched"
                        );
                        issued.push(job);
                    },
                    Err(error) => {
                        warn!(
                            node = %job.node,
                            op = job.op.name(),
                            threads = job.threads,
                            %error,
                            "skipped"
                        );

                        if job.op.is_correction() && failed_correction.is_none() {
                            failed_correction = Some(error.clone());
                        }

                        skipped.push(SkippedJob {
                            job,
                            reason: error,
                        });
                    },
                }
            }
        }

        let last_landing = issued
            .iter()
            .map(Job::landing)
            .fold(None, |last: Option<f64>, landing| {
                Some(last.map_or(landing, |last| last.max(landing)))
            });
        let duration =
            last_landing.unwrap_or(target.weaken_time) + self.settings.slack;

        let report = PassReport {
            target: target.host,
            entry_stage: plan.entry_stage,
            final_stage: plan.stage,
            issued,
            skipped,
            duration,
        };

        info!(
            host = %report.target,
            entry = ?report.entry_stage,
            stage = ?report.final_stage,
            hack = report.threads(HGW::Hack),
            grow = report.threads(HGW::Grow),
            weaken = report.threads(HGW::Weaken),
            skipped = report.skipped.len(),
            duration = report.duration,
            "pass issued"
        );

        report
    }
}

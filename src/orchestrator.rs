use clap::{
    Args,
    ValueEnum,
};
use tracing::{
    error,
    info,
    warn,
    Level,
};

use crate::{
    config::AttackConfig,
    env::{
        Game,
        Storage,
        Topology,
    },
    error::ScheduleError,
    fleet::grow_fleet,
    logging::{
        self,
        LogBuffer,
    },
    registry::{
        can_attack,
        MachineRegistry,
    },
    scheduler::{
        BatchShape,
        PassReport,
        Scheduler,
        SchedulerSettings,
    },
    target::TargetState,
};

#[derive(Debug)]
pub enum PassOutcome {
    /// The config says the attack is off.
    Stopped,
    Pass {
        report: PassReport,
        sleep_millis: f64,
    },
}

/// Resolves the server to attack and records a changed pick in the config.
fn select_target(
    env: &(impl Topology + Storage),
    config: &mut AttackConfig,
    registry: &MachineRegistry,
) -> Result<String, ScheduleError> {
    if !config.auto_target {
        return match can_attack(env, &config.target) {
            true => Ok(config.target.clone()),
            false => Err(ScheduleError::InvalidTarget(config.target.clone())),
        };
    }

    let best = registry
        .best_target(env)
        .map(|m| m.get_hostname().to_owned())
        .ok_or_else(|| ScheduleError::InvalidTarget(config.target.clone()))?;

    if best != config.target {
        info!(from = %config.target, to = %best, "switching target");
        config.target = best.clone();

        if let Err(error) = config.save(env) {
            warn!(%error, "target switch not saved");
        }
    }

    Ok(best)
}

pub struct Orchestrator {
    scheduler: Scheduler,
    registry: MachineRegistry,
}

impl Orchestrator {
    pub fn new(
        env: &impl Game,
        settings: SchedulerSettings,
    ) -> Orchestrator {
        Orchestrator {
            scheduler: Scheduler::new(settings),
            registry: MachineRegistry::initialize(env),
        }
    }

    /// Runs one pass from a freshly read config and fresh game state.
    pub fn run_once(
        &mut self,
        env: &impl Game,
    ) -> Result<PassOutcome, ScheduleError> {
        let mut config = AttackConfig::load(env);
        if !config.started {
            return Ok(PassOutcome::Stopped);
        }

        if config.auto_grow {
            let bought = grow_fleet(env, config.locked_budget);
            if !bought.is_empty() {
                info!(count = bought.len(), "fleet grown");
            }
        }

        self.registry.refresh(env);
        let host = select_target(env, &mut config, &self.registry)?;
        let target = TargetState::observe(env, &host)?;

        let mut nodes = self.registry.resource_nodes(env, config.home_lock_gb());
        let report = self.scheduler.run_pass(
            env,
            target,
            &config.bounds(),
            &mut nodes,
        );
        let sleep_millis =
            self.scheduler.settings().sleep_millis(report.duration);

        Ok(PassOutcome::Pass {
            report,
            sleep_millis,
        })
    }

    /// Passes until the attack is stopped or the target turns out invalid.
    pub async fn run(
        &mut self,
        env: &impl Game,
        logs: &LogBuffer,
    ) {
        loop {
            let outcome = self.run_once(env);

            match outcome {
                Ok(PassOutcome::Stopped) => {
                    info!("attack is stopped");
                    logs.flush_to(env);
                    break;
                },
                Ok(PassOutcome::Pass { sleep_millis, .. }) => {
                    logs.flush_to(env);
                    env.sleep(sleep_millis).await;
                },
                Err(error) => {
                    error!(%error, "attack aborted");
                    logs.flush_to(env);
                    env.alert(&format!("attack aborted: {}", error));
                    break;
                },
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl From<LogLevel> for Level {
    fn from(from: LogLevel) -> Level {
        use LogLevel::*;

        match from {
            Error => Level::ERROR,
            Warn => Level::WARN,
            Info => Level::INFO,
            Debug => Level::DEBUG,
        }
    }
}

/// Parses `hack:grow`, e.g. `5:3`.
fn parse_ratio(text: &str) -> Result<(u64, u64), String> {
    let invalid = || format!("expected hack:grow, got {:?}", text);

    let (hack, grow) = text.split_once(':').ok_or_else(invalid)?;
    let hack = hack.trim().parse::<u64>().map_err(|_| invalid())?;
    let grow = grow.trim().parse::<u64>().map_err(|_| invalid())?;

    if hack == 0 || grow == 0 {
        return Err(invalid());
    }

    Ok((hack, grow))
}

/// Runs the attack loop until the config says stop.
#[derive(Args, Debug, Default)]
pub struct AttackMode {
    /// Milliseconds between two landings that must stay ordered.
    #[arg(long)]
    tick: Option<f64>,
    /// Milliseconds added to the last landing of a pass.
    #[arg(long)]
    slack: Option<f64>,
    /// Milliseconds between two batches of the same cycle.
    #[arg(long)]
    batch_offset: Option<f64>,
    /// Grow threads per weaken thread when a node is split.
    #[arg(long)]
    grow_per_weaken: Option<u64>,
    /// Fraction of the money each batch steals.
    #[arg(long)]
    steal: Option<f64>,
    /// Fixed hack:grow thread ratio instead of a stolen fraction.
    #[arg(long, value_parser = parse_ratio, conflicts_with = "steal")]
    ratio: Option<(u64, u64)>,
    /// Most of the money a single batch may steal.
    #[arg(long)]
    steal_cap: Option<f64>,
    #[arg(long)]
    max_batches_per_node: Option<u64>,
    /// Shortest wait between passes in milliseconds.
    #[arg(long)]
    min_sleep: Option<f64>,
    #[arg(long, value_enum, default_value_t)]
    log_level: LogLevel,
}

impl AttackMode {
    pub fn settings(&self) -> SchedulerSettings {
        let defaults = SchedulerSettings::default();

        let shape = match (self.ratio, self.steal) {
            (Some((hack, grow)), _) => BatchShape::Ratio { hack, grow },
            (None, Some(fraction)) => BatchShape::Steal { fraction },
            (None, None) => defaults.shape,
        };

        SchedulerSettings {
            tick: self.tick.unwrap_or(defaults.tick),
            slack: self.slack.unwrap_or(defaults.slack),
            batch_offset: self.batch_offset.unwrap_or(defaults.batch_offset),
            grow_per_weaken: self
                .grow_per_weaken
                .unwrap_or(defaults.grow_per_weaken),
            shape,
            steal_cap: self.steal_cap.unwrap_or(defaults.steal_cap),
            max_batches_per_node: self
                .max_batches_per_node
                .unwrap_or(defaults.max_batches_per_node),
            min_sleep: self.min_sleep.unwrap_or(defaults.min_sleep),
            ..defaults
        }
        .validated()
    }

    pub async fn execute(
        &self,
        env: &impl Game,
    ) {
        let logs = logging::init(self.log_level.into());
        let settings = self.settings();
        info!(?settings, "attack loop starting");

        Orchestrator::new(env, settings).run(env, logs).await;
    }
}

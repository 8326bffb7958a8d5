use std::fmt::Write as _;

use clap::Args;
use tracing::info;

use crate::{
    config::AttackConfig,
    env::{
        Console,
        Storage,
        TargetQuery,
    },
    error::ConfigError,
};

/// Parses amounts like `250m` or `1.5b`.
pub fn parse_money(text: &str) -> Result<f64, ConfigError> {
    let cleaned = text.trim().to_lowercase().replace([',', '_'], "");

    let (number, multiplier) = match cleaned.char_indices().last() {
        Some((i, 'k')) => (&cleaned[.. i], 1e3),
        Some((i, 'm')) => (&cleaned[.. i], 1e6),
        Some((i, 'b')) => (&cleaned[.. i], 1e9),
        Some((i, 't')) => (&cleaned[.. i], 1e12),
        _ => (&*cleaned, 1.),
    };

    match number.parse::<f64>() {
        Ok(value) if value.is_finite() && 0. <= value => Ok(value * multiplier),
        _ => Err(ConfigError::MoneyAmount(text.to_owned())),
    }
}

/// Changes the persisted attack config.
#[derive(Args, Debug, Default)]
pub struct MasterMode {
    /// Start attacking. Takes effect once the `attack` command is running.
    #[arg(long, conflicts_with = "stop")]
    start: bool,
    /// Stop after the current pass.
    #[arg(long)]
    stop: bool,
    /// Print the config after applying the changes.
    #[arg(long)]
    info: bool,
    /// Server to attack, or "auto" to pick the most profitable one.
    #[arg(long)]
    target: Option<String>,
    /// Security points above the minimum before weakening takes over.
    #[arg(long)]
    bound_sec: Option<f64>,
    /// Fraction of the max money below which growing takes over.
    #[arg(long)]
    bound_money: Option<f64>,
    /// GB kept free on home. Never less than 20.
    #[arg(long)]
    locked_ram: Option<f64>,
    /// Money kept out of reach, e.g. 250m.
    #[arg(long, value_parser = parse_money)]
    locked_budget: Option<f64>,
    /// Spend the money above the locked budget on purchased servers.
    #[arg(long)]
    auto_grow: Option<bool>,
}

impl MasterMode {
    /// Applies the flags to `config`, returning what should be reported.
    pub fn apply(
        &self,
        env: &impl TargetQuery,
        config: &mut AttackConfig,
    ) -> Vec<String> {
        let mut messages = vec![];

        if self.start {
            config.started = true;
            messages.push(
                "attack started, run `attack` if it is not already running"
                    .to_owned(),
            );
        }

        if self.stop {
            config.started = false;
            messages.push("attack stopped".to_owned());
        }

        match self.target.as_deref() {
            Some("auto") => {
                config.target = String::new();
                config.auto_target = true;
                messages.push("picking the most profitable target".to_owned());
            },
            Some(target) if env.server_exists(target) => {
                config.target = target.to_owned();
                config.auto_target = false;
                messages.push(format!("target changed to {}", target));
            },
            Some(target) => {
                messages.push(format!("unknown server {:?}, target unchanged", target));
            },
            None => {},
        }

        if let Some(bound_sec) = self.bound_sec {
            config.bound_sec = bound_sec.clamp(0.5, 99.);
            messages.push(format!("security boundary: {:.2}", config.bound_sec));
        }

        if let Some(bound_money) = self.bound_money {
            config.bound_money = bound_money.clamp(0., 1.);
            messages.push(format!("money boundary: {:.2}", config.bound_money));
        }

        if let Some(locked_ram) = self.locked_ram {
            config.locked_ram = locked_ram.max(0.);
            messages.push(format!("home keeps {:.2} GB free", config.home_lock_gb()));
        }

        if let Some(locked_budget) = self.locked_budget {
            config.locked_budget = locked_budget;
            messages.push(format!("locked budget: {:.0}", config.locked_budget));
        }

        if let Some(auto_grow) = self.auto_grow {
            config.auto_grow = auto_grow;
            messages.push(match auto_grow {
                true => "buying servers above the locked budget".to_owned(),
                false => "not buying servers".to_owned(),
            });
        }

        messages
    }

    pub fn execute(
        &self,
        env: &(impl TargetQuery + Storage + Console),
    ) -> Result<AttackConfig, ConfigError> {
        let mut config = AttackConfig::load(env);
        let messages = self.apply(env, &mut config);

        config.save(env)?;
        info!(started = config.started, host = %config.target, "config saved");

        let mut print_str = "\n".to_owned();
        for message in messages.iter() {
            // writing into a String cannot fail
            let _ = writeln!(&mut print_str, "{}", message);
        }

        if self.info {
            let _ = writeln!(
                &mut print_str,
                "config:\n{}",
                serde_json::to_string_pretty(&config)?
            );
        }

        env.tprint(&*print_str);

        Ok(config)
    }
}

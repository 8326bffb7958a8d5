use serde::{
    Deserialize,
    Serialize,
};
use tracing::warn;

use crate::{
    env::Storage,
    error::ConfigError,
    scheduler::StageBounds,
};

pub const CONFIG_FILE: &str = "data.config";

/// RAM always kept free on home, in GB, whatever the config says.
pub const MIN_HOME_LOCK_GB: f64 = 20.;

/// The persisted state of the attack, shared by `attack` and `master`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttackConfig {
    pub started: bool,
    /// Empty until a target has been picked.
    pub target: String,
    pub auto_target: bool,
    pub bound_sec: f64,
    pub bound_money: f64,
    /// GB kept free on home.
    pub locked_ram: f64,
    /// Money kept out of reach of anything that spends.
    pub locked_budget: f64,
    /// Buy and upgrade purchased servers with the money above the budget.
    pub auto_grow: bool,
}

impl Default for AttackConfig {
    fn default() -> AttackConfig {
        AttackConfig {
            started: false,
            target: String::new(),
            auto_target: true,
            bound_sec: 4.,
            bound_money: 0.6,
            locked_ram: MIN_HOME_LOCK_GB,
            locked_budget: 0.,
            auto_grow: false,
        }
    }
}

impl AttackConfig {
    /// Parses the config file. An empty file is the default config.
    pub fn parse(text: &str) -> Result<AttackConfig, ConfigError> {
        if text.trim().is_empty() {
            return Ok(AttackConfig::default());
        }

        serde_json::from_str::<AttackConfig>(text)
            .map(AttackConfig::clamped)
            .map_err(|source| ConfigError::Parse {
                file: CONFIG_FILE,
                source,
            })
    }

    /// Reads the config, falling back to the defaults when it is unreadable.
    pub fn load(env: &impl Storage) -> AttackConfig {
        match AttackConfig::parse(&env.read(CONFIG_FILE)) {
            Ok(config) => config,
            Err(error) => {
                warn!(%error, "using the default config");
                AttackConfig::default()
            },
        }
    }

    pub fn save(
        &self,
        env: &impl Storage,
    ) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(&self.clone().clamped())?;
        env.write(CONFIG_FILE, &text);
        Ok(())
    }

    pub fn clamped(mut self) -> AttackConfig {
        self.bound_sec = self.bound_sec.clamp(0.5, 99.);
        self.bound_money = self.bound_money.clamp(0., 1.);
        self.locked_ram = self.locked_ram.max(0.);
        self.locked_budget = self.locked_budget.max(0.);
        self
    }

    pub fn bounds(&self) -> StageBounds {
        StageBounds {
            security: self.bound_sec,
            money: self.bound_money,
        }
    }

    pub fn home_lock_gb(&self) -> f64 {
        self.locked_ram.max(MIN_HOME_LOCK_GB)
    }
}

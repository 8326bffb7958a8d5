//! Everything the attack loop needs from the game.
//!
//! `NsWrapper` implements all of these against the real `NS` object; the
//! tests use an in-memory game instead.

use crate::{
    error::ScheduleError,
    machine::ServerDetails,
    script_deploy::HGW,
};

pub type Pid = usize;

pub trait TargetQuery {
    fn server_exists(
        &self,
        host: &str,
    ) -> bool;

    /// Returns `(current, min)`.
    fn security(
        &self,
        host: &str,
    ) -> (f64, f64);

    /// Returns `(current, max)`.
    fn money(
        &self,
        host: &str,
    ) -> (f64, f64);

    /// Milliseconds a single `op` against `host` takes right now.
    fn operation_time(
        &self,
        host: &str,
        op: HGW,
    ) -> f64;

    /// Fraction of the current money stolen by one hack thread.
    fn hack_fraction(
        &self,
        host: &str,
    ) -> f64;

    /// Grow threads that multiply the money on `host` by `multiplier`.
    fn growth_threads(
        &self,
        host: &str,
        multiplier: f64,
    ) -> f64;
}

pub trait NodeCapacity {
    /// Returns `(total, used)` RAM in GB.
    fn capacity(
        &self,
        host: &str,
    ) -> (f64, f64);
}

pub trait JobLauncher {
    /// Starts `threads` threads of `op` on `node` against `target`, sleeping
    /// `delay` milliseconds first. `tag` keeps the argument list unique.
    fn launch(
        &self,
        node: &str,
        op: HGW,
        threads: u64,
        target: &str,
        delay: f64,
        tag: &str,
    ) -> Result<Pid, ScheduleError>;
}

pub trait Topology {
    fn scan(
        &self,
        host: &str,
    ) -> Vec<String>;

    fn server_details(
        &self,
        host: &str,
    ) -> Option<ServerDetails>;

    fn has_root(
        &self,
        host: &str,
    ) -> bool;

    fn hacking_level(&self) -> usize;

    /// Runs every port opener we own, then nukes. Returns root access.
    fn try_root(
        &self,
        host: &str,
    ) -> bool;
}

pub trait Storage {
    fn read(
        &self,
        file: &str,
    ) -> String;

    fn write(
        &self,
        file: &str,
        data: &str,
    );

    fn file_exists(
        &self,
        file: &str,
        host: &str,
    ) -> bool;

    /// Copies `file` from the current host to `destination`.
    fn copy_to(
        &self,
        file: &str,
        destination: &str,
    ) -> bool;

    fn current_host(&self) -> String;
}

#[allow(async_fn_in_trait)]
pub trait Console {
    /// Writes to the script log.
    fn print(
        &self,
        text: &str,
    );

    /// Writes to the terminal.
    fn tprint(
        &self,
        text: &str,
    );

    fn alert(
        &self,
        text: &str,
    );

    async fn sleep(
        &self,
        millis: f64,
    );
}

/// Buying and upgrading purchased servers. RAM is in GB.
pub trait Market {
    fn player_money(&self) -> f64;

    fn purchased_servers(&self) -> Vec<String>;

    fn purchased_server_limit(&self) -> usize;

    fn purchased_server_max_ram(&self) -> f64;

    fn purchased_server_cost(
        &self,
        ram: f64,
    ) -> f64;

    /// Price of taking `host` to `ram`. Not finite or negative when the
    /// upgrade is impossible.
    fn purchased_server_upgrade_cost(
        &self,
        host: &str,
        ram: f64,
    ) -> f64;

    /// Returns the hostname of the new server.
    fn purchase_server(
        &self,
        host: &str,
        ram: f64,
    ) -> Option<String>;

    fn upgrade_purchased_server(
        &self,
        host: &str,
        ram: f64,
    ) -> bool;
}

/// The whole game surface.
pub trait Game:
    TargetQuery
    + NodeCapacity
    + JobLauncher
    + Topology
    + Storage
    + Console
    + Market
{
}

impl<T> Game for T where
    T: TargetQuery
        + NodeCapacity
        + JobLauncher
        + Topology
        + Storage
        + Console
        + Market
{
}

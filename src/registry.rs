use std::{
    cmp::Reverse,
    collections::BTreeSet,
};

use decorum::N64;
use tracing::{
    debug,
    info,
};

use crate::{
    effect::to_hundredths,
    env::{
        NodeCapacity,
        Storage,
        Topology,
    },
    machine::{
        get_machines,
        Machine,
    },
    node::ResourceNode,
    script_deploy::deploy_workers,
};

/// Smallest server worth running workers on, in GB.
pub const MIN_ATTACKER_RAM: f64 = 2.;

/// Whether `hack()` and `grow()` can work on `host` right now: it exists,
/// is rooted and is within the hacking level.
pub fn can_attack(
    env: &impl Topology,
    host: &str,
) -> bool {
    let required_skill = match env.server_details(host) {
        Some(details) => details.required_hacking_skill,
        None => return false,
    };

    env.has_root(host) && required_skill <= env.hacking_level()
}

/// Every server on the network, plus the ones that are ready to run workers.
///
/// Rebuilt from a fresh scan on every [`refresh`](MachineRegistry::refresh),
/// so servers rooted or bought since the last pass are picked up.
#[derive(Debug, Default)]
pub struct MachineRegistry {
    machines: Vec<Machine>,
    workers: BTreeSet<String>,
}

impl MachineRegistry {
    pub fn initialize(
        env: &(impl Topology + Storage + NodeCapacity)
    ) -> MachineRegistry {
        let mut registry = MachineRegistry::default();
        registry.refresh(env);
        registry
    }

    /// Scans the network again, roots whatever became reachable and puts
    /// the worker scripts on every rooted server with RAM.
    pub fn refresh(
        &mut self,
        env: &(impl Topology + Storage + NodeCapacity),
    ) {
        self.machines = get_machines(env);

        for machine in self.machines.iter() {
            let hostname = machine.get_hostname();

            if !env.has_root(hostname) {
                if !env.try_root(hostname) {
                    debug!(
                        host = hostname,
                        ports = machine.get_required_open_ports(),
                        "cannot root yet"
                    );
                    continue;
                }

                info!(host = hostname, "rooted");
            }

            let (total_gb, _) = env.capacity(hostname);
            if total_gb < MIN_ATTACKER_RAM || self.workers.contains(hostname) {
                continue;
            }

            if deploy_workers(env, hostname) {
                debug!(host = hostname, "workers deployed");
                self.workers.insert(hostname.to_owned());
            }
        }

        // servers can vanish, e.g. sold purchased servers
        let known = self
            .machines
            .iter()
            .map(|m| m.get_hostname())
            .collect::<BTreeSet<_>>();
        self.workers.retain(|w| known.contains(w.as_str()));
    }

    pub fn machines(&self) -> &[Machine] {
        &*self.machines
    }

    /// Servers with workers deployed, largest RAM first.
    pub fn attackers(
        &self,
        env: &impl NodeCapacity,
    ) -> Vec<String> {
        let mut attackers = self
            .workers
            .iter()
            .map(|w| (w.clone(), env.capacity(w).0))
            .filter(|(_, total_gb)| MIN_ATTACKER_RAM <= *total_gb)
            .collect::<Vec<_>>();

        attackers
            .sort_by_key(|(_, total_gb)| Reverse(N64::from_inner(*total_gb)));

        attackers.into_iter().map(|(w, _)| w).collect()
    }

    /// Resource nodes for the attackers. `home_lock_gb` stays free on home.
    pub fn resource_nodes(
        &self,
        env: &impl NodeCapacity,
        home_lock_gb: f64,
    ) -> Vec<ResourceNode> {
        self.attackers(env)
            .into_iter()
            .map(|hostname| {
                let locked = match hostname == "home" {
                    true => to_hundredths(home_lock_gb),
                    false => 0,
                };

                let mut node = ResourceNode::new(hostname, locked);
                node.refresh(env);
                node
            })
            .collect()
    }

    /// Rooted servers we can hack that have money, most profitable first.
    pub fn targets_by_profit(
        &self,
        env: &impl Topology,
    ) -> Vec<&Machine> {
        let level = env.hacking_level();

        let mut targets = self
            .machines
            .iter()
            .filter(|m| 0. < m.get_profit_value())
            .filter(|m| m.get_min_hacking_skill() <= level)
            .filter(|m| env.has_root(m.get_hostname()))
            .collect::<Vec<_>>();

        targets.sort_by_cached_key(|m| {
            Reverse(N64::from_inner(m.get_profit_value()))
        });

        targets
    }

    pub fn best_target(
        &self,
        env: &impl Topology,
    ) -> Option<&Machine> {
        self.targets_by_profit(env).into_iter().next()
    }
}

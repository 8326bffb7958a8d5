use std::collections::VecDeque;

use crate::env::Topology;

/// Attributes of a server that stay constant until the next augmentation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ServerDetails {
    pub max_money: f64,
    pub min_security: f64,
    pub required_hacking_skill: usize,
    pub required_open_ports: usize,
    pub purchased_by_player: bool,
}

#[derive(Clone, Debug)]
pub struct Machine {
    hostname: String,
    degree: usize,
    traversal: Vec<String>,
    details: ServerDetails,
}

impl Machine {
    fn with_details(
        env: &impl Topology,
        hostname: String,
        degree: usize,
        traversal: Vec<String>,
    ) -> Option<Machine> {
        let details = env.server_details(&hostname)?;

        Some(Machine {
            hostname,
            degree,
            traversal,
            details,
        })
    }

    pub fn home(env: &impl Topology) -> Machine {
        let hostname = "home".to_owned();
        let traversal = vec![hostname.clone()];

        Machine::with_details(env, hostname.clone(), 0, traversal.clone())
            .unwrap_or(Machine {
                hostname,
                degree: 0,
                traversal,
                details: ServerDetails {
                    purchased_by_player: true,
                    ..ServerDetails::default()
                },
            })
    }

    pub fn create_child(
        &self,
        env: &impl Topology,
        hostname: String,
    ) -> Option<Machine> {
        let mut traversal = self.traversal.clone();
        traversal.push(hostname.clone());

        Machine::with_details(env, hostname, self.degree + 1, traversal)
    }

    pub fn get_hostname(&self) -> &str {
        &*self.hostname
    }

    pub fn get_degree(&self) -> usize {
        self.degree
    }

    pub fn get_traversal(&self) -> &[String] {
        &*self.traversal
    }

    pub fn get_max_money(&self) -> f64 {
        self.details.max_money
    }

    pub fn is_player_owned(&self) -> bool {
        self.details.purchased_by_player
    }

    pub fn get_min_hacking_skill(&self) -> usize {
        self.details.required_hacking_skill
    }

    pub fn get_min_security(&self) -> f64 {
        self.details.min_security
    }

    pub fn get_required_open_ports(&self) -> usize {
        self.details.required_open_ports
    }

    /// Money per point of minimum security. Zero for servers that are not
    /// worth attacking at all.
    pub fn get_profit_value(&self) -> f64 {
        if self.is_player_owned()
            || self.get_max_money() <= 0.
            || self.get_min_security() <= 0.
        {
            return 0.;
        }

        (self.get_max_money() / self.get_min_security()).ceil()
    }
}

/// Walks the network breadth first, starting from home.
pub fn get_machines(env: &impl Topology) -> Vec<Machine> {
    let mut traversed: Vec<Machine> = vec![];
    let mut pending = VecDeque::new();
    pending.push_front(Machine::home(env));

    while let Some(machine) = pending.pop_back() {
        for child_name in env.scan(machine.get_hostname()) {
            // don't consider machines that are already found
            let found_already = traversed
                .iter()
                .chain(pending.iter())
                .any(|t| t.get_hostname() == child_name)
                || machine.get_hostname() == child_name;
            if found_already {
                continue;
            }

            if let Some(child) = machine.create_child(env, child_name) {
                pending.push_front(child);
            }
        }

        // put this node into the list of traversed machines
        traversed.push(machine);
    }

    traversed
}

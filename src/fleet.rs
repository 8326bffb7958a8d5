//! Spends the money above the locked budget on purchased servers.

use decorum::N64;
use tracing::{
    info,
    warn,
};

use crate::env::{
    Market,
    NodeCapacity,
};

/// RAM of a freshly bought server, in GB.
pub const INITIAL_SERVER_RAM: f64 = 4.;

// upper bound on purchases in one call, the game caps servers at 25
const MAX_PURCHASES: usize = 64;

#[derive(Clone, Debug, PartialEq)]
pub enum Purchase {
    NewServer {
        host: String,
        ram: f64,
        cost: f64,
    },
    Upgrade {
        host: String,
        ram: f64,
        cost: f64,
    },
}

impl Purchase {
    pub fn cost(&self) -> f64 {
        match self {
            Purchase::NewServer { cost, .. } | Purchase::Upgrade { cost, .. } => {
                *cost
            },
        }
    }

    /// Makes the purchase. Returns whether the game accepted it.
    fn make(
        &self,
        env: &impl Market,
    ) -> bool {
        match self {
            Purchase::NewServer { host, ram, cost } => {
                match env.purchase_server(host, *ram) {
                    Some(bought) => {
                        info!(host = %bought, ram, cost, "bought server");
                        true
                    },
                    None => false,
                }
            },
            Purchase::Upgrade { host, ram, cost } => {
                let upgraded = env.upgrade_purchased_server(host, *ram);
                if upgraded {
                    info!(host = %host, ram, cost, "upgraded server");
                }
                upgraded
            },
        }
    }
}

/// Every purchase available right now: one new server while under the
/// limit, and doubling the RAM of each owned server below the max.
pub fn available_purchases(
    env: &(impl Market + NodeCapacity)
) -> Vec<Purchase> {
    let owned = env.purchased_servers();
    let max_ram = env.purchased_server_max_ram();
    let mut purchases = vec![];

    if owned.len() < env.purchased_server_limit() {
        let host = (0..)
            .map(|i| format!("pserv-{}", i))
            .find(|name| !owned.contains(name))
            .unwrap_or_default();

        purchases.push(Purchase::NewServer {
            host,
            ram: INITIAL_SERVER_RAM,
            cost: env.purchased_server_cost(INITIAL_SERVER_RAM),
        });
    }

    for host in owned.into_iter() {
        let (current_ram, _) = env.capacity(&host);
        let ram = current_ram * 2.;
        if current_ram <= 0. || max_ram < ram {
            continue;
        }

        let cost = env.purchased_server_upgrade_cost(&host, ram);
        if cost.is_finite() && 0. <= cost {
            purchases.push(Purchase::Upgrade { host, ram, cost });
        }
    }

    purchases
}

/// Buys the cheapest available purchase until none fits in the money above
/// `locked_budget`. Returns what was bought, in order.
pub fn grow_fleet(
    env: &(impl Market + NodeCapacity),
    locked_budget: f64,
) -> Vec<Purchase> {
    let mut bought = vec![];

    while bought.len() < MAX_PURCHASES {
        let budget = env.player_money() - locked_budget.max(0.);

        let cheapest = available_purchases(env)
            .into_iter()
            .filter(|p| p.cost() <= budget)
            .min_by_key(|p| N64::from_inner(p.cost()));

        let purchase = match cheapest {
            Some(purchase) => purchase,
            None => break,
        };

        if !purchase.make(env) {
            warn!(?purchase, "purchase refused");
            break;
        }

        bought.push(purchase);
    }

    bought
}

//! An in-memory game for the unit tests.

use std::{
    cell::{
        Cell,
        RefCell,
    },
    collections::{
        BTreeMap,
        HashMap,
        HashSet,
    },
};

use crate::{
    env::{
        Console,
        JobLauncher,
        Market,
        NodeCapacity,
        Pid,
        Storage,
        TargetQuery,
        Topology,
    },
    error::ScheduleError,
    machine::ServerDetails,
    script_deploy::HGW,
};

const CURRENT_HOST: &str = "home";

// grow threads per unit of multiplier above one
const GROWTH_SCALE: f64 = 100.;

const SERVER_PRICE_PER_GB: f64 = 55_000.;

#[derive(Clone, Debug)]
pub struct FakeServer {
    /// Hundredths of a GB.
    pub max_ram: u64,
    pub used_ram: u64,
    pub money: f64,
    pub max_money: f64,
    pub security: f64,
    pub min_security: f64,
    pub hack_time: f64,
    pub grow_time: f64,
    pub weaken_time: f64,
    pub hack_fraction: f64,
    pub rooted: bool,
    pub purchased: bool,
    pub required_skill: usize,
    pub required_ports: usize,
}

impl FakeServer {
    /// A rooted, player owned server with RAM and no money.
    pub fn node(
        total_gb: f64,
        used_gb: f64,
    ) -> FakeServer {
        FakeServer {
            max_ram: (total_gb * 100.).round() as u64,
            used_ram: (used_gb * 100.).round() as u64,
            money: 0.,
            max_money: 0.,
            security: 1.,
            min_security: 1.,
            hack_time: 3000.,
            grow_time: 4000.,
            weaken_time: 5000.,
            hack_fraction: 0.01,
            rooted: true,
            purchased: true,
            required_skill: 0,
            required_ports: 0,
        }
    }

    /// A rooted server with full money at minimum security and no RAM.
    pub fn target(
        max_money: f64,
        min_security: f64,
    ) -> FakeServer {
        FakeServer {
            money: max_money,
            max_money,
            security: min_security,
            min_security,
            purchased: false,
            required_skill: 1,
            ..FakeServer::node(0., 0.)
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Launch {
    pub node: String,
    pub op: HGW,
    pub threads: u64,
    pub target: String,
    pub delay: f64,
    pub tag: String,
}

pub struct FakeGame {
    servers: RefCell<BTreeMap<String, FakeServer>>,
    links: RefCell<Vec<(String, String)>>,
    files: RefCell<HashMap<(String, String), String>>,
    copies: RefCell<Vec<(String, String)>>,
    launches: RefCell<Vec<Launch>>,
    rejected: RefCell<HashSet<(String, HGW)>>,
    printed: RefCell<Vec<String>>,
    terminal: RefCell<Vec<String>>,
    alerts: RefCell<Vec<String>>,
    sleeps: RefCell<Vec<f64>>,
    sleep_hook: RefCell<Option<Box<dyn Fn(&FakeGame)>>>,
    hacking_level: Cell<usize>,
    port_openers: Cell<usize>,
    player_money: Cell<f64>,
    server_limit: Cell<usize>,
    server_max_ram: Cell<f64>,
}

impl FakeGame {
    pub fn new() -> FakeGame {
        FakeGame {
            servers: RefCell::new(BTreeMap::new()),
            links: RefCell::new(vec![]),
            files: RefCell::new(HashMap::new()),
            copies: RefCell::new(vec![]),
            launches: RefCell::new(vec![]),
            rejected: RefCell::new(HashSet::new()),
            printed: RefCell::new(vec![]),
            terminal: RefCell::new(vec![]),
            alerts: RefCell::new(vec![]),
            sleeps: RefCell::new(vec![]),
            sleep_hook: RefCell::new(None),
            hacking_level: Cell::new(100),
            port_openers: Cell::new(5),
            player_money: Cell::new(0.),
            server_limit: Cell::new(25),
            server_max_ram: Cell::new(1024.),
        }
    }

    pub fn with_server(
        mut self,
        name: &str,
        server: FakeServer,
    ) -> FakeGame {
        self.servers.get_mut().insert(name.to_owned(), server);
        self
    }

    pub fn with_node(
        self,
        name: &str,
        total_gb: f64,
        used_gb: f64,
    ) -> FakeGame {
        self.with_server(name, FakeServer::node(total_gb, used_gb))
    }

    pub fn with_target(
        self,
        name: &str,
        max_money: f64,
        min_security: f64,
    ) -> FakeGame {
        self.with_server(name, FakeServer::target(max_money, min_security))
    }

    /// Connects two servers both ways. Scans list neighbours in link order.
    pub fn with_link(
        mut self,
        a: &str,
        b: &str,
    ) -> FakeGame {
        self.links.get_mut().push((a.to_owned(), b.to_owned()));
        self
    }

    fn update(
        &self,
        host: &str,
        f: impl FnOnce(&mut FakeServer),
    ) {
        if let Some(server) = self.servers.borrow_mut().get_mut(host) {
            f(server);
        }
    }

    fn get<R>(
        &self,
        host: &str,
        f: impl FnOnce(&FakeServer) -> R,
    ) -> Option<R> {
        self.servers.borrow().get(host).map(f)
    }

    pub fn set_used_ram(
        &self,
        host: &str,
        used_gb: f64,
    ) {
        self.update(host, |s| s.used_ram = (used_gb * 100.).round() as u64);
    }

    pub fn set_money(
        &self,
        host: &str,
        money: f64,
    ) {
        self.update(host, |s| s.money = money);
    }

    pub fn set_security(
        &self,
        host: &str,
        security: f64,
    ) {
        self.update(host, |s| s.security = security);
    }

    pub fn set_times(
        &self,
        host: &str,
        hack: f64,
        grow: f64,
        weaken: f64,
    ) {
        self.update(host, |s| {
            s.hack_time = hack;
            s.grow_time = grow;
            s.weaken_time = weaken;
        });
    }

    pub fn set_hack_fraction(
        &self,
        host: &str,
        fraction: f64,
    ) {
        self.update(host, |s| s.hack_fraction = fraction);
    }

    pub fn set_hacking_level(
        &self,
        level: usize,
    ) {
        self.hacking_level.set(level);
    }

    pub fn set_port_openers(
        &self,
        count: usize,
    ) {
        self.port_openers.set(count);
    }

    pub fn set_player_money(
        &self,
        money: f64,
    ) {
        self.player_money.set(money);
    }

    pub fn set_purchased_server_limit(
        &self,
        limit: usize,
    ) {
        self.server_limit.set(limit);
    }

    pub fn set_purchased_server_max_ram(
        &self,
        ram: f64,
    ) {
        self.server_max_ram.set(ram);
    }

    /// Runs `hook` whenever a script sleeps, e.g. to change files behind
    /// its back.
    pub fn on_sleep(
        &self,
        hook: impl Fn(&FakeGame) + 'static,
    ) {
        *self.sleep_hook.borrow_mut() = Some(Box::new(hook));
    }

    pub fn reject_launches(
        &self,
        node: &str,
        op: HGW,
    ) {
        self.rejected.borrow_mut().insert((node.to_owned(), op));
    }

    pub fn file(
        &self,
        host: &str,
        name: &str,
    ) -> Option<String> {
        self.files
            .borrow()
            .get(&(host.to_owned(), name.to_owned()))
            .cloned()
    }

    pub fn copies(&self) -> Vec<(String, String)> {
        self.copies.borrow().clone()
    }

    pub fn launches(&self) -> Vec<Launch> {
        self.launches.borrow().clone()
    }

    pub fn printed(&self) -> Vec<String> {
        self.printed.borrow().clone()
    }

    pub fn terminal(&self) -> Vec<String> {
        self.terminal.borrow().clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.borrow().clone()
    }

    pub fn sleeps(&self) -> Vec<f64> {
        self.sleeps.borrow().clone()
    }
}

impl TargetQuery for FakeGame {
    fn server_exists(
        &self,
        host: &str,
    ) -> bool {
        self.servers.borrow().contains_key(host)
    }

    fn security(
        &self,
        host: &str,
    ) -> (f64, f64) {
        self.get(host, |s| (s.security, s.min_security))
            .unwrap_or((0., 0.))
    }

    fn money(
        &self,
        host: &str,
    ) -> (f64, f64) {
        self.get(host, |s| (s.money, s.max_money)).unwrap_or((0., 0.))
    }

    fn operation_time(
        &self,
        host: &str,
        op: HGW,
    ) -> f64 {
        self.get(host, |s| match op {
            HGW::Hack => s.hack_time,
            HGW::Grow => s.grow_time,
            HGW::Weaken => s.weaken_time,
        })
        .unwrap_or(0.)
    }

    fn hack_fraction(
        &self,
        host: &str,
    ) -> f64 {
        self.get(host, |s| s.hack_fraction).unwrap_or(0.)
    }

    fn growth_threads(
        &self,
        _host: &str,
        multiplier: f64,
    ) -> f64 {
        (multiplier - 1.) * GROWTH_SCALE
    }
}

impl NodeCapacity for FakeGame {
    fn capacity(
        &self,
        host: &str,
    ) -> (f64, f64) {
        self.get(host, |s| {
            (s.max_ram as f64 / 100., s.used_ram as f64 / 100.)
        })
        .unwrap_or((0., 0.))
    }
}

impl JobLauncher for FakeGame {
    fn launch(
        &self,
        node: &str,
        op: HGW,
        threads: u64,
        target: &str,
        delay: f64,
        tag: &str,
    ) -> Result<Pid, ScheduleError> {
        let rejected = |reason: &str| ScheduleError::LaunchRejected {
            node: node.into(),
            op,
            reason: reason.to_owned(),
        };

        if threads == 0 {
            return Err(rejected("zero threads"));
        }
        if self.rejected.borrow().contains(&(node.to_owned(), op)) {
            return Err(rejected("rejected"));
        }

        let mut servers = self.servers.borrow_mut();
        let server = servers.get_mut(node).ok_or_else(|| rejected("no such server"))?;

        let needed = threads * op.memory_hundredths();
        if server.max_ram < server.used_ram + needed {
            return Err(rejected("not enough RAM"));
        }
        server.used_ram += needed;

        let mut launches = self.launches.borrow_mut();
        launches.push(Launch {
            node: node.to_owned(),
            op,
            threads,
            target: target.to_owned(),
            delay,
            tag: tag.to_owned(),
        });

        Ok(launches.len())
    }
}

impl Topology for FakeGame {
    fn scan(
        &self,
        host: &str,
    ) -> Vec<String> {
        self.links
            .borrow()
            .iter()
            .filter_map(|(a, b)| {
                if a == host {
                    Some(b.clone())
                }
                else if b == host {
                    Some(a.clone())
                }
                else {
                    None
                }
            })
            .collect()
    }

    fn server_details(
        &self,
        host: &str,
    ) -> Option<ServerDetails> {
        self.get(host, |s| ServerDetails {
            max_money: s.max_money,
            min_security: s.min_security,
            required_hacking_skill: s.required_skill,
            required_open_ports: s.required_ports,
            purchased_by_player: s.purchased,
        })
    }

    fn has_root(
        &self,
        host: &str,
    ) -> bool {
        self.get(host, |s| s.rooted).unwrap_or(false)
    }

    fn hacking_level(&self) -> usize {
        self.hacking_level.get()
    }

    fn try_root(
        &self,
        host: &str,
    ) -> bool {
        let openers = self.port_openers.get();
        let mut rooted = false;

        self.update(host, |s| {
            if s.required_ports <= openers {
                s.rooted = true;
            }
            rooted = s.rooted;
        });

        rooted
    }
}

impl Market for FakeGame {
    fn player_money(&self) -> f64 {
        self.player_money.get()
    }

    fn purchased_servers(&self) -> Vec<String> {
        self.servers
            .borrow()
            .iter()
            .filter(|(name, s)| s.purchased && *name != CURRENT_HOST)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn purchased_server_limit(&self) -> usize {
        self.server_limit.get()
    }

    fn purchased_server_max_ram(&self) -> f64 {
        self.server_max_ram.get()
    }

    fn purchased_server_cost(
        &self,
        ram: f64,
    ) -> f64 {
        ram * SERVER_PRICE_PER_GB
    }

    fn purchased_server_upgrade_cost(
        &self,
        host: &str,
        ram: f64,
    ) -> f64 {
        let current = match self.get(host, |s| (s.purchased, s.max_ram)) {
            Some((true, max_ram)) if host != CURRENT_HOST => max_ram as f64 / 100.,
            _ => return -1.,
        };

        match current < ram && ram <= self.server_max_ram.get() {
            true => (ram - current) * SERVER_PRICE_PER_GB,
            false => -1.,
        }
    }

    fn purchase_server(
        &self,
        host: &str,
        ram: f64,
    ) -> Option<String> {
        let cost = self.purchased_server_cost(ram);
        if self.server_exists(host)
            || self.server_limit.get() <= self.purchased_servers().len()
            || self.server_max_ram.get() < ram
            || self.player_money.get() < cost
        {
            return None;
        }

        self.player_money.set(self.player_money.get() - cost);
        self.servers
            .borrow_mut()
            .insert(host.to_owned(), FakeServer::node(ram, 0.));
        self.links
            .borrow_mut()
            .push((CURRENT_HOST.to_owned(), host.to_owned()));

        Some(host.to_owned())
    }

    fn upgrade_purchased_server(
        &self,
        host: &str,
        ram: f64,
    ) -> bool {
        let cost = self.purchased_server_upgrade_cost(host, ram);
        if cost < 0. || self.player_money.get() < cost {
            return false;
        }

        self.player_money.set(self.player_money.get() - cost);
        self.update(host, |s| s.max_ram = (ram * 100.).round() as u64);
        true
    }
}

impl Storage for FakeGame {
    fn read(
        &self,
        file: &str,
    ) -> String {
        self.file(CURRENT_HOST, file).unwrap_or_default()
    }

    fn write(
        &self,
        file: &str,
        data: &str,
    ) {
        self.files
            .borrow_mut()
            .insert((CURRENT_HOST.to_owned(), file.to_owned()), data.to_owned());
    }

    fn file_exists(
        &self,
        file: &str,
        host: &str,
    ) -> bool {
        self.file(host, file).is_some()
    }

    fn copy_to(
        &self,
        file: &str,
        destination: &str,
    ) -> bool {
        let contents = match self.file(CURRENT_HOST, file) {
            Some(contents) => contents,
            None => return false,
        };

        self.files
            .borrow_mut()
            .insert((destination.to_owned(), file.to_owned()), contents);
        self.copies
            .borrow_mut()
            .push((file.to_owned(), destination.to_owned()));

        true
    }

    fn current_host(&self) -> String {
        CURRENT_HOST.to_owned()
    }
}

impl Console for FakeGame {
    fn print(
        &self,
        text: &str,
    ) {
        self.printed.borrow_mut().push(text.to_owned());
    }

    fn tprint(
        &self,
        text: &str,
    ) {
        self.terminal.borrow_mut().push(text.to_owned());
    }

    fn alert(
        &self,
        text: &str,
    ) {
        self.alerts.borrow_mut().push(text.to_owned());
    }

    async fn sleep(
        &self,
        millis: f64,
    ) {
        self.sleeps.borrow_mut().push(millis);

        if let Some(hook) = self.sleep_hook.borrow().as_ref() {
            hook(self);
        }
    }
}

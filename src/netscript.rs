use std::sync::{
    Mutex,
    MutexGuard,
    PoisonError,
};

use js_sys::Reflect;
use wasm_bindgen::{
    prelude::*,
    JsValue,
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

// thank you github.com/paulcdejean
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen]
    pub fn alert(msg: &str);

    pub type NS;

    #[wasm_bindgen(method)]
    fn tprint(
        this: &NS,
        print: &str,
    );

    #[wasm_bindgen(method)]
    fn print(
        this: &NS,
        print: &str,
    );

    #[wasm_bindgen(method)]
    async fn sleep(
        this: &NS,
        millis: i32,
    );

    #[wasm_bindgen(catch, method, variadic)]
    fn exec(
        this: &NS,
        script_name: &str,
        host: &str,
        num_threads: Option<i32>,
        args: Box<[JsValue]>,
    ) -> Result<i32, JsValue>;

    #[wasm_bindgen(method)]
    fn scan(
        this: &NS,
        scan: Option<&str>,
    ) -> Vec<JsValue>;

    #[wasm_bindgen(method)]
    fn serverExists(
        this: &NS,
        host: &str,
    ) -> bool;

    #[wasm_bindgen(method)]
    fn hasRootAccess(
        this: &NS,
        host: &str,
    ) -> bool;

    #[wasm_bindgen(catch, method)]
    fn nuke(
        this: &NS,
        host: &str,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, method)]
    fn brutessh(
        this: &NS,
        hostname: &str,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, method)]
    fn ftpcrack(
        this: &NS,
        hostname: &str,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, method)]
    fn relaysmtp(
        this: &NS,
        hostname: &str,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, method)]
    fn httpworm(
        this: &NS,
        hostname: &str,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(catch, method)]
    fn sqlinject(
        this: &NS,
        hostname: &str,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(method)]
    fn getServer(
        this: &NS,
        host: Option<&str>,
    ) -> Server;

    #[wasm_bindgen(method)]
    fn getHackingLevel(this: &NS) -> i32;

    #[wasm_bindgen(method)]
    fn getHackTime(
        this: &NS,
        host: &str,
    ) -> f64;

    #[wasm_bindgen(method)]
    fn getGrowTime(
        this: &NS,
        host: &str,
    ) -> f64;

    #[wasm_bindgen(method)]
    fn getWeakenTime(
        this: &NS,
        host: &str,
    ) -> f64;

    #[wasm_bindgen(method)]
    fn getServerMaxRam(
        this: &NS,
        host: &str,
    ) -> f64;

    #[wasm_bindgen(method)]
    fn getServerUsedRam(
        this: &NS,
        host: &str,
    ) -> f64;

    #[wasm_bindgen(method)]
    fn getServerSecurityLevel(
        this: &NS,
        host: &str,
    ) -> f64;

    #[wasm_bindgen(method)]
    fn getServerMinSecurityLevel(
        this: &NS,
        host: &str,
    ) -> f64;

    #[wasm_bindgen(catch, method)]
    fn getServerMoneyAvailable(
        this: &NS,
        host: &str,
    ) -> Result<f64, JsValue>;

    #[wasm_bindgen(method)]
    fn getServerMaxMoney(
        this: &NS,
        host: &str,
    ) -> f64;

    #[wasm_bindgen(method)]
    fn hackAnalyze(
        this: &NS,
        host: &str,
    ) -> f64;

    #[wasm_bindgen(method)]
    fn growthAnalyze(
        this: &NS,
        host: &str,
        growth_factor: f64,
        cores: Option<i32>,
    ) -> f64;

    #[wasm_bindgen(method)]
    fn read(
        this: &NS,
        filename: &str,
    ) -> String;

    #[wasm_bindgen(method)]
    fn write(
        this: &NS,
        filename: &str,
        data: &str,
        mode: char,
    );

    #[wasm_bindgen(method)]
    fn scp(
        this: &NS,
        file: &str,
        destination: &str,
        source: &str,
    ) -> bool;

    #[wasm_bindgen(method)]
    fn fileExists(
        this: &NS,
        file: &str,
        host: &str,
    ) -> bool;

    #[wasm_bindgen(method)]
    fn getHostname(this: &NS) -> JsValue;

    #[wasm_bindgen(method)]
    fn getPurchasedServers(this: &NS) -> Vec<JsValue>;

    #[wasm_bindgen(method)]
    fn getPurchasedServerLimit(this: &NS) -> f64;

    #[wasm_bindgen(method)]
    fn getPurchasedServerMaxRam(this: &NS) -> f64;

    #[wasm_bindgen(method)]
    fn getPurchasedServerCost(
        this: &NS,
        ram: f64,
    ) -> f64;

    #[wasm_bindgen(catch, method)]
    fn getPurchasedServerUpgradeCost(
        this: &NS,
        host: &str,
        ram: f64,
    ) -> Result<f64, JsValue>;

    #[wasm_bindgen(catch, method)]
    fn purchaseServer(
        this: &NS,
        host: &str,
        ram: f64,
    ) -> Result<String, JsValue>;

    #[wasm_bindgen(catch, method)]
    fn upgradePurchasedServer(
        this: &NS,
        host: &str,
        ram: f64,
    ) -> Result<bool, JsValue>;

    pub type Server;
}

/// Reads `name` off a `Server` object. Missing or mistyped fields are `None`.
fn server_field<T>(
    server: &JsValue,
    name: &str,
    read: impl Fn(&JsValue) -> Option<T>,
) -> Option<T> {
    Reflect::get(server, &JsValue::from_str(name))
        .ok()
        .and_then(|value| read(&value))
}

pub struct NsWrapper<'a>(Mutex<&'a NS>);

impl<'a> NsWrapper<'a> {
    pub fn new(ns: &'a NS) -> NsWrapper<'a> {
        NsWrapper(Mutex::new(ns))
    }

    fn ns(&self) -> MutexGuard<'_, &'a NS> {
        // the guarded value is a plain reference, a poisoned lock is harmless
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TargetQuery for NsWrapper<'_> {
    fn server_exists(
        &self,
        host: &str,
    ) -> bool {
        self.ns().serverExists(host)
    }

    fn security(
        &self,
        host: &str,
    ) -> (f64, f64) {
        let ns = self.ns();
        (
            ns.getServerSecurityLevel(host),
            ns.getServerMinSecurityLevel(host),
        )
    }

    fn money(
        &self,
        host: &str,
    ) -> (f64, f64) {
        let ns = self.ns();
        (
            ns.getServerMoneyAvailable(host).unwrap_or(0.),
            ns.getServerMaxMoney(host),
        )
    }

    fn operation_time(
        &self,
        host: &str,
        op: HGW,
    ) -> f64 {
        use HGW::*;

        let ns = self.ns();
        match op {
            Hack => ns.getHackTime(host),
            Grow => ns.getGrowTime(host),
            Weaken => ns.getWeakenTime(host),
        }
    }

    fn hack_fraction(
        &self,
        host: &str,
    ) -> f64 {
        self.ns().hackAnalyze(host)
    }

    fn growth_threads(
        &self,
        host: &str,
        multiplier: f64,
    ) -> f64 {
        self.ns().growthAnalyze(host, multiplier, None)
    }
}

impl NodeCapacity for NsWrapper<'_> {
    fn capacity(
        &self,
        host: &str,
    ) -> (f64, f64) {
        let ns = self.ns();
        (ns.getServerMaxRam(host), ns.getServerUsedRam(host))
    }
}

impl JobLauncher for NsWrapper<'_> {
    fn launch(
        &self,
        node: &str,
        op: HGW,
        threads: u64,
        target: &str,
        delay: f64,
        tag: &str,
    ) -> Result<Pid, ScheduleError> {
        let rejected = |reason: String| ScheduleError::LaunchRejected {
            node: node.into(),
            op,
            reason,
        };

        let num_threads = match i32::try_from(threads) {
            Ok(num_threads) if 0 < num_threads => num_threads,
            _ => return Err(rejected(format!("cannot run {} threads", threads))),
        };

        let args = vec![
            JsValue::from_str(target),
            JsValue::from_f64(delay),
            JsValue::from_str(tag),
        ]
        .into_boxed_slice();

        match self
            .ns()
            .exec(op.script().filename, node, Some(num_threads), args)
        {
            Ok(pid) if 0 < pid => Ok(pid as Pid),
            Ok(_) => Err(rejected("exec returned no pid".to_owned())),
            Err(e) => Err(rejected(format!("{:?}", e))),
        }
    }
}

impl Topology for NsWrapper<'_> {
    fn scan(
        &self,
        host: &str,
    ) -> Vec<String> {
        self.ns()
            .scan(Some(host))
            .into_iter()
            .filter_map(|m| m.as_string())
            .collect::<Vec<_>>()
    }

    fn server_details(
        &self,
        host: &str,
    ) -> Option<ServerDetails> {
        if !self.server_exists(host) {
            return None;
        }

        let server: JsValue = self.ns().getServer(Some(host)).into();
        let number =
            |name: &str| server_field(&server, name, JsValue::as_f64).unwrap_or(0.);

        Some(ServerDetails {
            max_money: number("moneyMax"),
            min_security: number("minDifficulty"),
            required_hacking_skill: number("requiredHackingSkill") as usize,
            required_open_ports: number("numOpenPortsRequired") as usize,
            purchased_by_player: server_field(
                &server,
                "purchasedByPlayer",
                JsValue::as_bool,
            )
            .unwrap_or(false),
        })
    }

    fn has_root(
        &self,
        host: &str,
    ) -> bool {
        self.ns().hasRootAccess(host)
    }

    fn hacking_level(&self) -> usize {
        self.ns().getHackingLevel().max(0) as usize
    }

    fn try_root(
        &self,
        host: &str,
    ) -> bool {
        let ns = self.ns();

        // openers we don't own just throw
        let _ = ns.brutessh(host);
        let _ = ns.ftpcrack(host);
        let _ = ns.relaysmtp(host);
        let _ = ns.httpworm(host);
        let _ = ns.sqlinject(host);
        let _ = ns.nuke(host);

        ns.hasRootAccess(host)
    }
}

impl Market for NsWrapper<'_> {
    fn player_money(&self) -> f64 {
        self.ns().getServerMoneyAvailable("home").unwrap_or(0.)
    }

    fn purchased_servers(&self) -> Vec<String> {
        self.ns()
            .getPurchasedServers()
            .into_iter()
            .filter_map(|m| m.as_string())
            .collect::<Vec<_>>()
    }

    fn purchased_server_limit(&self) -> usize {
        self.ns().getPurchasedServerLimit().max(0.) as usize
    }

    fn purchased_server_max_ram(&self) -> f64 {
        self.ns().getPurchasedServerMaxRam()
    }

    fn purchased_server_cost(
        &self,
        ram: f64,
    ) -> f64 {
        self.ns().getPurchasedServerCost(ram)
    }

    fn purchased_server_upgrade_cost(
        &self,
        host: &str,
        ram: f64,
    ) -> f64 {
        self.ns()
            .getPurchasedServerUpgradeCost(host, ram)
            .unwrap_or(-1.)
    }

    fn purchase_server(
        &self,
        host: &str,
        ram: f64,
    ) -> Option<String> {
        // the game answers with an empty hostname when it refuses
        self.ns()
            .purchaseServer(host, ram)
            .ok()
            .filter(|bought| !bought.is_empty())
    }

    fn upgrade_purchased_server(
        &self,
        host: &str,
        ram: f64,
    ) -> bool {
        self.ns().upgradePurchasedServer(host, ram).unwrap_or(false)
    }
}

impl Storage for NsWrapper<'_> {
    fn read(
        &self,
        file: &str,
    ) -> String {
        self.ns().read(file)
    }

    fn write(
        &self,
        file: &str,
        data: &str,
    ) {
        self.ns().write(file, data, 'w');
    }

    fn file_exists(
        &self,
        file: &str,
        host: &str,
    ) -> bool {
        self.ns().fileExists(file, host)
    }

    fn copy_to(
        &self,
        file: &str,
        destination: &str,
    ) -> bool {
        let source = self.current_host();
        self.ns().scp(file, destination, &source)
    }

    fn current_host(&self) -> String {
        self.ns()
            .getHostname()
            .as_string()
            .unwrap_or_else(|| "home".to_owned())
    }
}

impl Console for NsWrapper<'_> {
    fn print(
        &self,
        text: &str,
    ) {
        self.ns().print(text);
    }

    fn tprint(
        &self,
        text: &str,
    ) {
        self.ns().tprint(text);
    }

    fn alert(
        &self,
        text: &str,
    ) {
        alert(text);
    }

    async fn sleep(
        &self,
        millis: f64,
    ) {
        self.ns().sleep(millis.ceil() as i32).await;
    }
}

pub mod config;
pub mod effect;
pub mod env;
pub mod error;
pub mod fleet;
pub mod job;
pub mod logging;
pub mod machine;
pub mod master;
pub mod netscript;
pub mod node;
pub mod orchestrator;
pub mod registry;
pub mod scheduler;
pub mod script_deploy;
pub mod target;
#[cfg(test)]
mod testing;

use clap::{
    error::ErrorKind::DisplayHelp,
    Parser,
};
use js_sys::Array;
use wasm_bindgen::prelude::*;

use crate::{
    env::Console,
    master::MasterMode,
    netscript::{
        NsWrapper,
        NS,
    },
    orchestrator::AttackMode,
};

#[wasm_bindgen]
pub async fn execute_command(
    ns: &NS,
    args: Array,
) {
    let ns = NsWrapper::new(ns);

    let mut strargs = vec!["run batchburner.js".to_owned()];
    let strargs_iter = args.iter().filter_map(|a| a.as_string());
    strargs.extend(strargs_iter);

    match AppMode::try_parse_from(strargs) {
        Err(e) if e.kind() == DisplayHelp => {
            let error_msg =
                format!("\n{}", clap::Error::raw(e.kind().clone(), e),);

            ns.tprint(&*error_msg);
        },

        Ok(AppMode::Attack(attack_mode)) => attack_mode.execute(&ns).await,

        Ok(AppMode::Master(master_mode)) => {
            if let Err(e) = master_mode.execute(&ns) {
                ns.tprint(&format!("unable to save the config:\n{}", e));
            }
        },

        Err(e) => ns.tprint(&format!("unable to process message:\n{}", e)),
    }
}

#[derive(Parser)]
enum AppMode {
    Attack(AttackMode),
    Master(MasterMode),
}

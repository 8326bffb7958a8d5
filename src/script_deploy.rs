use crate::{
    effect::{
        GROW_MEMORY_USAGE_HUNDREDTHS,
        GROW_SECURITY_INCREASE_THOUSANDTHS,
        HACK_MEMORY_USAGE_HUNDREDTHS,
        HACK_SECURITY_INCREASE_THOUSANDTHS,
        WEAKEN_MEMORY_USAGE_HUNDREDTHS,
        WEAKEN_SECURITY_DECREASE_THOUSANDTHS,
    },
    env::Storage,
};

pub struct DynamicFile<'a> {
    pub filename: &'a str,
    pub contents: &'a str,
}

impl<'a> DynamicFile<'a> {
    /// Makes sure the file exists on `hostname`. Returns whether it does.
    pub fn deploy_to_machine(
        &self,
        env: &impl Storage,
        hostname: &str,
        force: bool,
    ) -> bool {
        if !force && env.file_exists(self.filename, hostname) {
            return true;
        }

        let current_hostname = env.current_host();
        env.write(self.filename, self.contents);

        if current_hostname != hostname {
            env.copy_to(self.filename, hostname);
        }

        env.file_exists(self.filename, hostname)
    }
}

pub const WEAKEN_SCRIPT: DynamicFile<'static> = DynamicFile {
    filename: "child_weaken.js",
    contents: include_str!("child_weaken.js"),
};

pub const HACK_SCRIPT: DynamicFile<'static> = DynamicFile {
    filename: "child_hack.js",
    contents: include_str!("child_hack.js"),
};

pub const GROW_SCRIPT: DynamicFile<'static> = DynamicFile {
    filename: "child_grow.js",
    contents: include_str!("child_grow.js"),
};

pub const WORKER_SCRIPTS: [&DynamicFile<'static>; 3] =
    [&WEAKEN_SCRIPT, &GROW_SCRIPT, &HACK_SCRIPT];

/// Deploys every worker script. Returns whether all of them landed.
pub fn deploy_workers(
    env: &impl Storage,
    hostname: &str,
) -> bool {
    WORKER_SCRIPTS
        .iter()
        .all(|script| script.deploy_to_machine(env, hostname, false))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HGW {
    Hack,
    Weaken,
    Grow,
}

impl HGW {
    pub fn script(&self) -> &'static DynamicFile<'static> {
        use HGW::*;

        match self {
            Hack => &HACK_SCRIPT,
            Weaken => &WEAKEN_SCRIPT,
            Grow => &GROW_SCRIPT,
        }
    }

    /// RAM used by a single thread, in hundredths of a GB.
    pub const fn memory_hundredths(&self) -> u64 {
        use HGW::*;

        match self {
            Hack => HACK_MEMORY_USAGE_HUNDREDTHS,
            Weaken => WEAKEN_MEMORY_USAGE_HUNDREDTHS,
            Grow => GROW_MEMORY_USAGE_HUNDREDTHS,
        }
    }

    /// Security change of a single thread, in thousandths.
    pub fn security_delta_thousandths(&self) -> i64 {
        use HGW::*;

        match self {
            Hack => HACK_SECURITY_INCREASE_THOUSANDTHS as i64,
            Weaken => -(WEAKEN_SECURITY_DECREASE_THOUSANDTHS as i64),
            Grow => GROW_SECURITY_INCREASE_THOUSANDTHS as i64,
        }
    }

    pub fn is_correction(&self) -> bool {
        matches!(self, HGW::Weaken)
    }

    pub fn name(&self) -> &'static str {
        use HGW::*;

        match self {
            Hack => "hack",
            Weaken => "weaken",
            Grow => "grow",
        }
    }
}

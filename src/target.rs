use compact_str::CompactString;

use crate::{
    effect::{
        grow_threads_to_reach_max,
        weaken_threads_for,
    },
    env::TargetQuery,
    error::ScheduleError,
    script_deploy::HGW,
};

/// Security and money of the attacked server, plus how long each operation
/// takes at the current security.
///
/// Observed fresh at the start of every pass. During a pass the scheduler
/// keeps a projected copy that already accounts for the jobs it planned.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetState {
    pub host: CompactString,

    pub security_current: f64,
    pub security_min: f64,

    pub money_current: f64,
    pub money_max: f64,

    pub hack_time: f64,
    pub grow_time: f64,
    pub weaken_time: f64,

    pub hack_fraction: f64,
}

impl TargetState {
    pub fn observe(
        env: &impl TargetQuery,
        host: &str,
    ) -> Result<TargetState, ScheduleError> {
        if host.is_empty() || !env.server_exists(host) {
            return Err(ScheduleError::InvalidTarget(host.to_owned()));
        }

        let (security_current, security_min) = env.security(host);
        let (money_current, money_max) = env.money(host);

        Ok(TargetState {
            host: host.into(),
            security_current,
            security_min,
            money_current,
            money_max,
            hack_time: env.operation_time(host, HGW::Hack),
            grow_time: env.operation_time(host, HGW::Grow),
            weaken_time: env.operation_time(host, HGW::Weaken),
            hack_fraction: env.hack_fraction(host),
        }
        .clamped())
    }

    /// Holds security at or above the minimum and money at or above one, so
    /// later money ratios never divide by zero.
    pub fn clamped(mut self) -> TargetState {
        self.security_current = self.security_current.max(self.security_min);
        self.money_max = self.money_max.max(1.);
        self.money_current = self.money_current.clamp(1., self.money_max);
        self
    }

    pub fn operation_time(
        &self,
        op: HGW,
    ) -> f64 {
        use HGW::*;

        match op {
            Hack => self.hack_time,
            Grow => self.grow_time,
            Weaken => self.weaken_time,
        }
    }

    pub fn security_excess(&self) -> f64 {
        (self.security_current - self.security_min).max(0.)
    }

    pub fn weaken_threads_needed(&self) -> u64 {
        weaken_threads_for(self.security_excess())
    }

    pub fn grow_threads_needed(
        &self,
        env: &impl TargetQuery,
    ) -> u64 {
        grow_threads_to_reach_max(self.money_current, self.money_max, |m| {
            env.growth_threads(&self.host, m)
        })
    }

    fn shift_security(
        mut self,
        op: HGW,
        threads: u64,
    ) -> TargetState {
        let delta = op.security_delta_thousandths() * threads as i64;
        self.security_current += delta as f64 / 1000.;
        self.clamped()
    }

    pub fn after_weaken(
        self,
        threads: u64,
    ) -> TargetState {
        self.shift_security(HGW::Weaken, threads)
    }

    /// Rough money projection: the real curve is the game's, so each thread
    /// is credited an equal share of the gap `threads_needed` would close.
    pub fn after_grow(
        self,
        threads: u64,
        threads_needed: u64,
    ) -> TargetState {
        let mut state = self.shift_security(HGW::Grow, threads);

        if threads_needed <= threads {
            state.money_current = state.money_max;
        }
        else {
            let gap = state.money_max - state.money_current;
            state.money_current += gap * threads as f64 / threads_needed as f64;
        }

        state.clamped()
    }

    pub fn after_hack(
        self,
        threads: u64,
    ) -> TargetState {
        let mut state = self.shift_security(HGW::Hack, threads);

        let stolen =
            (state.money_current * state.hack_fraction * threads as f64).floor();
        state.money_current -= stolen;

        state.clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        effect::weaken_threads_to_offset_grow,
        testing::FakeGame,
    };

    fn sample() -> TargetState {
        TargetState {
            host: "joesguns".into(),
            security_current: 15.,
            security_min: 5.,
            money_current: 100.,
            money_max: 1000.,
            hack_time: 3000.,
            grow_time: 4000.,
            weaken_time: 5000.,
            hack_fraction: 0.01,
        }
    }

    #[test]
    fn needs_two_hundred_weakens_for_ten_security() {
        assert_eq!(sample().weaken_threads_needed(), 200);
    }

    #[test]
    fn observe_clamps_empty_servers() {
        let game = FakeGame::new()
            .with_node("home", 8., 0.)
            .with_target("joesguns", 2500., 5.)
            .with_link("home", "joesguns");
        game.set_money("joesguns", 0.);
        game.set_security("joesguns", 4.);

        let state = TargetState::observe(&game, "joesguns").unwrap();
        assert_eq!(state.money_current, 1.);
        assert_eq!(state.security_current, state.security_min);
    }

    #[test]
    fn observe_rejects_unknown_hosts() {
        let game = FakeGame::new().with_node("home", 8., 0.);

        assert_eq!(
            TargetState::observe(&game, "nowhere"),
            Err(ScheduleError::InvalidTarget("nowhere".to_owned()))
        );
        assert!(TargetState::observe(&game, "").is_err());
    }

    #[test]
    fn grow_then_offset_never_raises_security() {
        for threads in [0u64, 1, 12, 13, 25, 100, 977] {
            let before = TargetState {
                security_current: 5.5,
                ..sample()
            };
            let after = before
                .clone()
                .after_grow(threads, 1000)
                .after_weaken(weaken_threads_to_offset_grow(threads));

            assert!(
                after.security_current <= before.security_current + 1e-9,
                "{} grows left {}",
                threads,
                after.security_current
            );
        }
    }

    #[test]
    fn projections_stay_inside_bounds() {
        let weakened = sample().after_weaken(10_000);
        assert_eq!(weakened.security_current, 5.);

        let grown = sample().after_grow(10, 20);
        assert_eq!(grown.money_current, 550.);
        assert!((grown.security_current - 15.04).abs() < 1e-9);

        let full = sample().after_grow(20, 20);
        assert_eq!(full.money_current, 1000.);

        let hacked = sample().after_hack(500);
        assert_eq!(hacked.money_current, 1.);
        assert!((hacked.security_current - 16.).abs() < 1e-9);
    }
}

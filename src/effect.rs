//! Per-thread effects of `hack()`, `grow()` and `weaken()`.
//!
//! Security is handled in thousandths and RAM in hundredths of a GB so thread
//! counts come out of integer division instead of floating point noise.

pub const WEAKEN_SECURITY_DECREASE_THOUSANDTHS: u64 = 50;
pub const GROW_SECURITY_INCREASE_THOUSANDTHS: u64 = 4;
pub const HACK_SECURITY_INCREASE_THOUSANDTHS: u64 = 2;

pub const WEAKEN_MEMORY_USAGE_HUNDREDTHS: u64 = 175;
pub const GROW_MEMORY_USAGE_HUNDREDTHS: u64 = 175;
pub const HACK_MEMORY_USAGE_HUNDREDTHS: u64 = 170;

// quotients this close under an integer are treated as that integer
const CEIL_TOLERANCE: f64 = 1e-9;

pub(crate) fn div_ceil(
    numerator: u64,
    denominator: u64,
) -> u64 {
    let mut quotient = numerator / denominator;

    // add one for remainders
    if 0 < numerator % denominator {
        quotient += 1;
    }

    quotient
}

fn ceil_threads(value: f64) -> u64 {
    if !value.is_finite() || value <= 0. {
        return 0;
    }

    (value - CEIL_TOLERANCE).ceil().max(0.) as u64
}

pub fn to_hundredths(value: f64) -> u64 {
    (value.max(0.) * 100.).round() as u64
}

/// Number of `weaken()` threads that bring `security_excess` down to zero.
pub fn weaken_threads_for(security_excess: f64) -> u64 {
    // any leftover fraction of a thousandth still needs a thread
    div_ceil(
        ceil_threads(security_excess * 1000.),
        WEAKEN_SECURITY_DECREASE_THOUSANDTHS,
    )
}

/// Weaken threads that cancel the security added by `grow_threads`.
///
/// One weaken covers 12.5 grows.
pub fn weaken_threads_to_offset_grow(grow_threads: u64) -> u64 {
    div_ceil(
        grow_threads * GROW_SECURITY_INCREASE_THOUSANDTHS,
        WEAKEN_SECURITY_DECREASE_THOUSANDTHS,
    )
}

/// Weaken threads that cancel the security added by `hack_threads`.
///
/// One weaken covers 25 hacks.
pub fn weaken_threads_to_offset_hack(hack_threads: u64) -> u64 {
    div_ceil(
        hack_threads * HACK_SECURITY_INCREASE_THOUSANDTHS,
        WEAKEN_SECURITY_DECREASE_THOUSANDTHS,
    )
}

/// Grow threads needed to take `current_money` back up to `max_money`.
///
/// The growth curve belongs to the game, so `growth` maps a multiplicative
/// factor to a (possibly fractional) thread count and this only decides the
/// factor and the rounding.
pub fn grow_threads_to_reach_max(
    current_money: f64,
    max_money: f64,
    growth: impl FnOnce(f64) -> f64,
) -> u64 {
    let multiplier = max_money / current_money.max(1.);

    if !multiplier.is_finite() || multiplier <= 1. {
        return 0;
    }

    ceil_threads(growth(multiplier))
}

/// Hack threads needed to steal `fraction` of the money on a target where a
/// single thread steals `per_thread_fraction`.
pub fn hack_threads_for_fraction(
    fraction: f64,
    per_thread_fraction: f64,
) -> u64 {
    if fraction <= 0. || per_thread_fraction <= 0. {
        return 0;
    }

    ceil_threads(fraction / per_thread_fraction)
}

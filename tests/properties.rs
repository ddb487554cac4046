//! Black-box invariant and end-to-end scenario tests, driven only through
//! `pm_core`'s public entry points against mock collaborators.
//!
//! Scenario numbering follows spec.md §8 (S1-S5; S6 and the cross-core
//! compensator timeout are unreachable from a black-box single-threaded
//! harness: a `CrossCoreSignal` callback would need a reference back into
//! the `PowerManager` that raised it, which the public API has no way to
//! hand it. Those two live as `tick.rs`'s own unit tests instead, operating
//! directly on `TickCompensator`).
//!
//! Because [`PowerManager::impl_get_cpu_freq`] only reads the configured
//! mode table (not which mode is presently active), these tests observe
//! "which mode the switch engine actually selected" indirectly, through the
//! frequency `MockClock::apply_config_fast` last received, the same
//! observable a logic analyzer on the real clock-tree output would show.

use std::cell::Cell;
use std::rc::Rc;

use pm_core::boundary::{ClockSource, FreqConfig};
use pm_core::config::SocVariant;
use pm_core::cpu::{CpuId, CpuTopology};
use pm_core::{
    ClockDriver, CrossCoreSignal, LockAction, PmCapability, PmConfig, PmError, PowerManager,
    PowerMode, SleepSequencer, TickHardware, TimeSource, TimerSubsystem,
};

struct MockClock {
    xtal_mhz: u32,
    unsupported: Option<u32>,
    applied: Rc<Cell<Option<FreqConfig>>>,
}

impl ClockDriver for MockClock {
    fn freq_to_config(&self, mhz: u32) -> Option<FreqConfig> {
        if mhz == 0 || self.unsupported == Some(mhz) {
            return None;
        }
        Some(FreqConfig {
            freq_mhz: mhz,
            source: ClockSource::Pll,
            raw: mhz,
        })
    }
    fn apply_config_fast(&self, cfg: FreqConfig) -> Result<(), ()> {
        self.applied.set(Some(cfg));
        Ok(())
    }
    fn read_config(&self) -> FreqConfig {
        self.applied.get().unwrap_or_default()
    }
    fn notify_speed_mode(&self, _cache_safe: bool) {}
    fn xtal_mhz(&self) -> u32 {
        self.xtal_mhz
    }
    fn apb_mhz(&self) -> u32 {
        self.applied.get().map(|c| c.freq_mhz).unwrap_or(self.xtal_mhz)
    }
}

struct MockTick;
impl TickHardware for MockTick {
    fn cycle_count(&self) -> u32 {
        0
    }
    fn compare(&self) -> u32 {
        0
    }
    fn set_compare(&self, _value: u32) {}
    fn tick_period_cycles(&self) -> u32 {
        1_000_000
    }
}

struct UnreachableSignal;
impl CrossCoreSignal for UnreachableSignal {
    fn raise(&self, _cpu: CpuId) {
        panic!("CrossCoreSignal::raise must never fire on a Single-topology manager");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MockSequencerError;

impl core::fmt::Display for MockSequencerError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "mock sleep sequencer rejected the configuration")
    }
}

struct MockSleepSequencer {
    reject: bool,
}
impl SleepSequencer for MockSleepSequencer {
    type Error = MockSequencerError;
    fn configure(&self, _max_mhz: u32, _min_mhz: u32, _light_sleep: bool) -> Result<(), Self::Error> {
        if self.reject {
            Err(MockSequencerError)
        } else {
            Ok(())
        }
    }
}

struct MockTimer;
impl TimerSubsystem for MockTimer {
    fn update_apb_freq(&self, _apb_mhz: u32) {}
}

struct MockTime {
    now: Cell<u64>,
}
impl TimeSource for MockTime {
    fn now_us(&self) -> u64 {
        let t = self.now.get();
        self.now.set(t + 100);
        t
    }
}

type TestManager =
    PowerManager<MockClock, MockTick, UnreachableSignal, MockSleepSequencer, MockTime, MockTimer>;

/// Builds a manager plus a handle onto the last frequency its mock clock
/// driver actually applied, the test's window into which mode the switch
/// engine settled on.
fn build(default_mhz: u32) -> (TestManager, Rc<Cell<Option<FreqConfig>>>) {
    let applied = Rc::new(Cell::new(None));
    let pm = PowerManager::new(
        MockClock {
            xtal_mhz: 2,
            unsupported: None,
            applied: applied.clone(),
        },
        MockTick,
        UnreachableSignal,
        MockSleepSequencer { reject: false },
        MockTime { now: Cell::new(0) },
        MockTimer,
        CpuTopology::Single,
        SocVariant::General {
            ref_clk_div_min: 1,
            apb_cap_mhz: 80,
            radio_min_apb_mhz: None,
        },
        PmCapability::Full { profiling: true },
        FreqConfig {
            freq_mhz: default_mhz,
            source: ClockSource::Pll,
            raw: default_mhz,
        },
    );
    (pm, applied)
}

fn last_applied_mhz(applied: &Rc<Cell<Option<FreqConfig>>>) -> Option<u32> {
    applied.get().map(|c| c.freq_mhz)
}

/// S1: `impl_init()` on a 1-CPU system with default 160 MHz reports
/// `mode == CPU_MAX`, `freq_cfg[*].mhz == 160` (no `configure()` has run
/// yet, so every table slot is still the boot default).
#[test]
fn s1_impl_init_boots_into_cpu_max_at_default_frequency() {
    let (pm, applied) = build(160);
    pm.impl_init(false).unwrap();
    assert_eq!(pm.impl_get_cpu_freq(PowerMode::CpuMax), 160);
    assert_eq!(pm.impl_get_cpu_freq(PowerMode::ApbMin), 160);
    // No switch has happened yet: the table hasn't diverged, so do_switch
    // never finds a frequency difference to apply.
    assert_eq!(last_applied_mhz(&applied), None);
}

/// S2: `configure({min=10, max=160, light=false})`, then releasing the boot
/// CPU's implicit CPU_MAX lock: mode transitions to APB_MIN,
/// `impl_get_cpu_freq(APB_MIN) == 10`.
#[test]
fn s2_releasing_cpu_max_without_light_sleep_settles_at_apb_min() {
    let (pm, applied) = build(160);
    pm.impl_init(false).unwrap();
    pm.configure(PmConfig {
        max_freq_mhz: 160,
        min_freq_mhz: 10,
        light_sleep_enabled: false,
    })
    .unwrap();
    assert_eq!(pm.impl_get_cpu_freq(PowerMode::ApbMin), 10);

    pm.impl_idle_hook(CpuId::CPU0, 1_000);

    assert_eq!(last_applied_mhz(&applied), Some(10));
}

/// S3: same, but with light sleep enabled: mode transitions to LIGHT_SLEEP.
/// Re-entering an ISR restores CPU_MAX.
#[test]
fn s3_releasing_cpu_max_with_light_sleep_allows_light_sleep() {
    let (pm, applied) = build(160);
    pm.impl_init(false).unwrap();
    pm.configure(PmConfig {
        max_freq_mhz: 160,
        min_freq_mhz: 10,
        light_sleep_enabled: true,
    })
    .unwrap();

    pm.impl_idle_hook(CpuId::CPU0, 1_000);
    assert_eq!(last_applied_mhz(&applied), Some(10));

    pm.impl_isr_hook(CpuId::CPU0);
    assert_eq!(last_applied_mhz(&applied), Some(160));
}

/// S4: an inverted min/max configuration is rejected and leaves the
/// mode-table and `light_sleep_enabled` unchanged.
#[test]
fn s4_invalid_configuration_is_rejected_and_leaves_state_untouched() {
    let (pm, _applied) = build(160);
    pm.impl_init(false).unwrap();
    let before = pm.get_configuration();

    let err = pm
        .configure(PmConfig {
            max_freq_mhz: 80,
            min_freq_mhz: 240,
            light_sleep_enabled: false,
        })
        .unwrap_err();
    assert_eq!(err, PmError::InvalidArg);
    assert_eq!(pm.get_configuration(), before);
}

/// S5: two concurrent holders, APB_MAX and (via `impl_init`'s implicit
/// lock) CPU_MAX. Releasing CPU_MAX drops to APB_MAX; releasing APB_MAX
/// afterward drops to APB_MIN.
#[test]
fn s5_two_concurrent_locks_settle_in_priority_order_as_each_releases() {
    let (pm, applied) = build(160);
    pm.impl_init(false).unwrap();
    pm.configure(PmConfig {
        max_freq_mhz: 160,
        min_freq_mhz: 10,
        light_sleep_enabled: false,
    })
    .unwrap();

    pm.notify(PowerMode::ApbMax, LockAction::Lock, 1_000, CpuId::CPU0);

    pm.impl_idle_hook(CpuId::CPU0, 2_000);
    // APB_MAX == APB_MIN's frequency here (both derive from the 80 MHz bus
    // cap); what matters is the switch ran without requiring CPU_MAX.
    assert_eq!(last_applied_mhz(&applied), Some(80));

    pm.notify(PowerMode::ApbMax, LockAction::Unlock, 3_000, CpuId::CPU0);
    assert_eq!(last_applied_mhz(&applied), Some(10));
}

/// Invariant 3: configure is idempotent.
#[test]
fn configure_is_idempotent() {
    let (pm, _applied) = build(160);
    let cfg = PmConfig {
        max_freq_mhz: 160,
        min_freq_mhz: 20,
        light_sleep_enabled: true,
    };
    pm.configure(cfg).unwrap();
    let once = pm.get_configuration();
    pm.configure(cfg).unwrap();
    let twice = pm.get_configuration();
    assert_eq!(once, twice);
}

/// Invariant 4: configure/get_configuration round-trips for any accepted
/// configuration.
#[test]
fn configure_round_trips() {
    let (pm, _applied) = build(160);
    let cfg = PmConfig {
        max_freq_mhz: 80,
        min_freq_mhz: 40,
        light_sleep_enabled: true,
    };
    pm.configure(cfg).unwrap();
    assert_eq!(pm.get_configuration(), cfg);
}

/// A rejected sleep-sequencer domain error propagates through `configure`
/// without being mistaken for `InvalidArg`.
#[test]
fn configure_propagates_sleep_sequencer_domain_error() {
    let applied = Rc::new(Cell::new(None));
    let pm: TestManager = PowerManager::new(
        MockClock {
            xtal_mhz: 2,
            unsupported: None,
            applied,
        },
        MockTick,
        UnreachableSignal,
        MockSleepSequencer { reject: true },
        MockTime { now: Cell::new(0) },
        MockTimer,
        CpuTopology::Single,
        SocVariant::General {
            ref_clk_div_min: 1,
            apb_cap_mhz: 80,
            radio_min_apb_mhz: None,
        },
        PmCapability::Full { profiling: false },
        FreqConfig {
            freq_mhz: 160,
            source: ClockSource::Pll,
            raw: 160,
        },
    );
    let err = pm
        .configure(PmConfig {
            max_freq_mhz: 160,
            min_freq_mhz: 10,
            light_sleep_enabled: false,
        })
        .unwrap_err();
    assert_eq!(err, PmError::DomainError(MockSequencerError));
}

/// A manager built with `PmCapability::Disabled` rejects `configure` and
/// makes every other entry point an inert no-op.
#[test]
fn disabled_capability_makes_configure_unsupported_and_hooks_inert() {
    let applied = Rc::new(Cell::new(None));
    let pm: TestManager = PowerManager::new(
        MockClock {
            xtal_mhz: 2,
            unsupported: None,
            applied,
        },
        MockTick,
        UnreachableSignal,
        MockSleepSequencer { reject: false },
        MockTime { now: Cell::new(0) },
        MockTimer,
        CpuTopology::Single,
        SocVariant::General {
            ref_clk_div_min: 1,
            apb_cap_mhz: 80,
            radio_min_apb_mhz: None,
        },
        PmCapability::Disabled,
        FreqConfig {
            freq_mhz: 160,
            source: ClockSource::Pll,
            raw: 160,
        },
    );
    let err = pm
        .configure(PmConfig {
            max_freq_mhz: 160,
            min_freq_mhz: 10,
            light_sleep_enabled: false,
        })
        .unwrap_err();
    assert_eq!(err, PmError::NotSupported);

    // No panics, no observable effect.
    pm.notify(PowerMode::CpuMax, LockAction::Unlock, 0, CpuId::CPU0);
    pm.impl_idle_hook(CpuId::CPU0, 0);
    pm.impl_isr_hook(CpuId::CPU0);
}

/// Invariant 1: a balanced sequence of `notify` calls (every lock undone by
/// a matching unlock, pushed then popped in reverse) always returns the
/// applied-frequency observable to whatever it was before the sequence
/// started, regardless of which modes were pushed.
mod balanced_sequence {
    use super::*;
    use proptest::prelude::*;

    fn lock_kind_strategy() -> impl Strategy<Value = PowerMode> {
        prop_oneof![
            Just(PowerMode::CpuMax),
            Just(PowerMode::ApbMax),
            Just(PowerMode::ApbMin),
        ]
    }

    proptest! {
        #[test]
        fn balanced_lock_unlock_sequence_is_neutral(kinds in prop::collection::vec(lock_kind_strategy(), 0..16)) {
            let (pm, applied) = build(160);
            pm.impl_init(false).unwrap();
            pm.configure(PmConfig {
                max_freq_mhz: 160,
                min_freq_mhz: 10,
                light_sleep_enabled: false,
            })
            .unwrap();

            let before = last_applied_mhz(&applied);

            for (i, kind) in kinds.iter().enumerate() {
                pm.notify(*kind, LockAction::Lock, i as u64, CpuId::CPU0);
            }
            for (i, kind) in kinds.iter().enumerate().rev() {
                pm.notify(*kind, LockAction::Unlock, (kinds.len() + i) as u64, CpuId::CPU0);
            }

            // CPU_MAX's implicit boot lock was never released in this
            // sequence, so the system is pinned at CPU_MAX throughout and
            // ends exactly where it started.
            prop_assert_eq!(last_applied_mhz(&applied), before);
        }
    }
}

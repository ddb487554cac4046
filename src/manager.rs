//! `PowerManager`: the single-mutex singleton that owns every piece of state
//! this crate manages and exposes the external entry points of spec.md §6.
//!
//! Mirrors `stm32h7xx-hal`'s habit of centralizing a subsystem's mutable
//! state behind one constrained handle (`Rcc` / `Ccdr`); here the handle is
//! `PowerManager<C, T, X, S, Ts>`, generic over its five hardware
//! collaborators, and the "constrain" step is simply `PowerManager::new`.

use core::cell::RefCell;

use critical_section::Mutex;

use crate::arbiter::{self, ArbiterState};
use crate::boundary::{
    ClockDriver, ClockSource, CrossCoreSignal, SleepSequencer, TickHardware, TimeSource,
    TimerSubsystem,
};
use crate::config::{self, ModeTable, PmCapability, PmConfig, SocVariant};
use crate::cpu::{CoreState, CpuId, CpuTopology};
use crate::error::PmError;
use crate::idle;
use crate::log::{fatal, pm_debug};
use crate::mode::{LockAction, LockKind, PowerMode};
use crate::profiler::ProfilerState;
use crate::switch;
use crate::tick::TickCompensator;

/// State guarded by the single `SWITCH_LOCK` (spec.md §5).
struct Inner {
    arbiter: ArbiterState,
    mode_table: ModeTable,
    current_mode: PowerMode,
    is_switching: bool,
    config_changed: bool,
    light_sleep_enabled: bool,
    cores: [CoreState; 2],
    profiler: Option<ProfilerState>,
}

/// The dynamic-frequency-scaling / light-sleep power manager core.
///
/// One instance per clock domain. `C`, `T`, `X`, `S`, `Ts`, `Tm` are the
/// board's concrete (or, in tests, mock) implementations of this crate's six
/// collaborator boundaries (`ClockDriver`, `TickHardware`, `CrossCoreSignal`,
/// `SleepSequencer`, `TimeSource`, `TimerSubsystem`).
pub struct PowerManager<C, T, X, S, Ts, Tm> {
    inner: Mutex<RefCell<Inner>>,
    tick_compensator: TickCompensator,
    clock: C,
    tick: T,
    cross_core: X,
    sleep_sequencer: S,
    time: Ts,
    timer: Tm,
    topology: CpuTopology,
    variant: SocVariant,
    capability: PmCapability,
}

/// Internal outcome of one pass through `do_switch`'s re-entry guard loop.
enum GuardOutcome {
    /// `is_switching` was already set; the caller services any pending
    /// compensator update targeted at itself and retries.
    Retry,
    /// The requested mode already matches `current_mode`; nothing to do.
    NoOp,
    /// The lock was free and the target mode differs: `is_switching` has
    /// been set and `config_changed` captured and cleared.
    Proceed { config_changed_snapshot: bool },
}

impl<C, T, X, S, Ts, Tm> PowerManager<C, T, X, S, Ts, Tm>
where
    C: ClockDriver,
    T: TickHardware,
    X: CrossCoreSignal,
    S: SleepSequencer,
    Ts: TimeSource,
    Tm: TimerSubsystem,
{
    /// Construct a manager. `boot_cfg` is the [`crate::boundary::FreqConfig`]
    /// every mode table entry starts at until the first `configure()` call
    /// (spec.md §6, `impl_init`'s "default boot frequency").
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: C,
        tick: T,
        cross_core: X,
        sleep_sequencer: S,
        time: Ts,
        timer: Tm,
        topology: CpuTopology,
        variant: SocVariant,
        capability: PmCapability,
        boot_cfg: crate::boundary::FreqConfig,
    ) -> Self {
        let profiler = match capability {
            PmCapability::Full { profiling: true } => Some(ProfilerState::new()),
            _ => None,
        };
        PowerManager {
            inner: Mutex::new(RefCell::new(Inner {
                arbiter: ArbiterState::new(),
                mode_table: ModeTable::boot(boot_cfg),
                current_mode: PowerMode::CpuMax,
                is_switching: false,
                config_changed: false,
                light_sleep_enabled: false,
                cores: [CoreState::boot(), CoreState::boot()],
                profiler,
            })),
            tick_compensator: TickCompensator::new(),
            clock,
            tick,
            cross_core,
            sleep_sequencer,
            time,
            timer,
            topology,
            variant,
            capability,
        }
    }

    /// Must be called exactly once, after construction and before any other
    /// entry point, on the boot CPU. Acquires every CPU's implicit
    /// `CPU_FREQ_MAX` lock (already reflected in each [`CoreState::boot`]) in
    /// the arbiter, and, if `auto_dfs` is set, immediately calls
    /// [`Self::configure`] with the crystal as the floor and the boot
    /// frequency as the ceiling, light sleep disabled, the runtime
    /// counterpart of spec.md §6's "if auto-DFS is enabled at compile time".
    pub fn impl_init(&self, auto_dfs: bool) -> Result<(), PmError<S::Error>> {
        if matches!(self.capability, PmCapability::Disabled) {
            return Ok(());
        }
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            for _ in 0..self.topology.num_cpus() {
                inner.arbiter.lock(PowerMode::CpuMax);
            }
        });
        if auto_dfs {
            let default_mhz = critical_section::with(|cs| {
                self.inner.borrow(cs).borrow().mode_table.get(PowerMode::CpuMax).freq_mhz
            });
            self.configure(PmConfig {
                max_freq_mhz: default_mhz,
                min_freq_mhz: self.clock.xtal_mhz(),
                light_sleep_enabled: false,
            })?;
        }
        Ok(())
    }

    /// Validate and install a new `{min, max, light_sleep}` configuration
    /// (spec.md §4.4). Returns [`PmError::NotSupported`] if this manager was
    /// constructed with [`PmCapability::Disabled`].
    pub fn configure(&self, cfg: PmConfig) -> Result<(), PmError<S::Error>> {
        if matches!(self.capability, PmCapability::Disabled) {
            return Err(PmError::NotSupported);
        }
        let (max_cfg, apb_max_cfg, min_cfg) =
            config::validate(cfg, self.variant, &self.clock).map_err(|_| PmError::InvalidArg)?;

        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            inner.mode_table.freq_cfg[PowerMode::CpuMax.index()] = max_cfg;
            inner.mode_table.freq_cfg[PowerMode::ApbMax.index()] = apb_max_cfg;
            inner.mode_table.freq_cfg[PowerMode::ApbMin.index()] = min_cfg;
            inner.mode_table.freq_cfg[PowerMode::LightSleep.index()] = min_cfg;
            inner.light_sleep_enabled = cfg.light_sleep_enabled;
            inner.config_changed = true;
        });

        self.sleep_sequencer
            .configure(max_cfg.freq_mhz, min_cfg.freq_mhz, cfg.light_sleep_enabled)
            .map_err(PmError::DomainError)?;

        pm_debug!(
            "pm configured: max={}MHz min={}MHz light_sleep={}",
            max_cfg.freq_mhz,
            min_cfg.freq_mhz,
            cfg.light_sleep_enabled
        );
        Ok(())
    }

    /// The currently installed configuration (spec.md §4.4).
    pub fn get_configuration(&self) -> PmConfig {
        critical_section::with(|cs| {
            let inner = self.inner.borrow(cs).borrow();
            PmConfig {
                max_freq_mhz: inner.mode_table.get(PowerMode::CpuMax).freq_mhz,
                min_freq_mhz: inner.mode_table.get(PowerMode::ApbMin).freq_mhz,
                light_sleep_enabled: inner.light_sleep_enabled,
            }
        })
    }

    /// Map a [`LockKind`] to the [`PowerMode`] it pins (spec.md §6). Total:
    /// every `LockKind` variant has a `min_mode`, so unlike the reference
    /// implementation's runtime `abort()` on an unrecognized lock type, this
    /// has no failure case to report.
    pub fn impl_get_mode(&self, kind: LockKind) -> PowerMode {
        kind.min_mode()
    }

    /// The frequency, in MHz, the mode table currently has installed for
    /// `mode`. Fatal if `mode` is [`PowerMode::Count`] (spec.md §7).
    pub fn impl_get_cpu_freq(&self, mode: PowerMode) -> u32 {
        if mode == PowerMode::Count {
            fatal!("impl_get_cpu_freq called with the Count sentinel");
        }
        critical_section::with(|cs| self.inner.borrow(cs).borrow().mode_table.get(mode).freq_mhz)
    }

    /// Notify the arbiter of a lock acquire/release translated from the lock
    /// subsystem (spec.md §4.1). `now_us` times the profiler's dwell-time
    /// accounting; `cpu` identifies the CPU driving any resulting switch.
    pub fn notify(&self, mode: PowerMode, action: LockAction, now_us: u64, cpu: CpuId) {
        if matches!(self.capability, PmCapability::Disabled) {
            return;
        }
        let new_mode = critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            let need_switch = match action {
                LockAction::Lock => inner.arbiter.lock(mode),
                LockAction::Unlock => inner.arbiter.unlock(mode),
            };
            if !need_switch {
                return None;
            }
            let target = arbiter::lowest_allowed_mode(inner.arbiter.mode_mask(), inner.light_sleep_enabled);
            let old_mode = inner.current_mode;
            if let Some(profiler) = inner.profiler.as_mut() {
                profiler.charge(now_us, old_mode);
            }
            Some(target)
        });

        if let Some(new_mode) = new_mode {
            self.do_switch(new_mode, cpu);
        }
    }

    /// Called by the scheduler's idle loop on `cpu` (spec.md §4.5).
    pub fn impl_idle_hook(&self, cpu: CpuId, now_us: u64) {
        if matches!(self.capability, PmCapability::Disabled) {
            return;
        }
        let new_mode = critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            let need_switch = idle::on_idle_enter(&mut inner.cores[cpu.index()], &mut inner.arbiter);
            if !need_switch {
                return None;
            }
            let target = arbiter::lowest_allowed_mode(inner.arbiter.mode_mask(), inner.light_sleep_enabled);
            let old_mode = inner.current_mode;
            if let Some(profiler) = inner.profiler.as_mut() {
                profiler.charge(now_us, old_mode);
            }
            Some(target)
        });
        if let Some(new_mode) = new_mode {
            self.do_switch(new_mode, cpu);
        }
    }

    /// Called at the first instruction of any ISR on `cpu` (spec.md §4.5).
    /// Drains a pending cross-core tick-compare update before touching the
    /// implicit lock, matching the ordering `TickCompensator::update`'s
    /// rendezvous depends on.
    pub fn impl_isr_hook(&self, cpu: CpuId) {
        if matches!(self.capability, PmCapability::Disabled) {
            return;
        }
        if self.tick_compensator.service_pending(cpu, &self.tick) {
            return;
        }
        let now_us = self.time.now_us();
        let new_mode = critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            let need_switch = idle::on_isr_entry(&mut inner.cores[cpu.index()], &mut inner.arbiter);
            if !need_switch {
                return None;
            }
            let target = arbiter::lowest_allowed_mode(inner.arbiter.mode_mask(), inner.light_sleep_enabled);
            let old_mode = inner.current_mode;
            if let Some(profiler) = inner.profiler.as_mut() {
                profiler.charge(now_us, old_mode);
            }
            Some(target)
        });
        if let Some(new_mode) = new_mode {
            self.do_switch(new_mode, cpu);
        }
    }

    /// Format the dwell-time/light-sleep statistics table into `sink`.
    /// A no-op returning `Ok(())` immediately if this manager was built
    /// without the profiling capability.
    pub fn impl_dump_stats<W: core::fmt::Write>(&self, sink: &mut W) -> core::fmt::Result {
        let now_us = self.time.now_us();
        critical_section::with(|cs| {
            let inner = self.inner.borrow(cs).borrow();
            match &inner.profiler {
                Some(profiler) => profiler.dump(
                    sink,
                    inner.current_mode,
                    inner.light_sleep_enabled,
                    now_us,
                    |mode| inner.mode_table.get(mode).freq_mhz,
                ),
                None => Ok(()),
            }
        })
    }

    /// Record the external sleep sequencer's accept/reject outcome for one
    /// light-sleep attempt (spec.md §4.6). A no-op without profiling.
    pub fn record_light_sleep(&self, accepted: bool) {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            if let Some(profiler) = inner.profiler.as_mut() {
                profiler.record_light_sleep(accepted);
            }
        });
    }

    /// The re-entrant switch engine (spec.md §4.2). `cpu` identifies the CPU
    /// executing this call, used both for the re-entry guard's targeted
    /// compensator service and as the initiator in `TickCompensator::update`.
    fn do_switch(&self, new_mode: PowerMode, cpu: CpuId) {
        let outcome = loop {
            let outcome = critical_section::with(|cs| {
                let mut inner = self.inner.borrow(cs).borrow_mut();
                if inner.is_switching {
                    GuardOutcome::Retry
                } else if new_mode == inner.current_mode {
                    GuardOutcome::NoOp
                } else {
                    inner.is_switching = true;
                    let snapshot = inner.config_changed;
                    inner.config_changed = false;
                    GuardOutcome::Proceed {
                        config_changed_snapshot: snapshot,
                    }
                }
            });
            match outcome {
                GuardOutcome::Retry => {
                    self.tick_compensator.service_pending(cpu, &self.tick);
                }
                other => break other,
            }
        };

        let config_changed_snapshot = match outcome {
            GuardOutcome::NoOp => return,
            GuardOutcome::Proceed { config_changed_snapshot } => config_changed_snapshot,
            GuardOutcome::Retry => unreachable!("loop only exits on NoOp or Proceed"),
        };

        let (old_cfg, new_cfg) = critical_section::with(|cs| {
            let inner = self.inner.borrow(cs).borrow();
            let new_cfg = inner.mode_table.get(new_mode);
            let old_cfg = if config_changed_snapshot {
                self.clock.read_config()
            } else {
                inner.mode_table.get(inner.current_mode)
            };
            (old_cfg, new_cfg)
        });

        if new_cfg.freq_mhz != old_cfg.freq_mhz {
            let switch_down = switch::is_switch_down(old_cfg.freq_mhz, new_cfg.freq_mhz);
            if switch_down {
                self.on_freq_step(old_cfg.freq_mhz, new_cfg.freq_mhz, cpu);
            }

            match new_cfg.source {
                ClockSource::Pll => {
                    self.apply_clock_config(new_cfg);
                    self.clock.notify_speed_mode(false);
                }
                ClockSource::Xtal => {
                    self.clock.notify_speed_mode(true);
                    self.apply_clock_config(new_cfg);
                }
            }

            if !switch_down {
                self.on_freq_step(old_cfg.freq_mhz, new_cfg.freq_mhz, cpu);
            }
        }

        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();
            inner.current_mode = new_mode;
            inner.is_switching = false;
        });
    }

    /// Apply a previously validated configuration. A rejection here means
    /// the mode table holds a config the driver itself produced and later
    /// refuses, unrecoverable (spec.md §7).
    fn apply_clock_config(&self, cfg: crate::boundary::FreqConfig) {
        if self.clock.apply_config_fast(cfg).is_err() {
            fatal!("clock driver rejected a previously accepted frequency configuration");
        }
    }

    /// Combines the two effects a frequency step triggers outside the
    /// switch lock: the software timer's APB-tick rebase (when the step
    /// crosses the 80 MHz ceiling) and the cross-core tick-compare
    /// rendezvous. Mirrors the reference implementation's `on_freq_update`,
    /// called at the same point in `do_switch` regardless of direction.
    fn on_freq_step(&self, old_mhz: u32, new_mhz: u32, cpu: CpuId) {
        if let Some(new_apb_mhz) = switch::apb_update_needed(old_mhz, new_mhz) {
            self.timer.update_apb_freq(new_apb_mhz);
        }
        if self
            .tick_compensator
            .update(old_mhz, new_mhz, cpu, self.topology, &self.tick, &self.cross_core)
            .is_err()
        {
            fatal!("cross-core tick-compare rendezvous exceeded its polling budget");
        }
    }
}

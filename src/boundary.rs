//! Interfaces the core consumes from collaborators that live outside this
//! crate's scope: the hardware clock-tree driver, the tick timer, the
//! cross-core interrupt, the software hi-resolution timer, the light-sleep
//! sequencer, and the general lock subsystem. This crate never implements
//! any of them; boards/applications supply concrete (or, for tests, mock)
//! implementations.

/// A frozen hardware clock configuration for one [`crate::mode::PowerMode`].
///
/// Opaque to the arbiter and switch engine beyond `freq_mhz` and `source`;
/// everything else a real `ClockDriver` needs (PLL multipliers, dividers) is
/// carried in `raw`, which this crate never inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FreqConfig {
    /// CPU frequency this configuration realizes, in MHz.
    pub freq_mhz: u32,
    /// The clock source driving this configuration.
    pub source: ClockSource,
    /// Opaque driver-specific payload (divider values, PLL taps, ...).
    pub raw: u32,
}

/// The clock source a [`FreqConfig`] is driven from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    #[default]
    Pll,
    Xtal,
}

/// Boundary to the hardware clock-tree driver (PLL/XTAL, dividers).
///
/// Out of scope per spec.md §1: this crate only consumes the interface,
/// never programs registers directly.
pub trait ClockDriver {
    /// Translate a target CPU frequency into a driver-specific
    /// configuration, or `None` if the hardware cannot realize it.
    fn freq_to_config(&self, mhz: u32) -> Option<FreqConfig>;

    /// Program the clock tree to `cfg`. Must be callable with interrupts
    /// masked but not suspending. Returning an error for a `cfg` this driver
    /// previously accepted from `freq_to_config` is a fatal, unrecoverable
    /// condition (spec.md §7); it indicates mode-table corruption.
    fn apply_config_fast(&self, cfg: FreqConfig) -> Result<(), ()>;

    /// Read back the live hardware configuration. Used when `config_changed`
    /// indicates `freq_cfg[current_mode]` may be stale.
    fn read_config(&self) -> FreqConfig;

    /// Notify the flash/cache timing domain of an upcoming or completed
    /// speed-mode change. Called around `apply_config_fast` in the order
    /// spec.md §4.2 step 5 describes: when switching to a PLL-sourced
    /// config, `apply_config_fast` runs first and this is called with
    /// `cache_safe = false` after; for any other source this is called
    /// first with `cache_safe = true`, then `apply_config_fast` runs.
    fn notify_speed_mode(&self, cache_safe: bool);

    /// The crystal frequency, in MHz.
    fn xtal_mhz(&self) -> u32;

    /// The current APB (peripheral bus) frequency, in MHz.
    fn apb_mhz(&self) -> u32;
}

/// Boundary to the per-CPU tick-compare hardware (Xtensa `CCOUNT`/`CCOMPARE`
/// or the moral equivalent on another architecture).
///
/// All methods act on whichever CPU calls them; the registers they model
/// are core-local.
pub trait TickHardware {
    /// The free-running cycle counter.
    fn cycle_count(&self) -> u32;
    /// The current interrupt-compare value.
    fn compare(&self) -> u32;
    /// Reprogram the interrupt-compare value.
    fn set_compare(&self, value: u32);
    /// The currently programmed cycles-per-tick divisor.
    fn tick_period_cycles(&self) -> u32;
}

/// Boundary to the cross-core interrupt used to ask the peer CPU to rescale
/// its own tick-compare register.
pub trait CrossCoreSignal {
    /// Raise the cross-core interrupt targeting `cpu`.
    fn raise(&self, cpu: crate::cpu::CpuId);
}

/// Boundary to the software hi-resolution timer whose APB-tick base must be
/// updated on a frequency change that crosses the 80 MHz APB ceiling.
pub trait TimerSubsystem {
    /// Called whenever `min(old_freq_mhz, 80) != min(new_freq_mhz, 80)`.
    fn update_apb_freq(&self, apb_mhz: u32);
}

/// Boundary to the light-sleep entry/exit sequencer (radio power, flash and
/// RAM retention).
pub trait SleepSequencer {
    /// The sequencer's own domain error type, propagated through
    /// [`crate::error::PmError::DomainError`].
    type Error;

    /// Notify the sequencer of a new configuration. May fail with a domain
    /// error, which is returned to the caller of `configure()`.
    fn configure(
        &self,
        max_mhz: u32,
        min_mhz: u32,
        light_sleep_enabled: bool,
    ) -> Result<(), Self::Error>;
}

/// Boundary to a monotonic microsecond clock, used only to timestamp the
/// optional profiler's dwell-time accounting from inside
/// [`crate::manager::PowerManager::impl_idle_hook`] and
/// [`crate::manager::PowerManager::impl_isr_hook`], entry points that, unlike
/// `notify`, have no caller-supplied timestamp to reuse.
pub trait TimeSource {
    /// Microseconds since an arbitrary, monotonic epoch.
    fn now_us(&self) -> u64;
}

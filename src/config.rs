//! Configuration surface: `PmConfig`, SoC-specific constants, and the
//! validation rule that derives `APB_MAX` from a requested `{min, max}`
//! frequency pair.

use crate::boundary::FreqConfig;
use crate::mode::PowerMode;

/// User-facing configuration accepted by
/// [`crate::manager::PowerManager::configure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PmConfig {
    /// Frequency used in [`PowerMode::CpuMax`], in MHz.
    pub max_freq_mhz: u32,
    /// Frequency used in [`PowerMode::ApbMin`] / light sleep, in MHz.
    pub min_freq_mhz: u32,
    /// Whether the arbiter is allowed to return [`PowerMode::LightSleep`].
    pub light_sleep_enabled: bool,
}

/// SoC-specific constants that vary the validation and `APB_MAX` derivation
/// rules, expressed as a compact table keyed by target identifier rather
/// than scattered conditional compilation (spec.md §9, Design Notes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocVariant {
    /// A SoC whose PLL cannot switch between 240 MHz and 80/160 MHz without
    /// being disabled, so `APB_MAX` must stay at the same PLL tap as
    /// `CPU_MAX` whenever `max_freq_mhz` is 240, 160 or 80.
    PllFixed240_160_80 {
        /// Minimal reference-clock divider this target can realize.
        ref_clk_div_min: u32,
    },
    /// A general SoC: `APB_MAX` is simply `max_freq_mhz` capped at the
    /// peripheral bus's maximum frequency (raised to the radio subsystem's
    /// floor when a radio is enabled).
    General {
        ref_clk_div_min: u32,
        apb_cap_mhz: u32,
        radio_min_apb_mhz: Option<u32>,
    },
}

impl SocVariant {
    fn ref_clk_div_min(self) -> u32 {
        match self {
            SocVariant::PllFixed240_160_80 { ref_clk_div_min, .. } => ref_clk_div_min,
            SocVariant::General { ref_clk_div_min, .. } => ref_clk_div_min,
        }
    }

    /// Derive `apb_max_mhz` for a requested `max_freq_mhz`, per spec.md
    /// §4.4. The caller still applies the final
    /// `apb_max = max(apb_max, min_freq_mhz)` clamp.
    fn apb_max_mhz(self, max_freq_mhz: u32) -> u32 {
        match self {
            SocVariant::PllFixed240_160_80 { .. } => {
                if max_freq_mhz == 240 {
                    240
                } else {
                    // max_freq_mhz in {160, 80} per the documented quirk;
                    // any other value is already rejected by validate().
                    80
                }
            }
            SocVariant::General {
                apb_cap_mhz,
                radio_min_apb_mhz,
                ..
            } => {
                let cap = match radio_min_apb_mhz {
                    Some(radio_min) => apb_cap_mhz.max(radio_min),
                    None => apb_cap_mhz,
                };
                max_freq_mhz.min(cap)
            }
        }
    }
}

/// Whether power management is compiled in, toggled by a construction-time
/// capability object rather than conditional compilation that would change
/// struct layout (spec.md §9, Design Notes, bullet 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PmCapability {
    /// Power management is active; `configure()` validates and applies.
    Full {
        /// Whether dwell-time / light-sleep counters are collected.
        profiling: bool,
    },
    /// Power management is compiled out: `configure()` returns
    /// `NOT_SUPPORTED` and every other entry point is an inert no-op.
    Disabled,
}

/// The frozen per-mode frequency configuration table, written only by
/// `configure()` under the switch lock (spec.md §3, "Mode table").
#[derive(Debug, Clone, Copy)]
pub(crate) struct ModeTable {
    pub(crate) freq_cfg: [FreqConfig; PowerMode::NUM_MODES],
}

impl ModeTable {
    pub(crate) const fn boot(default: FreqConfig) -> Self {
        ModeTable {
            freq_cfg: [default; PowerMode::NUM_MODES],
        }
    }

    pub(crate) fn get(&self, mode: PowerMode) -> FreqConfig {
        self.freq_cfg[mode.index()]
    }
}

/// Validates a requested [`PmConfig`] against the hardware boundaries
/// described by `variant` and `clock`, returning the three per-mode
/// [`FreqConfig`] values to install plus the `apb_max_mhz` the sleep
/// sequencer is notified with.
///
/// Mirrors `esp_pm_configure`'s validation order exactly (spec.md §4.4):
/// range check, then per-mode hardware-support lookup, then the reference
/// divider floor, then the `apb_max` derivation.
pub(crate) fn validate<C: crate::boundary::ClockDriver>(
    cfg: PmConfig,
    variant: SocVariant,
    clock: &C,
) -> Result<(FreqConfig, FreqConfig, FreqConfig), ()> {
    if cfg.min_freq_mhz > cfg.max_freq_mhz {
        return Err(());
    }

    let min_cfg = clock.freq_to_config(cfg.min_freq_mhz).ok_or(())?;
    let max_cfg = clock.freq_to_config(cfg.max_freq_mhz).ok_or(())?;

    let xtal_mhz = clock.xtal_mhz();
    if cfg.min_freq_mhz < xtal_mhz {
        // REF_CLK_FREQ is the crystal frequency on the targets this divider
        // applies to; the derived divider must not fall below the SoC's
        // minimum.
        let divider = xtal_mhz.checked_div(cfg.min_freq_mhz).unwrap_or(u32::MAX);
        if divider < variant.ref_clk_div_min() {
            return Err(());
        }
    }

    let apb_max_mhz = variant
        .apb_max_mhz(cfg.max_freq_mhz)
        .max(cfg.min_freq_mhz);
    let apb_max_cfg = clock.freq_to_config(apb_max_mhz).ok_or(())?;

    Ok((max_cfg, apb_max_cfg, min_cfg))
}

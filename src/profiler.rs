//! Optional dwell-time and light-sleep profiling.
//!
//! A pure observer of [`crate::manager::PowerManager`]'s switch activity;
//! never influences arbitration. Enabled per
//! [`crate::config::PmCapability::Full`]'s `profiling` flag rather than by
//! conditional compilation, so enabling it never changes struct layout
//! (spec.md §9, Design Notes).

use core::fmt;

use crate::mode::PowerMode;

const MODE_NAMES: [&str; PowerMode::NUM_MODES] = ["LIGHT_SLEEP", "APB_MIN", "APB_MAX", "CPU_MAX"];

/// Time, in microseconds, spent so far in each mode plus the light-sleep
/// accept/reject counters.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProfilerState {
    time_in_mode: [u64; PowerMode::NUM_MODES],
    last_mode_change_time: u64,
    light_sleep_counts: u32,
    light_sleep_reject_counts: u32,
}

impl ProfilerState {
    pub(crate) const fn new() -> Self {
        ProfilerState {
            time_in_mode: [0; PowerMode::NUM_MODES],
            last_mode_change_time: 0,
            light_sleep_counts: 0,
            light_sleep_reject_counts: 0,
        }
    }

    /// Charges the elapsed time since the last transition to `old_mode`,
    /// then advances the change-time marker (spec.md §4.1 step 3 / §4.6).
    pub(crate) fn charge(&mut self, now_us: u64, old_mode: PowerMode) {
        if self.last_mode_change_time != 0 {
            let diff = now_us.saturating_sub(self.last_mode_change_time);
            self.time_in_mode[old_mode.index()] += diff;
        }
        self.last_mode_change_time = now_us;
    }

    /// Bumped by the external sleep sequencer on successful/rejected
    /// light-sleep entries. The contract between sequencer and profiler
    /// stays opaque, as spec.md §9 leaves it (Open Question).
    pub(crate) fn record_light_sleep(&mut self, accepted: bool) {
        if accepted {
            self.light_sleep_counts += 1;
        } else {
            self.light_sleep_reject_counts += 1;
        }
    }

    /// Snapshots the counters and emits the table `esp_pm_impl_dump_stats`
    /// produces in the reference implementation, adapted to a `no_std`
    /// `core::fmt::Write` sink instead of a libc `FILE*`.
    pub(crate) fn dump<W: fmt::Write>(
        &self,
        sink: &mut W,
        current_mode: PowerMode,
        light_sleep_enabled: bool,
        now_us: u64,
        freq_mhz: impl Fn(PowerMode) -> u32,
    ) -> fmt::Result {
        let mut time_in_mode = self.time_in_mode;
        time_in_mode[current_mode.index()] +=
            now_us.saturating_sub(self.last_mode_change_time);

        writeln!(sink, "Mode stats:")?;
        writeln!(sink, "{:<11} {:>9} {:>10} {:>7}", "Mode", "CPU_freq", "Time(us)", "Time(%)")?;
        for (i, name) in MODE_NAMES.iter().enumerate() {
            let mode = PowerMode::from_index(i);
            if mode == PowerMode::LightSleep && !light_sleep_enabled {
                continue;
            }
            let pct = if now_us > 0 {
                (time_in_mode[i] * 100 / now_us) as u32
            } else {
                0
            };
            writeln!(
                sink,
                "{:<11} {:>7}MHz {:>10} {:>6}%",
                name,
                freq_mhz(mode),
                time_in_mode[i],
                pct
            )?;
        }

        if light_sleep_enabled {
            writeln!(sink)?;
            writeln!(sink, "Sleep stats:")?;
            writeln!(
                sink,
                "light_sleep_counts:{} light_sleep_reject_counts:{}",
                self.light_sleep_counts, self.light_sleep_reject_counts
            )?;
        }
        Ok(())
    }
}

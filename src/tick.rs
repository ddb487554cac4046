//! Cross-core tick-compare rescaling.
//!
//! When the CPU frequency changes by a factor `f = new/old`, any tick-compare
//! register programmed to fire at cycle `CMP` must be reprogrammed so the
//! interrupt still fires at the same wall-clock instant. `ccount_mul` /
//! `ccount_div` and `need_update_compare` are deliberately plain atomics
//! rather than state behind the switch lock: spec.md §9 describes the
//! cross-core interrupt as "a one-slot mailbox per CPU with release-store /
//! acquire-load semantics... the flag's edge is the synchronization event,
//! not the interrupt itself", and the rendezvous in step 3 below runs
//! outside the switch lock so the peer CPU's ISR hook can make progress
//! concurrently.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::boundary::{CrossCoreSignal, TickHardware};
use crate::cpu::{CpuId, CpuTopology};
use crate::log::pm_error;

/// Cycles added as headroom so a freshly programmed compare is never set at
/// or behind `CCOUNT`.
const MIN_FUTURE_CYCLES: u32 = 1_000;

/// Bound on the cross-core rendezvous spin, in CPU cycles of busy-polling
/// iterations. Any value far above the cost of servicing one ISR entry
/// works; this matches the reference implementation's constant.
const CCOMPARE_UPDATE_TIMEOUT: u32 = 1_000_000;

/// Shared, lock-free compensator state: the scale factor published by
/// whichever CPU is driving a switch, and the per-CPU rendezvous flags.
pub(crate) struct TickCompensator {
    ccount_mul: AtomicU32,
    ccount_div: AtomicU32,
    need_update_compare: [AtomicBool; 2],
}

impl TickCompensator {
    pub(crate) const fn new() -> Self {
        TickCompensator {
            ccount_mul: AtomicU32::new(0),
            ccount_div: AtomicU32::new(0),
            need_update_compare: [AtomicBool::new(false), AtomicBool::new(false)],
        }
    }

    /// Rescale the local compare register for the published `mul`/`div`
    /// factor (spec.md §4.3 step 2). Called by the initiating CPU on itself,
    /// and by the peer CPU's ISR hook on itself.
    fn rescale_local<T: TickHardware>(tick: &T, mul: u32, div: u32) {
        let ccount = tick.cycle_count();
        let ccompare = tick.compare();
        // Half-signed check: is `ccompare` still safely in the future?
        let margin = ccompare
            .wrapping_sub(MIN_FUTURE_CYCLES)
            .wrapping_sub(ccount);
        if margin < u32::MAX / 2 {
            let diff = ccompare.wrapping_sub(ccount) as u64;
            let diff_scaled = ((diff * mul as u64) + (div as u64 - 1)) / div as u64;
            if diff_scaled < tick.tick_period_cycles() as u64 {
                let new_compare = ccount.wrapping_add(diff_scaled as u32);
                tick.set_compare(new_compare);
            }
        }
    }

    /// Called by a CPU's ISR hook when it finds its own
    /// `need_update_compare` flag set: applies the rescale and clears the
    /// flag (spec.md §4.3, "the peer CPU clears `need_update_compare[self]`
    /// from its ISR hook").
    pub(crate) fn service_pending<T: TickHardware>(&self, cpu: CpuId, tick: &T) -> bool {
        if self.need_update_compare[cpu.index()].load(Ordering::Acquire) {
            let mul = self.ccount_mul.load(Ordering::Acquire);
            let div = self.ccount_div.load(Ordering::Acquire);
            if div != 0 {
                Self::rescale_local(tick, mul, div);
            }
            self.need_update_compare[cpu.index()].store(false, Ordering::Release);
            true
        } else {
            false
        }
    }

    /// `update(old_freq, new_freq)`: must be called only while `is_switching`
    /// is true, only by the CPU driving the switch (spec.md §4.3).
    ///
    /// Returns `Err(())` if the cross-core rendezvous exceeded its polling
    /// budget, a fatal condition upstream (spec.md §7); the caller
    /// logs and aborts rather than this function doing so directly, keeping
    /// it free of the `fatal!` macro's process-wide assumptions.
    pub(crate) fn update<T: TickHardware, X: CrossCoreSignal>(
        &self,
        old_freq: u32,
        new_freq: u32,
        cpu: CpuId,
        topology: CpuTopology,
        tick: &T,
        signal: &X,
    ) -> Result<(), ()> {
        self.ccount_mul.store(new_freq, Ordering::Release);
        self.ccount_div.store(old_freq, Ordering::Release);

        Self::rescale_local(tick, new_freq, old_freq);

        if let Some(peer) = topology.peer_of(cpu) {
            self.need_update_compare[peer.index()].store(true, Ordering::Release);
            signal.raise(peer);

            let mut elapsed = 0u32;
            while self.need_update_compare[peer.index()].load(Ordering::Acquire) {
                elapsed += 1;
                if elapsed >= CCOMPARE_UPDATE_TIMEOUT {
                    pm_error!("cross-core tick-compare rendezvous timed out");
                    self.ccount_mul.store(0, Ordering::Release);
                    self.ccount_div.store(0, Ordering::Release);
                    return Err(());
                }
            }
        }

        self.ccount_mul.store(0, Ordering::Release);
        self.ccount_div.store(0, Ordering::Release);
        Ok(())
    }
}

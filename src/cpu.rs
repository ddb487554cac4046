//! CPU identity and per-CPU bookkeeping.

/// Identifies one of the (at most two) CPUs sharing the clock domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CpuId(pub(crate) u8);

impl CpuId {
    pub const CPU0: CpuId = CpuId(0);
    pub const CPU1: CpuId = CpuId(1);

    /// The numeric index of this CPU (`0` or `1`).
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// How many CPUs share this clock domain.
///
/// Chosen at [`crate::manager::PowerManager::new`] construction time rather
/// than as a Cargo feature: unlike `stm32h7xx-hal`'s `singlecore`/`dualcore`
/// features (which select between different PAC register sets for different
/// part numbers), this crate has no PAC dependency to split on, so a runtime
/// value is simpler and costs nothing once the match arms are inlined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CpuTopology {
    /// A single CPU drives the clock domain; no cross-core rendezvous is
    /// ever needed.
    Single,
    /// Two CPUs share the clock domain; frequency steps must rendezvous via
    /// [`crate::boundary::CrossCoreSignal`].
    Dual,
}

impl CpuTopology {
    pub(crate) const fn num_cpus(self) -> usize {
        match self {
            CpuTopology::Single => 1,
            CpuTopology::Dual => 2,
        }
    }

    /// The other CPU in a dual-core topology.
    pub(crate) fn peer_of(self, cpu: CpuId) -> Option<CpuId> {
        match self {
            CpuTopology::Single => None,
            CpuTopology::Dual => Some(CpuId(1 - cpu.0)),
        }
    }
}

/// Per-CPU mutable state, protected by the manager's single switch lock.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CoreState {
    /// The scheduler has entered idle but not yet run an ISR on this CPU.
    pub(crate) core_idle: bool,
    /// Whether this CPU currently holds its implicit `CPU_FREQ_MAX` lock.
    pub(crate) rtos_lock_held: bool,
    /// Set by the initiating CPU to ask this CPU's ISR hook to rescale its
    /// tick-compare register; cleared only by this CPU.
    pub(crate) need_update_compare: bool,
}

impl CoreState {
    /// Boot state: the CPU is doing useful work, so its implicit lock is
    /// held and it is not idle (spec.md §6, `impl_init`).
    pub(crate) const fn boot() -> Self {
        CoreState {
            core_idle: false,
            rtos_lock_held: true,
            need_update_compare: false,
        }
    }
}

//! Dynamic-frequency-scaling and light-sleep power management core for
//! dual-core microcontrollers.
//!
//! This crate owns the policy (which of four power modes, `LIGHT_SLEEP`,
//! `APB_MIN`, `APB_MAX`, `CPU_MAX`, the system is allowed to run at, derived
//! from concurrently held power locks) and the mechanism for moving between
//! them online, across one or two CPUs, without ever letting a tick
//! interrupt fire late or early relative to wall-clock time. It never talks
//! to hardware directly: a board crate supplies [`boundary::ClockDriver`],
//! [`boundary::TickHardware`], [`boundary::CrossCoreSignal`],
//! [`boundary::SleepSequencer`], [`boundary::TimerSubsystem`] and
//! [`boundary::TimeSource`] implementations, and drives
//! [`manager::PowerManager`]'s entry points from the scheduler's idle loop,
//! ISR prologues, and the lock subsystem.
//!
//! ```ignore
//! use pm_core::{PowerManager, PmCapability, PmConfig};
//! use pm_core::cpu::{CpuId, CpuTopology};
//! use pm_core::config::SocVariant;
//!
//! let pm = PowerManager::new(
//!     my_clock_driver, my_tick_hw, my_cross_core_irq, my_sleep_sequencer,
//!     my_time_source, my_apb_timer, CpuTopology::Dual,
//!     SocVariant::PllFixed240_160_80 { ref_clk_div_min: 2 },
//!     PmCapability::Full { profiling: true },
//!     boot_freq_config,
//! );
//! pm.impl_init(true)?;
//! pm.configure(PmConfig { max_freq_mhz: 240, min_freq_mhz: 40, light_sleep_enabled: true })?;
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod arbiter;
pub mod boundary;
pub mod config;
pub mod cpu;
pub mod error;
mod idle;
mod log;
pub mod manager;
pub mod mode;
mod profiler;
mod switch;
mod tick;

pub(crate) use log::fatal;

pub use boundary::{ClockDriver, ClockSource, CrossCoreSignal, FreqConfig, SleepSequencer, TickHardware, TimeSource, TimerSubsystem};
pub use config::{PmCapability, PmConfig, SocVariant};
pub use cpu::{CpuId, CpuTopology};
pub use error::PmError;
pub use manager::PowerManager;
pub use mode::{LockAction, LockKind, PowerMode};

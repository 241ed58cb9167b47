//! Thin wrappers over the OS real-time primitives.
//!
//! On Linux these call `clock_gettime`/`clock_nanosleep` on
//! `CLOCK_MONOTONIC`, `sched_setscheduler(SCHED_FIFO)` and `mlockall`, and
//! the matching calls that undo the last two.
//! Elsewhere time falls back to [`std::time::Instant`] and the scheduling
//! calls report [`io::ErrorKind::Unsupported`], so a trial that asks for
//! real-time scheduling fails fast instead of running without it.
//!
//! Monotonic instants are expressed as a [`Duration`] since an unspecified
//! epoch, which makes "previous deadline + dt" plain addition.

#![allow(unsafe_code)]

use std::io;
use std::time::Duration;

pub use imp::{
    current_scheduling, lock_memory, monotonic_now, priority_range, restore_scheduling,
    set_realtime_priority, sleep_until, unlock_memory,
};

/// Scheduling policy and priority of a thread, as saved before switching
/// it to real time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulingState {
    policy: i32,
    priority: i32,
}

#[cfg(target_os = "linux")]
mod imp {
    use super::*;

    /// Current `CLOCK_MONOTONIC` reading.
    pub fn monotonic_now() -> Duration {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: `ts` is a valid, writable timespec. CLOCK_MONOTONIC is
        // always supported on Linux, so the call cannot fail.
        unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
    }

    /// Sleep until the monotonic clock reads `deadline`. Returns at once
    /// if the deadline has passed. Retries on `EINTR`.
    pub fn sleep_until(deadline: Duration) -> io::Result<()> {
        let ts = libc::timespec {
            tv_sec: deadline.as_secs() as _,
            tv_nsec: deadline.subsec_nanos() as _,
        };
        loop {
            // SAFETY: `ts` is valid for reads; the remainder pointer may
            // be null with TIMER_ABSTIME.
            let rc = unsafe {
                libc::clock_nanosleep(
                    libc::CLOCK_MONOTONIC,
                    libc::TIMER_ABSTIME,
                    &ts,
                    std::ptr::null_mut(),
                )
            };
            match rc {
                0 => return Ok(()),
                libc::EINTR => continue,
                err => return Err(io::Error::from_raw_os_error(err)),
            }
        }
    }

    fn set_scheduler(policy: i32, priority: i32) -> io::Result<()> {
        // SAFETY: sched_param is plain data; zeroed is a valid value and
        // keeps extra libc-specific fields initialised.
        let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
        param.sched_priority = priority;
        // SAFETY: `param` outlives the call; pid 0 is the calling thread.
        let rc = unsafe { libc::sched_setscheduler(0, policy, &param) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// Switch the calling thread to `SCHED_FIFO` at `priority`.
    pub fn set_realtime_priority(priority: i32) -> io::Result<()> {
        set_scheduler(libc::SCHED_FIFO, priority)
    }

    /// Policy and priority of the calling thread.
    pub fn current_scheduling() -> io::Result<SchedulingState> {
        // SAFETY: no pointers involved; pid 0 is the calling thread.
        let policy = unsafe { libc::sched_getscheduler(0) };
        if policy < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: as in `set_scheduler`.
        let mut param: libc::sched_param = unsafe { std::mem::zeroed() };
        // SAFETY: `param` is valid for writes for the duration of the call.
        let rc = unsafe { libc::sched_getparam(0, &mut param) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(SchedulingState {
            policy,
            priority: param.sched_priority,
        })
    }

    /// Put the calling thread back to a saved policy and priority.
    pub fn restore_scheduling(state: SchedulingState) -> io::Result<()> {
        set_scheduler(state.policy, state.priority)
    }

    /// Valid `SCHED_FIFO` priority range.
    pub fn priority_range() -> io::Result<(i32, i32)> {
        // SAFETY: no pointers involved.
        let (lo, hi) = unsafe {
            (
                libc::sched_get_priority_min(libc::SCHED_FIFO),
                libc::sched_get_priority_max(libc::SCHED_FIFO),
            )
        };
        if lo < 0 || hi < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok((lo, hi))
        }
    }

    /// Lock current and future pages of the process into RAM.
    pub fn lock_memory() -> io::Result<()> {
        // SAFETY: no pointers involved.
        let rc = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// Undo [`lock_memory`].
    pub fn unlock_memory() -> io::Result<()> {
        // SAFETY: no pointers involved.
        let rc = unsafe { libc::munlockall() };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use super::*;
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();

    fn unsupported() -> io::Error {
        io::Error::new(
            io::ErrorKind::Unsupported,
            "real-time scheduling is only available on Linux",
        )
    }

    /// Time since the first call in this process.
    pub fn monotonic_now() -> Duration {
        EPOCH.get_or_init(Instant::now).elapsed()
    }

    /// Sleep until [`monotonic_now`] reaches `deadline`.
    pub fn sleep_until(deadline: Duration) -> io::Result<()> {
        let now = monotonic_now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        Ok(())
    }

    /// Always unsupported.
    pub fn set_realtime_priority(_priority: i32) -> io::Result<()> {
        Err(unsupported())
    }

    /// Always unsupported.
    pub fn priority_range() -> io::Result<(i32, i32)> {
        Err(unsupported())
    }

    /// Always unsupported.
    pub fn current_scheduling() -> io::Result<SchedulingState> {
        Err(unsupported())
    }

    /// Always unsupported.
    pub fn restore_scheduling(_state: SchedulingState) -> io::Result<()> {
        Err(unsupported())
    }

    /// Always unsupported.
    pub fn lock_memory() -> io::Result<()> {
        Err(unsupported())
    }

    /// Always unsupported.
    pub fn unlock_memory() -> io::Result<()> {
        Err(unsupported())
    }
}

//! Chunked multi-object wait
//!
//! Same contract as the one shot kernel wait except the handle list may be
//! arbitrarily long. Lists that fit in one kernel call are forwarded as-is;
//! longer lists are split into [`CHUNK_HANDLES`]-wide chunks and the chunk
//! results are folded back into the caller's index space.

use crate::{
    install,
    native::{
        Handle, NativeWaitFn, WaitMode, CHUNK_HANDLES, INFINITE, MAXIMUM_WAIT_OBJECTS,
        WAIT_ABANDONED_0, WAIT_FAILED, WAIT_OBJECT_0, WAIT_TIMEOUT,
    },
};
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Waiting through the installed shim resolves to a raw native status or a
/// [`WaitError`]
pub type WaitResult = Result<u32, WaitError>;

/// Errors that cannot be expressed in the native status encoding. Anything
/// the encoding can carry (`WAIT_TIMEOUT`, `WAIT_FAILED`) is returned as a
/// status instead, so the shim stays a drop-in for the kernel entry.
#[derive(thiserror::Error, Copy, Clone, Debug, PartialEq, Eq)]
pub enum WaitError {
    /// The chunked wait was reached before activation saved the original
    /// kernel entry
    #[error("waitmux is not active, call waitmux::install::activate() before waiting")]
    NotActive,
}

/// Cadence of the slow path polling sweeps
///
/// The first sweep polls every chunk with a small budget so a handle that is
/// already signaled anywhere in the list is found quickly. Later sweeps widen
/// the per chunk budget, doubling up to `slice_cap_ms`, and never hand one
/// chunk more than its equal share of the time remaining.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WaitOptions {
    /// Per chunk budget on the first sweep, in milliseconds
    pub first_poll_ms: u32,
    /// Upper bound on the per chunk budget as later sweeps back off
    pub slice_cap_ms: u32,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            first_poll_ms: 1,
            slice_cap_ms: 256,
        }
    }
}

/// A native status folded back into meaning, relative to a wait over `len`
/// handles
///
/// Advisory decode for callers that prefer typed outcomes; the raw status is
/// the contract. The native encoding overlaps once `len` grows past the
/// `WAIT_ABANDONED_0`/`WAIT_TIMEOUT` constants; exact timeout/failure codes
/// win ties, then signaled indices.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WaitStatus {
    /// Handle at this index (caller's index space) was signaled
    Signaled(usize),
    /// Mutex at this index (caller's index space) was abandoned
    Abandoned(usize),
    /// Deadline reached with no completion
    Timeout,
    /// The kernel reported a failure
    Failed,
}

impl WaitStatus {
    pub fn decode(status: u32, len: usize) -> Self {
        let len = len as u32;
        if status == WAIT_FAILED {
            return Self::Failed;
        }
        if status == WAIT_TIMEOUT {
            return Self::Timeout;
        }
        match status.wrapping_sub(WAIT_OBJECT_0) {
            idx if idx < len => return Self::Signaled(idx as usize),
            _ => {}
        }
        match status.wrapping_sub(WAIT_ABANDONED_0) {
            idx if idx < len => Self::Abandoned(idx as usize),
            _ => Self::Failed,
        }
    }
}

/// Wait on any number of handles with the native call's contract
///
/// Statuses come back in the native encoding with indices relative to
/// `handles`, exactly as the kernel would report them for a short list.
/// Fails with [`WaitError::NotActive`] until [`install::activate`] has run.
pub fn wait_for_multiple_objects(handles: &[Handle], mode: WaitMode, timeout_ms: u32) -> WaitResult {
    wait_for_multiple_objects_with(handles, mode, timeout_ms, &WaitOptions::default())
}

/// [`wait_for_multiple_objects`] with an explicit polling cadence
pub fn wait_for_multiple_objects_with(
    handles: &[Handle],
    mode: WaitMode,
    timeout_ms: u32,
    options: &WaitOptions,
) -> WaitResult {
    let original = install::original().ok_or(WaitError::NotActive)?;
    Ok(dispatch(original, handles, mode, timeout_ms, options))
}

/// [`wait_for_multiple_objects`] with a [`Duration`] timeout, `None` meaning
/// wait forever. Sub-millisecond durations round up so they still reach the
/// kernel as a wait rather than a poll.
pub fn wait(handles: &[Handle], mode: WaitMode, timeout: Option<Duration>) -> WaitResult {
    let timeout_ms = timeout.map(ceil_millis).unwrap_or(INFINITE);
    wait_for_multiple_objects(handles, mode, timeout_ms)
}

/// [`wait_for_multiple_objects`] with a timeout in seconds, as higher level
/// pool callers hand it down. Negative means wait forever; fractional
/// milliseconds round up.
pub fn wait_secs(handles: &[Handle], mode: WaitMode, timeout_secs: f64) -> WaitResult {
    wait_for_multiple_objects(handles, mode, millis_from_secs(timeout_secs))
}

/// Seconds to whole milliseconds, by ceiling. A 0.3 ms timeout must wait
/// 1 ms, not degenerate to a 0 ms kernel poll. Negative values are the
/// wait-forever convention and map to `INFINITE`; finite values clamp just
/// below the sentinel.
pub fn millis_from_secs(timeout_secs: f64) -> u32 {
    if timeout_secs < 0.0 {
        return INFINITE;
    }
    let ms = (timeout_secs * 1000.0).ceil();
    if ms >= INFINITE as f64 {
        INFINITE - 1
    } else {
        ms as u32
    }
}

/// Duration to whole milliseconds, by ceiling, clamped below `INFINITE`
fn ceil_millis(duration: Duration) -> u32 {
    let mut ms = duration.as_millis();
    if duration.subsec_nanos() % 1_000_000 != 0 {
        ms += 1;
    }
    ms.min((INFINITE - 1) as u128) as u32
}

/// Absolute deadline derived once per wait from a monotonic clock. Every
/// remaining-time readback ceilings, so a deadline that is 0.3 ms away still
/// buys a 1 ms kernel wait.
struct Deadline(Option<Instant>);

impl Deadline {
    fn start(timeout_ms: u32) -> Self {
        match timeout_ms {
            INFINITE => Self(None),
            ms => Self(Some(Instant::now() + Duration::from_millis(ms as u64))),
        }
    }

    /// Milliseconds left, `INFINITE` when there is no deadline
    fn remaining(&self) -> u32 {
        match self.0 {
            None => INFINITE,
            Some(at) => ceil_millis(at.saturating_duration_since(Instant::now())),
        }
    }
}

/// Run one wait through a specific native entry. All state is call-local, so
/// concurrent waits never interfere.
pub(crate) fn dispatch(
    native: NativeWaitFn,
    handles: &[Handle],
    mode: WaitMode,
    timeout_ms: u32,
    options: &WaitOptions,
) -> u32 {
    if handles.is_empty() {
        return wait_empty(mode, timeout_ms);
    }
    if handles.len() <= MAXIMUM_WAIT_OBJECTS {
        // Fast path, native semantics byte for byte
        return native(handles, mode, timeout_ms);
    }
    trace!(
        handles = handles.len(),
        chunks = handles.len().div_ceil(CHUNK_HANDLES),
        "multi-object wait split across kernel calls"
    );
    let deadline = Deadline::start(timeout_ms);
    match mode {
        WaitMode::Any => sweep_any(native, handles, deadline, options),
        WaitMode::All => drain_all(native, handles, deadline),
    }
}

/// Zero handles never reaches the kernel, which rejects an empty list. An
/// all-of-nothing wait is vacuously complete; an any-of-nothing wait can only
/// run out its timeout.
fn wait_empty(mode: WaitMode, timeout_ms: u32) -> u32 {
    match mode {
        WaitMode::All => WAIT_OBJECT_0,
        WaitMode::Any => match timeout_ms {
            0 => WAIT_TIMEOUT,
            INFINITE => WAIT_FAILED,
            ms => {
                std::thread::sleep(Duration::from_millis(ms as u64));
                WAIT_TIMEOUT
            }
        },
    }
}

/// Any-mode slow path: round-robin polling sweeps, chunk 0 first. The kernel
/// only sees one chunk per call, so no call may block long enough to starve a
/// signal arriving in another chunk; the sweep budget starts at a short poll
/// and backs off while always staying within the remaining time.
fn sweep_any(
    native: NativeWaitFn,
    handles: &[Handle],
    deadline: Deadline,
    options: &WaitOptions,
) -> u32 {
    let chunks = handles.len().div_ceil(CHUNK_HANDLES) as u32;
    let mut slice = options.first_poll_ms;
    let mut sweep = 0u32;
    loop {
        for (k, chunk) in handles.chunks(CHUNK_HANDLES).enumerate() {
            let remaining = deadline.remaining();
            if sweep > 0 && remaining == 0 {
                // Deadline spent mid-sweep; no further kernel calls
                return WAIT_TIMEOUT;
            }
            let status = native(chunk, WaitMode::Any, slice_budget(slice, remaining, chunks));
            let base = (k * CHUNK_HANDLES) as u32;
            // Chunk-relative status first, then fold the chunk's base offset
            // back in; the caller's wait is over the whole list
            match WaitStatus::decode(status, chunk.len()) {
                WaitStatus::Timeout => continue,
                WaitStatus::Signaled(idx) => return WAIT_OBJECT_0 + base + idx as u32,
                WaitStatus::Abandoned(idx) => return WAIT_ABANDONED_0 + base + idx as u32,
                WaitStatus::Failed => {
                    if status != WAIT_FAILED {
                        warn!(status, "unclassifiable status from native wait");
                    }
                    return WAIT_FAILED;
                }
            }
        }
        if deadline.remaining() == 0 {
            return WAIT_TIMEOUT;
        }
        sweep += 1;
        slice = slice.saturating_mul(2).max(1).min(options.slice_cap_ms.max(1));
    }
}

/// Per chunk budget: the backoff slice, but never more than an equal share of
/// the remaining time and never more than the remaining time itself
fn slice_budget(slice: u32, remaining: u32, chunks: u32) -> u32 {
    match remaining {
        INFINITE => slice,
        remaining => slice.min(remaining.div_ceil(chunks)).min(remaining),
    }
}

/// All-mode slow path: chunks complete in order, each against the remaining
/// time. An all-wait on a chunk is atomic, so a chunk that reported complete
/// stays satisfied for the control-handle usage this shim targets. The first
/// abandonment in chunk order is the one reported, rebased to the caller's
/// index space.
fn drain_all(native: NativeWaitFn, handles: &[Handle], deadline: Deadline) -> u32 {
    let mut abandoned: Option<u32> = None;
    for (k, chunk) in handles.chunks(CHUNK_HANDLES).enumerate() {
        // A 0ms remainder degenerates to the kernel's poll, which still
        // reports an already-complete chunk as success
        let status = native(chunk, WaitMode::All, deadline.remaining());
        match WaitStatus::decode(status, chunk.len()) {
            WaitStatus::Timeout => return WAIT_TIMEOUT,
            WaitStatus::Signaled(_) => {}
            WaitStatus::Abandoned(idx) => {
                let base = (k * CHUNK_HANDLES) as u32;
                abandoned.get_or_insert(WAIT_ABANDONED_0 + base + idx as u32);
            }
            WaitStatus::Failed => {
                if status != WAIT_FAILED {
                    warn!(status, "unclassifiable status from native wait");
                }
                return WAIT_FAILED;
            }
        }
    }
    abandoned.unwrap_or(WAIT_OBJECT_0)
}

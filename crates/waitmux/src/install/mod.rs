//! One time installation of the chunked wait
//!
//! A single process-wide record saves the original kernel wait entry and the
//! lifted worker ceiling. Written once under a mutex at activation, read-only
//! for the rest of the process; concurrent activations converge on the same
//! state.

use crate::native::NativeWaitFn;
use parking_lot::Mutex;

/// Worker ceiling the pool layer applies before activation. One below the
/// kernel's 64-handle wait limit, minus the pool's internal handles.
pub const DEFAULT_MAX_WORKERS: usize = 61;

/// Per-process ceiling on dispatch once waits are chunked
pub const DISPATCH_HARD_LIMIT: usize = 510;

/// Wait slots reserved for the pool's internal control handles
pub const RESERVED_CONTROL_HANDLES: usize = 2;

/// Worker ceiling after activation
pub const LIFTED_MAX_WORKERS: usize = DISPATCH_HARD_LIMIT - RESERVED_CONTROL_HANDLES;

/// Activation may refuse before touching any state
#[derive(thiserror::Error, Copy, Clone, Debug, PartialEq, Eq)]
pub enum ActivateError {
    /// The kernel multi-object wait exists only on windows
    #[error("chunked waits need the win32 wait api, platform unsupported")]
    Unsupported,
}

#[derive(Copy, Clone)]
enum InstallState {
    Inactive,
    Active {
        original: NativeWaitFn,
        max_workers: usize,
    },
}

static STATE: Mutex<InstallState> = Mutex::new(InstallState::Inactive);

/// Install the chunked wait over the native symbol and lift the worker
/// ceiling to [`LIFTED_MAX_WORKERS`]. Idempotent; activating an active
/// process is a no-op that returns success.
#[cfg(windows)]
pub fn activate() -> Result<(), ActivateError> {
    install(crate::native::wait_native);
    Ok(())
}

/// See the windows variant; there is nothing to install elsewhere
#[cfg(not(windows))]
pub fn activate() -> Result<(), ActivateError> {
    Err(ActivateError::Unsupported)
}

/// Capture `original` and raise the ceiling, first caller wins
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn install(original: NativeWaitFn) {
    let mut state = STATE.lock();
    match *state {
        InstallState::Active { .. } => {
            tracing::debug!("already active, keeping existing install");
        }
        InstallState::Inactive => {
            *state = InstallState::Active {
                original,
                max_workers: LIFTED_MAX_WORKERS,
            };
            tracing::debug!(
                max_workers = LIFTED_MAX_WORKERS,
                "chunked wait installed over the native symbol"
            );
        }
    }
}

/// The saved kernel entry, `None` until activation. The guard every wait
/// runs before dispatching.
pub(crate) fn original() -> Option<NativeWaitFn> {
    match *STATE.lock() {
        InstallState::Active { original, .. } => Some(original),
        InstallState::Inactive => None,
    }
}

/// Whether activation has saved the original wait entry
pub fn is_active() -> bool {
    original().is_some()
}

/// Current worker ceiling: [`DEFAULT_MAX_WORKERS`] before activation,
/// [`LIFTED_MAX_WORKERS`] after
pub fn max_workers() -> usize {
    match *STATE.lock() {
        InstallState::Active { max_workers, .. } => max_workers,
        InstallState::Inactive => DEFAULT_MAX_WORKERS,
    }
}

/// Null the saved original so tests can exercise the not-active guard
#[cfg(test)]
pub(crate) fn clear() {
    *STATE.lock() = InstallState::Inactive;
}

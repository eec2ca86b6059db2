//! One shot multi-object wait, as the kernel exposes it
//!
//! https://learn.microsoft.com/en-us/windows/win32/api/synchapi/nf-synchapi-waitformultipleobjects

#[cfg(windows)]
pub use windows_sys::Win32::{
    Foundation::{WAIT_ABANDONED_0, WAIT_FAILED, WAIT_OBJECT_0, WAIT_TIMEOUT},
    System::Threading::INFINITE,
};

#[cfg(windows)]
use windows_sys::Win32::System::Threading::WaitForMultipleObjects;

// Mirrors of the Win32 status encoding so the engine (and its tests) compile
// on hosts without the kernel primitive. Values are the winbase.h constants.
#[cfg(not(windows))]
pub const WAIT_OBJECT_0: u32 = 0x0;
#[cfg(not(windows))]
pub const WAIT_ABANDONED_0: u32 = 0x80;
#[cfg(not(windows))]
pub const WAIT_TIMEOUT: u32 = 0x102;
#[cfg(not(windows))]
pub const WAIT_FAILED: u32 = 0xFFFF_FFFF;
#[cfg(not(windows))]
pub const INFINITE: u32 = 0xFFFF_FFFF;

/// Opaque reference to a waitable kernel object. Always borrowed from the
/// caller, never created or closed here. Layout compatible with the win32
/// `HANDLE`.
pub type Handle = isize;

/// The kernel refuses more handles than this in one wait call
pub const MAXIMUM_WAIT_OBJECTS: usize = 64;

/// Handles per chunk when a wait is split across calls. One slot below the
/// kernel limit, left as per-dispatch headroom.
pub const CHUNK_HANDLES: usize = MAXIMUM_WAIT_OBJECTS - 1;

/// The `bWaitAll` argument of the multi-object wait
///
/// If `All`, the call returns when every handle in the set is signaled and
/// encodes at most one abandonment. If `Any`, the call returns the first
/// signaled handle as `WAIT_OBJECT_0 + index` (or `WAIT_ABANDONED_0 + index`
/// for an abandoned mutex).
#[repr(i32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WaitMode {
    /// Return as soon as one handle is signaled
    Any = 0,
    /// Return once every handle is signaled
    All = 1,
}

/// Signature of the one shot wait. The install state saves the kernel entry
/// under this type, and tests substitute their own.
pub type NativeWaitFn = fn(&[Handle], WaitMode, u32) -> u32;

/// Pure passthrough to the kernel wait. At most [`MAXIMUM_WAIT_OBJECTS`]
/// handles; never retries, never recomputes the timeout. Kernel errors come
/// back in-band as `WAIT_FAILED`.
#[cfg(windows)]
pub fn wait_native(handles: &[Handle], mode: WaitMode, timeout_ms: u32) -> u32 {
    debug_assert!(handles.len() <= MAXIMUM_WAIT_OBJECTS);
    unsafe {
        WaitForMultipleObjects(
            handles.len() as u32,
            handles.as_ptr(),
            mode as i32,
            timeout_ms,
        )
    }
}

//! Control-handle helpers
//!
//! Owned wrappers over the waitable objects a pool parks on its reserved
//! control slots: events to signal workers and mutexes whose abandonment
//! marks a dead owner. Creation only; waiting goes through [`crate::wait`].
//!
//! https://learn.microsoft.com/en-us/windows/win32/api/synchapi/nf-synchapi-createeventw
//! https://learn.microsoft.com/en-us/windows/win32/api/synchapi/nf-synchapi-createmutexw

use crate::native::Handle;
use std::{
    io,
    os::windows::io::{AsRawHandle, FromRawHandle, HandleOrNull, OwnedHandle, RawHandle},
};
use windows_sys::Win32::{
    Foundation::{FALSE, HANDLE, TRUE},
    System::Threading::{CreateEventW, CreateMutexW, ReleaseMutex, ResetEvent, SetEvent},
};

fn owned(raw: HANDLE) -> io::Result<OwnedHandle> {
    // Event and mutex creation return null on failure, never INVALID_HANDLE_VALUE
    let handle = unsafe { HandleOrNull::from_raw_handle(raw as _) };
    OwnedHandle::try_from(handle).map_err(|_| io::Error::last_os_error())
}

/// An anonymous event object, closed on drop
pub struct OwnedEventHandle(OwnedHandle);

impl OwnedEventHandle {
    /// Create a manual-reset event; stays signaled until [`Self::reset`]
    pub fn manual() -> io::Result<Self> {
        Self::create(TRUE)
    }

    /// Create an auto-reset event; releases a single waiter per signal
    pub fn auto() -> io::Result<Self> {
        Self::create(FALSE)
    }

    fn create(manual_reset: i32) -> io::Result<Self> {
        let raw = unsafe {
            CreateEventW(std::ptr::null(), manual_reset, FALSE, std::ptr::null())
        };
        owned(raw).map(Self)
    }

    /// Set the event to the signaled state
    pub fn set(&self) -> io::Result<()> {
        match unsafe { SetEvent(self.waitable()) } {
            FALSE => Err(io::Error::last_os_error()),
            _ => Ok(()),
        }
    }

    /// Set the event back to the nonsignaled state
    pub fn reset(&self) -> io::Result<()> {
        match unsafe { ResetEvent(self.waitable()) } {
            FALSE => Err(io::Error::last_os_error()),
            _ => Ok(()),
        }
    }

    /// The handle as the wait entry points borrow it
    pub fn waitable(&self) -> Handle {
        self.0.as_raw_handle() as Handle
    }
}

impl AsRawHandle for OwnedEventHandle {
    fn as_raw_handle(&self) -> RawHandle {
        self.0.as_raw_handle()
    }
}

/// An anonymous mutex object, closed on drop. A wait acquires it; a thread
/// that exits while owning it abandons it, which waits report through the
/// `WAIT_ABANDONED_0` status range.
pub struct OwnedMutexHandle(OwnedHandle);

impl OwnedMutexHandle {
    /// Create a mutex without taking initial ownership
    pub fn anonymous() -> io::Result<Self> {
        let raw = unsafe { CreateMutexW(std::ptr::null(), FALSE, std::ptr::null()) };
        owned(raw).map(Self)
    }

    /// Release ownership taken by a completed wait
    pub fn release(&self) -> io::Result<()> {
        match unsafe { ReleaseMutex(self.waitable()) } {
            FALSE => Err(io::Error::last_os_error()),
            _ => Ok(()),
        }
    }

    /// The handle as the wait entry points borrow it
    pub fn waitable(&self) -> Handle {
        self.0.as_raw_handle() as Handle
    }
}

impl AsRawHandle for OwnedMutexHandle {
    fn as_raw_handle(&self) -> RawHandle {
        self.0.as_raw_handle()
    }
}

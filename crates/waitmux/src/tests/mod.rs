//! tests


use crate::native::{
    Handle, WaitMode, MAXIMUM_WAIT_OBJECTS, WAIT_ABANDONED_0, WAIT_FAILED, WAIT_OBJECT_0,
    WAIT_TIMEOUT,
};
use std::{cell::RefCell, collections::HashSet};

/// One native call as the fake kernel saw it
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Call {
    handles: usize,
    mode: WaitMode,
    timeout_ms: u32,
}

#[derive(Default)]
struct FakeKernel {
    signaled: HashSet<Handle>,
    abandoned: HashSet<Handle>,
    broken: HashSet<Handle>,
    calls: Vec<Call>,
}

thread_local! {
    static KERNEL: RefCell<FakeKernel> = RefCell::new(FakeKernel::default());
}

/// Stands in for the kernel entry. Completion is immediate: a handle is
/// signaled or abandoned up front, or the call times out without consuming
/// its budget. Enforces the real call's preconditions.
fn fake_wait(handles: &[Handle], mode: WaitMode, timeout_ms: u32) -> u32 {
    KERNEL.with(|kernel| {
        let mut kernel = kernel.borrow_mut();
        assert!(!handles.is_empty(), "kernel rejects an empty wait");
        assert!(
            handles.len() <= MAXIMUM_WAIT_OBJECTS,
            "kernel limit exceeded"
        );
        kernel.calls.push(Call {
            handles: handles.len(),
            mode,
            timeout_ms,
        });
        if handles.iter().any(|h| kernel.broken.contains(h)) {
            return WAIT_FAILED;
        }
        match mode {
            WaitMode::Any => {
                for (idx, handle) in handles.iter().enumerate() {
                    if kernel.abandoned.contains(handle) {
                        return WAIT_ABANDONED_0 + idx as u32;
                    }
                    if kernel.signaled.contains(handle) {
                        return WAIT_OBJECT_0 + idx as u32;
                    }
                }
                WAIT_TIMEOUT
            }
            WaitMode::All => {
                let complete = handles
                    .iter()
                    .all(|h| kernel.signaled.contains(h) || kernel.abandoned.contains(h));
                if !complete {
                    return WAIT_TIMEOUT;
                }
                handles
                    .iter()
                    .position(|h| kernel.abandoned.contains(h))
                    .map(|idx| WAIT_ABANDONED_0 + idx as u32)
                    .unwrap_or(WAIT_OBJECT_0)
            }
        }
    })
}

fn handles(count: usize) -> Vec<Handle> {
    (0..count as Handle).map(|i| 0x1000 + i).collect()
}

fn reset() {
    KERNEL.with(|kernel| *kernel.borrow_mut() = FakeKernel::default());
}

fn signal(handle: Handle) {
    KERNEL.with(|kernel| {
        kernel.borrow_mut().signaled.insert(handle);
    });
}

fn signal_all(handles: &[Handle]) {
    KERNEL.with(|kernel| kernel.borrow_mut().signaled.extend(handles.iter().copied()));
}

fn abandon(handle: Handle) {
    KERNEL.with(|kernel| {
        let mut kernel = kernel.borrow_mut();
        kernel.signaled.remove(&handle);
        kernel.abandoned.insert(handle);
    });
}

fn poison(handle: Handle) {
    KERNEL.with(|kernel| {
        kernel.borrow_mut().broken.insert(handle);
    });
}

fn calls() -> Vec<Call> {
    KERNEL.with(|kernel| kernel.borrow().calls.clone())
}

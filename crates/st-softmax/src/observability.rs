// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

//! Lightweight hooks for observing kernel dispatches without introducing a
//! dependency on a logging framework in the hot path.

use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, RwLock};

use crate::collapse::Collapsed;

/// Metadata about a completed kernel dispatch.
#[derive(Clone, Debug)]
pub struct KernelEvent {
    pub kernel: &'static str,
    pub shape: Vec<usize>,
    pub rows: usize,
    pub cols: usize,
}

/// Observer callback invoked after a kernel dispatch completes.
pub type KernelObserver = Arc<dyn Fn(&KernelEvent) + Send + Sync + 'static>;

static KERNEL_OBSERVER: OnceLock<RwLock<Option<KernelObserver>>> = OnceLock::new();

thread_local! {
    static IN_OBSERVER_CALLBACK: Cell<bool> = Cell::new(false);
}

/// Install (or clear) the global kernel observer.
///
/// Returns the previously installed observer, if any.
pub fn set_kernel_observer(observer: Option<KernelObserver>) -> Option<KernelObserver> {
    let lock = KERNEL_OBSERVER.get_or_init(|| RwLock::new(None));
    let mut slot = lock.write().unwrap();
    std::mem::replace(&mut *slot, observer)
}

/// Emit a dispatch event to the currently installed observer.
///
/// This is a no-op unless an observer has been registered via
/// [`set_kernel_observer`]. When no observer is present this function does
/// not allocate.
pub fn emit_kernel_event(kernel: &'static str, shape: &[usize], view: Collapsed) {
    let lock = match KERNEL_OBSERVER.get() {
        Some(lock) => lock,
        None => return,
    };
    let observer = lock.read().unwrap().clone();
    let Some(observer) = observer else {
        return;
    };

    let already_in_callback = IN_OBSERVER_CALLBACK.with(|flag| {
        if flag.get() {
            true
        } else {
            flag.set(true);
            false
        }
    });
    if already_in_callback {
        return;
    }

    let event = KernelEvent {
        kernel,
        shape: shape.to_vec(),
        rows: view.rows,
        cols: view.cols,
    };

    let _ = catch_unwind(AssertUnwindSafe(|| observer(&event)));

    IN_OBSERVER_CALLBACK.with(|flag| flag.set(false));
}

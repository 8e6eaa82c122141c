//! Upcall Stubs: the native-to-managed call surface.
//!
//! The native library calls back into this crate in two ways, both of which
//! may arrive on native worker threads:
//! - decision upcalls ([`CustomFilter`], [`PreSolve`]) invoked mid-solve, and
//! - task dispatch ([`WorkerPool`]) when the world is configured to run its
//!   internal parallelism on the embedder's threads.
//!
//! Upcall implementations receive raw handle values, never wrappers: the
//! registry and the wrapper graph are single-threaded state and must not be
//! touched from an upcall. A panic crossing the C boundary is undefined
//! behavior, so every trampoline is a `catch_unwind` boundary; a panicking
//! filter or pre-solve is logged and answered with `true`, the permissive
//! default that keeps the solve well-defined.

use std::os::raw::c_void;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error};

use crate::ffi::types::{GrManifold, GrShapeId, GrTaskFn};

/// Contact filtering decision, consulted when a candidate pair passes the
/// category/mask filter. Return `false` to suppress the contact.
pub trait CustomFilter: Send + Sync + 'static {
    fn should_collide(&self, shape_a: GrShapeId, shape_b: GrShapeId) -> bool;
}

/// Pre-solve decision for a touching pair. Return `false` to disable the
/// contact for this step.
pub trait PreSolve: Send + Sync + 'static {
    fn pre_solve(&self, shape_a: GrShapeId, shape_b: GrShapeId, manifold: &GrManifold) -> bool;
}

pub(crate) unsafe extern "C" fn custom_filter_trampoline(
    shape_a: GrShapeId,
    shape_b: GrShapeId,
    context: *mut c_void,
) -> bool {
    let result = catch_unwind(AssertUnwindSafe(|| {
        let filter = unsafe { &*(context as *const Box<dyn CustomFilter>) };
        filter.should_collide(shape_a, shape_b)
    }));
    match result {
        Ok(decision) => decision,
        Err(_) => {
            error!("custom filter panicked; allowing the contact");
            true
        }
    }
}

pub(crate) unsafe extern "C" fn pre_solve_trampoline(
    shape_a: GrShapeId,
    shape_b: GrShapeId,
    manifold: *const GrManifold,
    context: *mut c_void,
) -> bool {
    let result = catch_unwind(AssertUnwindSafe(|| {
        let pre_solve = unsafe { &*(context as *const Box<dyn PreSolve>) };
        let manifold = unsafe { &*manifold };
        pre_solve.pre_solve(shape_a, shape_b, manifold)
    }));
    match result {
        Ok(decision) => decision,
        Err(_) => {
            error!("pre-solve callback panicked; keeping the contact enabled");
            true
        }
    }
}

// --- Task bridge ---

#[derive(Copy, Clone)]
struct SendPtr(*mut c_void);
// The native side promises task contexts are usable from any worker thread
// between enqueue and finish.
unsafe impl Send for SendPtr {}

struct Job {
    task: GrTaskFn,
    start: i32,
    end: i32,
    task_context: SendPtr,
    done: Sender<()>,
}

/// Thread pool lent to the native scheduler.
///
/// The native library partitions its internal work into item ranges and hands
/// them to the embedder through the enqueue upcall; `finish` blocks until
/// every range of that task has run. Each dispatched range executes exactly
/// once, and completion is signaled exactly once per range.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    worker_count: usize,
}

/// Opaque per-task state passed back through `finish`.
struct TaskHandle {
    done: Receiver<()>,
    pending: usize,
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (sender, receiver) = unbounded::<Job>();
        let workers = (0..worker_count)
            .map(|index| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("granite-worker-{index}"))
                    .spawn(move || worker_loop(index as u32, receiver))
                    .unwrap_or_else(|e| panic!("failed to spawn worker thread: {e}"))
            })
            .collect();
        debug!("worker pool started with {worker_count} threads");
        WorkerPool {
            sender: Some(sender),
            workers,
            worker_count,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Splits `[0, item_count)` into per-worker ranges no smaller than
    /// `min_range` and queues them. Returns the handle `finish` later waits
    /// on.
    fn dispatch(&self, task: GrTaskFn, item_count: i32, min_range: i32, context: SendPtr) -> TaskHandle {
        let item_count = item_count.max(0);
        let chunk = (item_count as usize)
            .div_ceil(self.worker_count)
            .max(min_range.max(1) as usize) as i32;

        let (done_tx, done_rx) = bounded(self.worker_count);
        let mut pending = 0;
        let mut start = 0;
        while start < item_count {
            let end = (start + chunk).min(item_count);
            if let Some(sender) = &self.sender {
                // Send only fails after shutdown, which cannot overlap a
                // dispatch because the native side holds the pool alive.
                if sender
                    .send(Job {
                        task,
                        start,
                        end,
                        task_context: context,
                        done: done_tx.clone(),
                    })
                    .is_ok()
                {
                    pending += 1;
                }
            }
            start = end;
        }
        TaskHandle {
            done: done_rx,
            pending,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel ends each worker loop.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(worker_index: u32, receiver: Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        // Task bodies are native `extern "C"` functions and cannot unwind
        // into this frame.
        unsafe { (job.task)(job.start, job.end, worker_index, job.task_context.0) };
        let _ = job.done.send(());
    }
}

impl TaskHandle {
    fn wait(self) {
        for _ in 0..self.pending {
            let _ = self.done.recv();
        }
    }
}

/// Enqueue upcall with the native task-system signature. `user_context` is
/// the [`WorkerPool`] registered in the world definition.
pub(crate) unsafe extern "C" fn enqueue_task_trampoline(
    task: GrTaskFn,
    item_count: i32,
    min_range: i32,
    task_context: *mut c_void,
    user_context: *mut c_void,
) -> *mut c_void {
    let pool = unsafe { &*(user_context as *const WorkerPool) };
    let handle = pool.dispatch(task, item_count, min_range, SendPtr(task_context));
    Box::into_raw(Box::new(handle)) as *mut c_void
}

/// Finish upcall: blocks until every range of the task has completed, then
/// releases the handle.
pub(crate) unsafe extern "C" fn finish_task_trampoline(
    task_handle: *mut c_void,
    _user_context: *mut c_void,
) {
    if task_handle.is_null() {
        return;
    }
    let handle = unsafe { Box::from_raw(task_handle as *mut TaskHandle) };
    handle.wait();
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    unsafe extern "C" fn count_items_task(
        start: i32,
        end: i32,
        _worker_index: u32,
        task_context: *mut c_void,
    ) {
        let counter = unsafe { &*(task_context as *const AtomicU32) };
        counter.fetch_add((end - start) as u32, Ordering::SeqCst);
    }

    #[test]
    fn every_item_is_dispatched_exactly_once() {
        let pool = WorkerPool::new(4);
        let counter = AtomicU32::new(0);
        let ctx = &counter as *const AtomicU32 as *mut c_void;

        let handle = unsafe {
            enqueue_task_trampoline(count_items_task, 1000, 16, ctx, &pool as *const _ as *mut c_void)
        };
        unsafe { finish_task_trampoline(handle, std::ptr::null_mut()) };

        assert_eq!(counter.load(Ordering::SeqCst), 1000);
    }

    #[test]
    fn empty_task_completes_immediately() {
        let pool = WorkerPool::new(2);
        let counter = AtomicU32::new(0);
        let ctx = &counter as *const AtomicU32 as *mut c_void;

        let handle = unsafe {
            enqueue_task_trampoline(count_items_task, 0, 8, ctx, &pool as *const _ as *mut c_void)
        };
        unsafe { finish_task_trampoline(handle, std::ptr::null_mut()) };
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    struct DenyAll;
    impl CustomFilter for DenyAll {
        fn should_collide(&self, _a: GrShapeId, _b: GrShapeId) -> bool {
            false
        }
    }

    struct PanickingFilter;
    impl CustomFilter for PanickingFilter {
        fn should_collide(&self, _a: GrShapeId, _b: GrShapeId) -> bool {
            panic!("deliberate test panic")
        }
    }

    #[test]
    fn filter_trampoline_forwards_the_decision() {
        let slot: Box<dyn CustomFilter> = Box::new(DenyAll);
        let ctx = &slot as *const Box<dyn CustomFilter> as *mut c_void;
        let decision =
            unsafe { custom_filter_trampoline(GrShapeId::NULL, GrShapeId::NULL, ctx) };
        assert!(!decision);
    }

    #[test]
    fn filter_trampoline_contains_panics_with_permissive_default() {
        let slot: Box<dyn CustomFilter> = Box::new(PanickingFilter);
        let ctx = &slot as *const Box<dyn CustomFilter> as *mut c_void;
        let decision =
            unsafe { custom_filter_trampoline(GrShapeId::NULL, GrShapeId::NULL, ctx) };
        assert!(decision, "a panicking filter must not suppress contacts");
    }
}

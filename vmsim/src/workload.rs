//! Concurrent reference generators driving a shared [`Mmu`].
//!
//! Each logical process runs on its own thread with its own seeded RNG and
//! submits one reference at a time. Pause and stop are cooperative: both
//! flags are observed between translations, so an in-flight translation
//! always runs to completion, and a paused worker never holds the
//! translation lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::PAGE_SIZE;
use crate::frame_allocator::FrameAllocator;
use crate::mmu::Mmu;
use crate::stats::{ProcessId, ProcessStatus};

/// Seed base matching the reference generators' per-process determinism:
/// process `i` draws from a generator seeded `base_seed + i`.
pub const DEFAULT_BASE_SEED: u64 = 100;

/// References each process submits when the caller does not say otherwise.
pub const DEFAULT_STEPS: usize = 20;

/// Cooperative pause/stop switches shared by every worker of a run.
pub struct RunControl {
    paused: Mutex<bool>,
    resumed: Condvar,
    stopped: AtomicBool,
}

impl RunControl {
    pub fn new() -> Self {
        RunControl {
            paused: Mutex::new(false),
            resumed: Condvar::new(),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn pause(&self) {
        *self.paused.lock().expect("pause lock poisoned") = true;
    }

    pub fn resume(&self) {
        *self.paused.lock().expect("pause lock poisoned") = false;
        self.resumed.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.lock().expect("pause lock poisoned")
    }

    /// Stops the run and wakes any paused workers so they can observe the
    /// flag. Workers finish their current translation first.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        // Taking the pause lock serializes with workers entering the wait,
        // so none of them can miss the wakeup.
        let _paused = self.paused.lock().expect("pause lock poisoned");
        self.resumed.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Parks the caller until the run is resumed or stopped.
    fn block_while_paused(&self) {
        let mut paused = self.paused.lock().expect("pause lock poisoned");
        while *paused && !self.is_stopped() {
            paused = self.resumed.wait(paused).expect("pause lock poisoned");
        }
    }
}

impl Default for RunControl {
    fn default() -> Self {
        RunControl::new()
    }
}

/// Sizing of a run: how many logical processes and how many references
/// each submits.
#[derive(Copy, Clone, Debug)]
pub struct Workload {
    pub process_count: u32,
    pub steps_per_process: usize,
    pub base_seed: u64,
}

impl Workload {
    pub fn new(process_count: u32, steps_per_process: usize) -> Self {
        Workload {
            process_count,
            steps_per_process,
            base_seed: DEFAULT_BASE_SEED,
        }
    }

    /// Runs every process to completion, or until `control` is stopped,
    /// and returns once all of them have finished.
    ///
    /// Every process appears in the statistics with status `SLEEPING`
    /// before the first worker starts.
    pub fn run<A>(&self, mmu: &Mmu<A>, control: &RunControl)
    where
        A: FrameAllocator + Send,
    {
        for process_id in 0..self.process_count {
            mmu.get_or_create_process_stats(process_id)
                .set_status(ProcessStatus::Sleeping);
        }

        thread::scope(|scope| {
            for process_id in 0..self.process_count {
                scope.spawn(move || self.run_process(mmu, control, process_id));
            }
        });
    }

    fn run_process<A>(&self, mmu: &Mmu<A>, control: &RunControl, process_id: ProcessId)
    where
        A: FrameAllocator,
    {
        let process = mmu.get_or_create_process_stats(process_id);
        let mut rng = StdRng::seed_from_u64(self.base_seed + u64::from(process_id));
        let num_pages = mmu.config().num_pages;

        for _ in 0..self.steps_per_process {
            if control.is_stopped() {
                break;
            }
            if control.is_paused() {
                process.set_status(ProcessStatus::Paused);
                control.block_while_paused();
                if control.is_stopped() {
                    break;
                }
            }
            process.set_status(ProcessStatus::Running);

            let page_number = rng.gen_range(0..num_pages);
            let offset = rng.gen_range(0..PAGE_SIZE);
            let logical_address = page_number * PAGE_SIZE + offset;

            // Pages are drawn in range, so the translation cannot be
            // rejected.
            if let Some(frame_number) = mmu.translate(page_number, process_id) {
                let physical_address = frame_number * PAGE_SIZE + offset;
                info!(
                    "process {process_id}: page {page_number} requested, \
                     logical address {logical_address} => physical address {physical_address}"
                );
            }
        }

        process.set_status(ProcessStatus::Finished);
    }
}

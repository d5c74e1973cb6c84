//! Global and per-process reference accounting.
//!
//! Counters are lock-free atomics so that processes can be accounted
//! without taking the translation lock. The global aggregates are
//! maintained independently of the per-process records rather than derived
//! from them; every recording step bumps exactly one per-process counter
//! and the matching global counter.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Identifier of a logical process submitting page references.
pub type ProcessId = u32;

/// Lifecycle of a logical process as reported to the front end. Transitions
/// are driven by the run orchestrator, never by the engine itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProcessStatus {
    Ready,
    Sleeping,
    Running,
    Paused,
    Finished,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessStatus::Ready => "READY",
            ProcessStatus::Sleeping => "SLEEPING",
            ProcessStatus::Running => "RUNNING",
            ProcessStatus::Paused => "PAUSED",
            ProcessStatus::Finished => "FINISHED",
        };
        f.write_str(name)
    }
}

/// Counters for a single logical process, created on first reference and
/// kept for the rest of the run. Counters only ever increase.
pub struct ProcessStats {
    page_references: AtomicU64,
    tlb_misses: AtomicU64,
    page_faults: AtomicU64,
    status: Mutex<ProcessStatus>,
}

impl ProcessStats {
    fn new() -> Self {
        ProcessStats {
            page_references: AtomicU64::new(0),
            tlb_misses: AtomicU64::new(0),
            page_faults: AtomicU64::new(0),
            status: Mutex::new(ProcessStatus::Ready),
        }
    }

    pub fn page_references(&self) -> u64 {
        self.page_references.load(Ordering::Relaxed)
    }

    pub fn tlb_misses(&self) -> u64 {
        self.tlb_misses.load(Ordering::Relaxed)
    }

    pub fn page_faults(&self) -> u64 {
        self.page_faults.load(Ordering::Relaxed)
    }

    pub fn tlb_miss_ratio(&self) -> f64 {
        ratio(self.tlb_misses(), self.page_references())
    }

    pub fn page_fault_ratio(&self) -> f64 {
        ratio(self.page_faults(), self.page_references())
    }

    pub fn status(&self) -> ProcessStatus {
        *self.status.lock().expect("status lock poisoned")
    }

    pub fn set_status(&self, status: ProcessStatus) {
        *self.status.lock().expect("status lock poisoned") = status;
    }
}

/// Aggregate counters across every process.
#[derive(Default)]
pub struct GlobalStats {
    total_references: AtomicU64,
    tlb_misses: AtomicU64,
    page_faults: AtomicU64,
    disk_accesses: AtomicU64,
}

impl GlobalStats {
    pub fn total_references(&self) -> u64 {
        self.total_references.load(Ordering::Relaxed)
    }

    pub fn tlb_misses(&self) -> u64 {
        self.tlb_misses.load(Ordering::Relaxed)
    }

    pub fn page_faults(&self) -> u64 {
        self.page_faults.load(Ordering::Relaxed)
    }

    pub fn disk_accesses(&self) -> u64 {
        self.disk_accesses.load(Ordering::Relaxed)
    }

    pub fn tlb_miss_ratio(&self) -> f64 {
        ratio(self.tlb_misses(), self.total_references())
    }

    pub fn page_fault_ratio(&self) -> f64 {
        ratio(self.page_faults(), self.total_references())
    }
}

/// Statistics for one run: the global aggregates plus the per-process
/// records, created lazily on first touch and never destroyed until the
/// whole engine is rebuilt.
pub struct Stats {
    global: GlobalStats,
    processes: RwLock<HashMap<ProcessId, Arc<ProcessStats>>>,
}

impl Stats {
    pub fn new() -> Self {
        Stats {
            global: GlobalStats::default(),
            processes: RwLock::new(HashMap::new()),
        }
    }

    pub fn global(&self) -> &GlobalStats {
        &self.global
    }

    /// The record for `process_id`, created on first touch.
    pub fn get_or_create(&self, process_id: ProcessId) -> Arc<ProcessStats> {
        if let Some(process) = self
            .processes
            .read()
            .expect("process map poisoned")
            .get(&process_id)
        {
            return Arc::clone(process);
        }

        let mut processes = self.processes.write().expect("process map poisoned");
        Arc::clone(
            processes
                .entry(process_id)
                .or_insert_with(|| Arc::new(ProcessStats::new())),
        )
    }

    pub fn process(&self, process_id: ProcessId) -> Option<Arc<ProcessStats>> {
        self.processes
            .read()
            .expect("process map poisoned")
            .get(&process_id)
            .map(Arc::clone)
    }

    /// Snapshot of every process record, sorted by process id so reports
    /// come out in a stable order.
    pub fn processes(&self) -> Vec<(ProcessId, Arc<ProcessStats>)> {
        let mut processes: Vec<_> = self
            .processes
            .read()
            .expect("process map poisoned")
            .iter()
            .map(|(id, process)| (*id, Arc::clone(process)))
            .collect();
        processes.sort_by_key(|(id, _)| *id);
        processes
    }

    pub fn record_reference(&self, process: &ProcessStats) {
        process.page_references.fetch_add(1, Ordering::Relaxed);
        self.global.total_references.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tlb_miss(&self, process: &ProcessStats) {
        process.tlb_misses.fetch_add(1, Ordering::Relaxed);
        self.global.tlb_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// One fault is one simulated disk access; there is no disk cache.
    pub fn record_page_fault(&self, process: &ProcessStats) {
        process.page_faults.fetch_add(1, Ordering::Relaxed);
        self.global.page_faults.fetch_add(1, Ordering::Relaxed);
        self.global.disk_accesses.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for Stats {
    fn default() -> Self {
        Stats::new()
    }
}

fn ratio(events: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        events as f64 / total as f64
    }
}

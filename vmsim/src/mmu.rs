//! The translation engine: TLB check, page-table check, fault handling and
//! statistics accounting for every page reference.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use log::{debug, trace};

use crate::config::Config;
use crate::frame_allocator::{FifoFrameAllocator, FrameAllocator};
use crate::page_table::{InvertedPageTable, PageTable};
use crate::stats::{ProcessId, ProcessStats, Stats};
use crate::tlb::Tlb;

/// The mutable translation state. Every translation reads and writes it
/// under a single lock acquisition, so concurrent faults can never
/// interleave eviction and installation steps and the page table and
/// inverted page table stay mutual inverses.
struct Tables<A> {
    tlb: Tlb,
    page_table: PageTable,
    inverted: InvertedPageTable,
    allocator: A,
}

/// One memory-management unit shared by every simulated process.
///
/// The frame allocation policy is pluggable; [`FifoFrameAllocator`] is the
/// default.
pub struct Mmu<A = FifoFrameAllocator> {
    config: Config,
    tables: Mutex<Tables<A>>,
    stats: Stats,
}

impl Mmu<FifoFrameAllocator> {
    /// A fully reset engine: all pages unmapped, all TLB slots invalid,
    /// all counters zero, no process records.
    pub fn new(config: Config) -> Self {
        let allocator = FifoFrameAllocator::new(config.num_frames);
        Mmu::with_allocator(config, allocator)
    }
}

impl<A: FrameAllocator> Mmu<A> {
    pub fn with_allocator(config: Config, allocator: A) -> Self {
        Mmu {
            config,
            tables: Mutex::new(Tables {
                tlb: Tlb::new(config.tlb_size),
                page_table: PageTable::new(config.num_pages),
                inverted: InvertedPageTable::new(config.num_frames),
                allocator,
            }),
            stats: Stats::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// The statistics record for `process_id`, created if this process has
    /// not been seen yet. Lets an orchestrator seed a process's status
    /// before its first translation.
    pub fn get_or_create_process_stats(&self, process_id: ProcessId) -> Arc<ProcessStats> {
        self.stats.get_or_create(process_id)
    }

    /// Resolves a reference to `page_number` from `process_id` to the frame
    /// holding the page.
    ///
    /// A page outside the configured range resolves to `None` without
    /// touching any counter or table. A valid reference is always counted,
    /// then resolved through the TLB, the page table and finally the fault
    /// path, loading the page into the next FIFO frame and evicting that
    /// frame's previous resident if it has one.
    pub fn translate(&self, page_number: usize, process_id: ProcessId) -> Option<usize> {
        if page_number >= self.config.num_pages {
            return None;
        }

        let process = self.stats.get_or_create(process_id);
        self.stats.record_reference(&process);

        let mut tables = self.tables.lock().expect("translation lock poisoned");

        if let Some(frame_number) = tables.tlb.lookup(page_number) {
            trace!("page {page_number}: tlb hit, frame {frame_number}");
            return Some(frame_number);
        }
        self.stats.record_tlb_miss(&process);

        if let Some(frame_number) = tables.page_table.get(page_number) {
            trace!("page {page_number}: page table hit, frame {frame_number}");
            tables.tlb.insert(page_number, frame_number);
            return Some(frame_number);
        }

        self.stats.record_page_fault(&process);
        let frame_number = tables.allocator.allocate();

        // The frame may still hold an earlier page; unmap it. A TLB slot
        // caching the evicted page is left in place and keeps hitting until
        // the cursor overwrites it.
        if let Some(evicted) = tables.inverted.resident(frame_number) {
            tables.page_table.clear(evicted);
            debug!("page {page_number}: fault, evicting page {evicted} from frame {frame_number}");
        } else {
            debug!("page {page_number}: fault, loading into free frame {frame_number}");
        }

        tables.page_table.set(page_number, frame_number);
        tables.inverted.set(frame_number, page_number);
        tables.tlb.insert(page_number, frame_number);

        Some(frame_number)
    }

    /// Fixed-width dump of every TLB slot and the full page table. Invalid
    /// TLB slots and unmapped pages print as -1; the valid bit is 1 for
    /// mapped pages and 0 otherwise. Reading the state has no side effects.
    pub fn render_state(&self) -> String {
        let tables = self.tables.lock().expect("translation lock poisoned");
        let mut out = String::new();

        out.push_str(&"-".repeat(98));
        out.push_str("\nThe current state of the TLB:\nPage#:  ");
        for entry in tables.tlb.entries() {
            let page = if entry.valid {
                entry.page_number as i64
            } else {
                -1
            };
            let _ = write!(out, "{page:<4}");
        }

        out.push_str("\nFrame#: ");
        for entry in tables.tlb.entries() {
            let frame = if entry.valid {
                entry.frame_number as i64
            } else {
                -1
            };
            let _ = write!(out, "{frame:<4}");
        }

        out.push_str("\n\nThe page table (page#: frame# (-1 if not mapped), valid bit):\nPage#:  ");
        for page_number in 0..self.config.num_pages {
            let _ = write!(out, "{page_number:<4}");
        }

        out.push_str("\nFrame#: ");
        for frame in tables.page_table.iter() {
            let frame = frame.map_or(-1, |frame_number| frame_number as i64);
            let _ = write!(out, "{frame:<4}");
        }

        out.push_str("\nValid:  ");
        for frame in tables.page_table.iter() {
            let bit = i64::from(frame.is_some());
            let _ = write!(out, "{bit:<4}");
        }
        out.push('\n');

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn engine(num_pages: usize, num_frames: usize, tlb_size: usize) -> Mmu {
        Mmu::new(Config::new(num_pages, num_frames, tlb_size).unwrap())
    }

    #[test]
    fn frames_stay_in_range() {
        let mmu = engine(16, 4, 4);

        for step in 0..200 {
            let page_number = (step * 5 + 3) % 16;
            let frame_number = mmu.translate(page_number, 0).unwrap();
            assert!(frame_number < 4);
        }
    }

    #[test]
    fn out_of_range_pages_touch_nothing() {
        let mmu = engine(8, 4, 2);

        assert_eq!(mmu.translate(8, 0), None);
        assert_eq!(mmu.translate(usize::MAX, 0), None);

        let global = mmu.stats().global();
        assert_eq!(global.total_references(), 0);
        assert_eq!(global.tlb_misses(), 0);
        assert_eq!(global.page_faults(), 0);
        assert_eq!(global.disk_accesses(), 0);
        assert!(mmu.stats().process(0).is_none());
    }

    #[test]
    fn a_tlb_hit_is_idempotent() {
        let mmu = engine(8, 4, 4);

        let first = mmu.translate(3, 0).unwrap();
        let faults = mmu.stats().global().page_faults();

        let second = mmu.translate(3, 0).unwrap();

        assert_eq!(first, second);
        assert_eq!(mmu.stats().global().page_faults(), faults);
        // The repeat hit in the TLB is not a miss either.
        assert_eq!(mmu.stats().global().tlb_misses(), 1);
        assert_eq!(mmu.stats().global().total_references(), 2);
    }

    #[test]
    fn first_touch_faults_once() {
        let mmu = engine(8, 4, 4);

        mmu.translate(5, 0).unwrap();
        let global = mmu.stats().global();
        assert_eq!(global.page_faults(), 1);
        assert_eq!(global.disk_accesses(), 1);

        mmu.translate(5, 0).unwrap();
        assert_eq!(global.page_faults(), 1);
        assert_eq!(global.disk_accesses(), 1);
    }

    #[test]
    fn a_page_table_hit_records_a_miss_but_no_fault() {
        // TLB of one slot: the second page's insertion overwrites the
        // first page's slot, so re-referencing the first page misses the
        // TLB but still resolves through the page table.
        let mmu = engine(8, 4, 1);

        mmu.translate(0, 0).unwrap();
        mmu.translate(1, 0).unwrap();
        let frame_number = mmu.translate(0, 0).unwrap();

        assert_eq!(frame_number, 0);
        let global = mmu.stats().global();
        assert_eq!(global.tlb_misses(), 3);
        assert_eq!(global.page_faults(), 2);
    }

    #[test]
    fn fifo_reuse_evicts_the_first_loaded_page() {
        let mmu = engine(8, 3, 2);

        for page_number in 0..4 {
            assert_eq!(mmu.translate(page_number, 0), Some(page_number % 3));
        }

        // Pages 1 and 2 are still resident; no new fault.
        assert_eq!(mmu.translate(1, 0), Some(1));
        assert_eq!(mmu.translate(2, 0), Some(2));
        assert_eq!(mmu.stats().global().page_faults(), 4);

        // Page 0 was the first loaded, so it was the one evicted.
        assert_eq!(mmu.translate(0, 0), Some(1));
        assert_eq!(mmu.stats().global().page_faults(), 5);
    }

    #[test]
    fn two_frames_fault_on_every_step_of_a_cycling_workload() {
        let mmu = engine(4, 2, 2);

        assert_eq!(mmu.translate(0, 0), Some(0));
        assert_eq!(mmu.translate(1, 0), Some(1));
        // Page 2 takes frame 0 and evicts page 0.
        assert_eq!(mmu.translate(2, 0), Some(0));
        // Page 0 is gone, so its fourth reference faults again and lands in
        // frame 1.
        assert_eq!(mmu.translate(0, 0), Some(1));

        let global = mmu.stats().global();
        assert_eq!(global.total_references(), 4);
        assert_eq!(global.tlb_misses(), 4);
        assert_eq!(global.page_faults(), 4);
        assert_eq!(global.disk_accesses(), 4);

        let process = mmu.stats().process(0).unwrap();
        assert_eq!(process.page_references(), 4);
        assert_eq!(process.page_faults(), 4);

        // Page 2 kept its frame through the final eviction.
        assert_eq!(mmu.translate(2, 0), Some(0));
        assert_eq!(global.page_faults(), 4);
    }

    #[test]
    fn a_stale_tlb_entry_survives_eviction() {
        // TLB large enough that page 0's slot is never overwritten.
        let mmu = engine(4, 2, 4);

        assert_eq!(mmu.translate(0, 0), Some(0));
        assert_eq!(mmu.translate(1, 0), Some(1));
        // Page 2 evicts page 0 from frame 0; the TLB slot for page 0 stays.
        assert_eq!(mmu.translate(2, 0), Some(0));

        // The stale slot still answers for page 0 even though the page
        // table no longer maps it, and no fault is recorded.
        assert_eq!(mmu.translate(0, 0), Some(0));
        assert_eq!(mmu.stats().global().page_faults(), 3);
    }

    #[test]
    fn the_tables_stay_mutual_inverses() {
        let mmu = engine(16, 4, 4);

        for step in 0..100 {
            mmu.translate((step * 11 + 2) % 16, 0);
        }

        let tables = mmu.tables.lock().unwrap();
        for (page_number, frame) in tables.page_table.iter().enumerate() {
            if let Some(frame_number) = frame {
                assert_eq!(tables.inverted.resident(frame_number), Some(page_number));
            }
        }
    }

    #[test]
    fn ratios_stay_within_bounds() {
        let mmu = engine(16, 4, 4);

        let global = mmu.stats().global();
        assert_eq!(global.tlb_miss_ratio(), 0.0);
        assert_eq!(global.page_fault_ratio(), 0.0);

        for step in 0..50 {
            mmu.translate((step * 3) % 16, 0);
        }

        let process = mmu.stats().process(0).unwrap();
        for ratio in [
            global.tlb_miss_ratio(),
            global.page_fault_ratio(),
            process.tlb_miss_ratio(),
            process.page_fault_ratio(),
        ] {
            assert!((0.0..=1.0).contains(&ratio));
        }
    }

    #[test]
    fn each_process_is_accounted_separately() {
        let mmu = engine(8, 4, 4);

        mmu.translate(0, 0);
        mmu.translate(0, 1);
        mmu.translate(1, 1);

        let first = mmu.stats().process(0).unwrap();
        let second = mmu.stats().process(1).unwrap();
        assert_eq!(first.page_references(), 1);
        assert_eq!(first.page_faults(), 1);
        assert_eq!(second.page_references(), 2);
        // Process 1's touch of page 0 resolved through the TLB.
        assert_eq!(second.page_faults(), 1);
        assert_eq!(mmu.stats().global().total_references(), 3);
    }

    #[test]
    fn concurrent_translations_lose_no_references() {
        let mmu = engine(64, 8, 8);
        let threads: u32 = 4;
        let steps: usize = 500;

        thread::scope(|scope| {
            for process_id in 0..threads {
                let mmu = &mmu;
                scope.spawn(move || {
                    for step in 0..steps {
                        let page_number = (step * 7 + process_id as usize * 13) % 64;
                        let frame_number = mmu.translate(page_number, process_id).unwrap();
                        assert!(frame_number < 8);
                    }
                });
            }
        });

        assert_eq!(
            mmu.stats().global().total_references(),
            u64::from(threads) * steps as u64
        );
        for (_, process) in mmu.stats().processes() {
            assert_eq!(process.page_references(), steps as u64);
        }
    }

    #[test]
    fn a_custom_allocation_policy_is_honored() {
        struct PinnedAllocator;

        impl FrameAllocator for PinnedAllocator {
            fn allocate(&mut self) -> usize {
                0
            }
        }

        let config = Config::new(8, 4, 1).unwrap();
        let mmu = Mmu::with_allocator(config, PinnedAllocator);

        assert_eq!(mmu.translate(2, 0), Some(0));
        assert_eq!(mmu.translate(5, 0), Some(0));
        // Page 2 was evicted from frame 0, so it faults again.
        assert_eq!(mmu.translate(2, 0), Some(0));
        assert_eq!(mmu.stats().global().page_faults(), 3);
    }

    #[test]
    fn render_state_lists_every_slot_and_page() {
        let mmu = engine(4, 2, 2);
        mmu.translate(2, 0);

        let rendered = mmu.render_state();
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[1], "The current state of the TLB:");
        assert_eq!(lines[2], "Page#:  2   -1  ");
        assert_eq!(lines[3], "Frame#: 0   -1  ");
        assert_eq!(lines[6], "Page#:  0   1   2   3   ");
        assert_eq!(lines[7], "Frame#: -1  -1  0   -1  ");
        assert_eq!(lines[8], "Valid:  0   0   1   0   ");
    }

    #[test]
    fn render_state_reads_without_mutating() {
        let mmu = engine(4, 2, 2);
        mmu.translate(1, 0);

        let first = mmu.render_state();
        let second = mmu.render_state();

        assert_eq!(first, second);
        assert_eq!(mmu.stats().global().total_references(), 1);
    }
}

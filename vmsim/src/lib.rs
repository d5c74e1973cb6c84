//! A simulator of hardware-assisted virtual-to-physical address
//! translation: a TLB with circular-FIFO replacement, a page table with its
//! inverted companion, and a FIFO frame allocator, shared by concurrent
//! logical processes and accounted per process and globally.

pub mod config;
pub mod frame_allocator;
pub mod mmu;
pub mod page_table;
pub mod stats;
pub mod tlb;
pub mod workload;

//! Translation lookaside buffer with circular-FIFO replacement.

/// One slot of the TLB. A slot with `valid == false` never matches a lookup.
#[derive(Copy, Clone, Debug, Default)]
pub struct TlbEntry {
    pub page_number: usize,
    pub frame_number: usize,
    pub valid: bool,
}

/// Fixed-capacity associative cache of page-to-frame mappings.
///
/// Insertion always targets the slot under a monotonically advancing
/// circular cursor, overwriting whatever was there (FIFO, not LRU). An
/// insertion for a page that is already cached does not purge the older
/// slot, so duplicate page numbers may transiently exist across valid
/// slots; lookups take the first valid match in slot order.
pub struct Tlb {
    entries: Vec<TlbEntry>,
    cursor: usize,
}

impl Tlb {
    /// A TLB with `size` slots, all invalid.
    pub fn new(size: usize) -> Self {
        Tlb {
            entries: vec![TlbEntry::default(); size],
            cursor: 0,
        }
    }

    /// Linear scan over all slots for a valid entry caching `page_number`.
    pub fn lookup(&self, page_number: usize) -> Option<usize> {
        self.entries
            .iter()
            .find(|entry| entry.valid && entry.page_number == page_number)
            .map(|entry| entry.frame_number)
    }

    /// Caches a mapping in the slot under the cursor and advances the
    /// cursor by one, wrapping at capacity.
    pub fn insert(&mut self, page_number: usize, frame_number: usize) {
        self.entries[self.cursor] = TlbEntry {
            page_number,
            frame_number,
            valid: true,
        };
        self.cursor = (self.cursor + 1) % self.entries.len();
    }

    /// All slots in slot order, for reporting.
    pub fn entries(&self) -> &[TlbEntry] {
        &self.entries
    }
}

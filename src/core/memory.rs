//! SparseMemory: a synthetic, page-mapped address space.
//!
//! Backs unit tests, benches and offline replays of memory dumps. Reads and
//! writes touching an unmapped page fail with `MemoryError::Unmapped`, which
//! is how this backend models the fault a live target would take.

use std::collections::BTreeMap;

use crate::core::address::Address;
use crate::core::address_space::{AddressSpace, MemoryError, ObjectAllocator};
use crate::core::profile::CarrierLayout;

/// Granularity of the backing store; unrelated to any target page size.
const CHUNK_SIZE: u64 = 0x1000;

/// Bytes reserved per simulated carrier object.
const CARRIER_STRIDE: u64 = 0x40;

/// Mode tag a freshly allocated simulated carrier starts with
/// (a view that owns a separate backing buffer object).
pub const SIMULATED_INITIAL_MODE: u32 = 2;

#[derive(Debug, Clone)]
struct CarrierHeap {
    next: Address,
    layout: CarrierLayout,
}

/// Sparse page-mapped memory.
#[derive(Debug, Clone, Default)]
pub struct SparseMemory {
    chunks: BTreeMap<u64, Box<[u8]>>,
    heap: Option<CarrierHeap>,
}

impl SparseMemory {
    /// Empty address space with nothing mapped and no carrier heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable `ObjectAllocator` support: carriers are carved from `base`
    /// upwards and initialised according to `layout`.
    pub fn with_carrier_heap(mut self, base: Address, layout: CarrierLayout) -> Self {
        self.heap = Some(CarrierHeap { next: base, layout });
        self
    }

    /// Map `len` zeroed bytes at `addr` (rounded out to chunk boundaries).
    /// Already mapped chunks keep their contents.
    pub fn map(&mut self, addr: Address, len: u64) {
        if len == 0 {
            return;
        }
        let first = addr.value / CHUNK_SIZE;
        let last = addr.value.saturating_add(len - 1) / CHUNK_SIZE;
        for idx in first..=last {
            self.chunks
                .entry(idx)
                .or_insert_with(|| vec![0u8; CHUNK_SIZE as usize].into_boxed_slice());
        }
    }

    /// Map and fill a region with `data`.
    pub fn map_bytes(&mut self, addr: Address, data: &[u8]) {
        self.map(addr, data.len() as u64);
        for (i, b) in data.iter().enumerate() {
            let a = addr.add(i as u64);
            if let Some(chunk) = self.chunks.get_mut(&(a.value / CHUNK_SIZE)) {
                chunk[(a.value % CHUNK_SIZE) as usize] = *b;
            }
        }
    }

    /// Whether the chunk containing `addr` is mapped.
    pub fn is_mapped(&self, addr: Address) -> bool {
        self.chunks.contains_key(&(addr.value / CHUNK_SIZE))
    }

    /// Total number of mapped bytes.
    pub fn mapped_size(&self) -> u64 {
        self.chunks.len() as u64 * CHUNK_SIZE
    }
}

impl AddressSpace for SparseMemory {
    fn read_into(&self, addr: Address, buf: &mut [u8]) -> Result<(), MemoryError> {
        let mut done = 0usize;
        while done < buf.len() {
            let cur = addr.add(done as u64);
            let chunk = self
                .chunks
                .get(&(cur.value / CHUNK_SIZE))
                .ok_or(MemoryError::Unmapped(cur))?;
            let off = (cur.value % CHUNK_SIZE) as usize;
            let n = (chunk.len() - off).min(buf.len() - done);
            buf[done..done + n].copy_from_slice(&chunk[off..off + n]);
            done += n;
        }
        Ok(())
    }

    fn write_bytes(&mut self, addr: Address, data: &[u8]) -> Result<(), MemoryError> {
        // Check the whole range first so a faulting write leaves memory untouched
        let mut probe = 0u64;
        while probe < data.len() as u64 {
            let cur = addr.add(probe);
            if !self.is_mapped(cur) {
                return Err(MemoryError::Unmapped(cur));
            }
            probe += CHUNK_SIZE - cur.value % CHUNK_SIZE;
        }
        let mut done = 0usize;
        while done < data.len() {
            let cur = addr.add(done as u64);
            let chunk = self
                .chunks
                .get_mut(&(cur.value / CHUNK_SIZE))
                .ok_or(MemoryError::Unmapped(cur))?;
            let off = (cur.value % CHUNK_SIZE) as usize;
            let n = (chunk.len() - off).min(data.len() - done);
            chunk[off..off + n].copy_from_slice(&data[done..done + n]);
            done += n;
        }
        Ok(())
    }
}

impl ObjectAllocator for SparseMemory {
    fn allocate_carrier(&mut self) -> Result<Address, MemoryError> {
        let heap = self
            .heap
            .clone()
            .ok_or_else(|| MemoryError::Allocation("no carrier heap configured".to_string()))?;

        // Object header followed by its own 1-byte backing store
        let object = heap.next;
        let backing = object.add(CARRIER_STRIDE - 8);
        self.map(object, CARRIER_STRIDE);

        let layout = heap.layout;
        self.write_pointer(object.add(layout.vector_offset), backing)?;
        self.write32(object.add(layout.length_offset), 1)?;
        self.write32(object.add(layout.mode_offset), SIMULATED_INITIAL_MODE)?;

        if let Some(h) = self.heap.as_mut() {
            h.next = object.add(CARRIER_STRIDE);
        }
        tracing::trace!(carrier = %object, "allocated carrier");
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_across_chunks() {
        let mut mem = SparseMemory::new();
        mem.map(Address::new(0x10000), 0x2000);
        let at = Address::new(0x10ffe);
        mem.write64(at, 0x1122_3344_5566_7788).unwrap();
        assert_eq!(mem.read64(at).unwrap(), 0x1122_3344_5566_7788);
        assert_eq!(mem.read8(Address::new(0x11000)).unwrap(), 0x66);
        assert_eq!(mem.read16(at).unwrap(), 0x7788);
        assert_eq!(mem.read32(at.add(4)).unwrap(), 0x1122_3344);
    }

    #[test]
    fn unmapped_reads_fault() {
        let mut mem = SparseMemory::new();
        mem.map_bytes(Address::new(0x1000), &[1, 2, 3, 4]);
        assert_eq!(
            mem.read32(Address::new(0x5000)),
            Err(MemoryError::Unmapped(Address::new(0x5000)))
        );
        // Straddling into an unmapped chunk
        assert_eq!(
            mem.read64(Address::new(0x1ffc)),
            Err(MemoryError::Unmapped(Address::new(0x2000)))
        );
    }

    #[test]
    fn faulting_write_is_not_partial() {
        let mut mem = SparseMemory::new();
        mem.map(Address::new(0x1000), 0x1000);
        let res = mem.write64(Address::new(0x1ffc), u64::MAX);
        assert!(res.is_err());
        assert_eq!(mem.read32(Address::new(0x1ffc)).unwrap(), 0);
    }

    #[test]
    fn map_bytes_preserves_neighbours() {
        let mut mem = SparseMemory::new();
        mem.map_bytes(Address::new(0x3000), &[0xaa; 4]);
        mem.map_bytes(Address::new(0x3004), &[0xbb; 4]);
        assert_eq!(mem.read64(Address::new(0x3000)).unwrap(), 0xbbbb_bbbb_aaaa_aaaa);
        assert_eq!(mem.mapped_size(), 0x1000);
    }

    #[test]
    fn carriers_are_distinct_and_initialised() {
        let layout = CarrierLayout::default();
        let mut mem =
            SparseMemory::new().with_carrier_heap(Address::new(0x7000_0000), layout);
        let a = mem.allocate_carrier().unwrap();
        let b = mem.allocate_carrier().unwrap();
        assert_ne!(a, b);
        assert_eq!(mem.read32(a.add(layout.length_offset)).unwrap(), 1);
        assert_eq!(
            mem.read32(a.add(layout.mode_offset)).unwrap(),
            SIMULATED_INITIAL_MODE
        );
        let backing = mem.read_pointer(a.add(layout.vector_offset)).unwrap();
        assert!(mem.is_mapped(backing));
    }

    #[test]
    fn allocation_requires_heap() {
        let mut mem = SparseMemory::new();
        assert!(matches!(
            mem.allocate_carrier(),
            Err(MemoryError::Allocation(_))
        ));
    }

    #[test]
    fn map_bytes_at_top_of_address_space() {
        let mut mem = SparseMemory::new();
        mem.map_bytes(Address::new(u64::MAX - 1), &[1, 2, 3, 4]);
        assert_eq!(mem.read8(Address::new(u64::MAX - 1)).unwrap(), 1);
        assert_eq!(mem.read8(Address::new(u64::MAX)).unwrap(), 2);
        // The wrapped tail lands in an unmapped chunk and is dropped
        assert!(!mem.is_mapped(Address::NULL));
    }
}

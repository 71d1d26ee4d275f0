//! SyscallTableScanner: recover syscall trampolines from a code region.
//!
//! Library wrappers around the kernel entry look like
//!
//! ```text
//! 48 C7 C0 xx xx xx xx    mov rax, imm32      ; syscall number
//! 49 89 CA                mov r10, rcx
//! 0F 05                   syscall
//! ```
//!
//! The scan is bounded in two steps. First the region is searched for the
//! ASCII marker `"rdlo"`, whose offset caps how far instructions are
//! examined. Then a forged view over the region is walked for the idiom.
//! After a match the walk resumes 12 bytes later, so an idiom starting
//! inside a previous match's bytes is never reported.

use std::collections::BTreeMap;

use memchr::memmem;
use serde::{Serialize, Serializer};
use tracing::{debug, trace};

use crate::analysis::view::ViewForger;
use crate::core::address::Address;
use crate::core::address_space::{AddressSpace, ObjectAllocator};
use crate::core::profile::CarrierLayout;
use crate::error::{ProbeError, Result};

/// Marker bounding the instruction scan.
pub const TEXT_END_MARKER: &[u8; 4] = b"rdlo";

/// The marker read as a little-endian u32.
pub const TEXT_END_MARKER_WORD: u32 = 0x6f6c_6472;

/// Length of the `mov rax, imm32; mov r10, rcx; syscall` idiom.
pub const SYSCALL_IDIOM_LEN: usize = 12;

const IDIOM_PREFIX: [u8; 3] = [0x48, 0xc7, 0xc0];
const IDIOM_SUFFIX: [u8; 5] = [0x49, 0x89, 0xca, 0x0f, 0x05];

/// Alignment no marker read crosses; the smallest page size of any target.
const MARKER_WINDOW: u64 = 0x1000;

/// Sparse syscall number to trampoline address map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyscallTable {
    entries: BTreeMap<u32, Address>,
}

impl SyscallTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a trampoline; a later insert for the same number wins.
    pub fn insert(&mut self, number: u32, address: Address) -> Option<Address> {
        self.entries.insert(number, address)
    }

    pub fn get(&self, number: u32) -> Option<Address> {
        self.entries.get(&number).copied()
    }

    pub fn contains(&self, number: u32) -> bool {
        self.entries.contains_key(&number)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending syscall number order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, Address)> + '_ {
        self.entries.iter().map(|(n, a)| (*n, *a))
    }

    /// JSON object mapping decimal syscall numbers to hex addresses.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Serialize for SyscallTable {
    fn serialize<Ser>(&self, serializer: Ser) -> std::result::Result<Ser::Ok, Ser::Error>
    where
        Ser: Serializer,
    {
        serializer.collect_map(
            self.entries
                .iter()
                .map(|(n, a)| (n.to_string(), format!("{:#x}", a.value))),
        )
    }
}

/// Scans code regions for syscall trampolines.
#[derive(Debug, Clone, Default)]
pub struct SyscallScanner {
    forger: ViewForger,
}

impl SyscallScanner {
    /// Scanner forging its views with `layout`.
    pub fn new(layout: CarrierLayout) -> Self {
        Self {
            forger: ViewForger::new(layout),
        }
    }

    /// Populate `table` from the region at `region_base`, examining at most
    /// `max_search_size` bytes. Returns the number of idioms matched.
    ///
    /// If the marker is missing, or any read fails, `table` is left as it was.
    pub fn scan<M>(
        &self,
        mem: &mut M,
        table: &mut SyscallTable,
        region_base: Address,
        max_search_size: u64,
    ) -> Result<usize>
    where
        M: AddressSpace + ObjectAllocator,
    {
        if max_search_size > u32::MAX as u64 {
            return Err(ProbeError::InvalidInput(format!(
                "max_search_size {:#x} too large for a single view",
                max_search_size
            )));
        }

        let _span = crate::span_trace!("scan_syscalls", region = %region_base).entered();
        let text_size = find_marker(mem, region_base, max_search_size)?.ok_or_else(|| {
            crate::log_error!(ProbeError::MarkerNotFound {
                marker: String::from_utf8_lossy(TEXT_END_MARKER).into_owned(),
                searched: max_search_size,
            })
        })?;
        debug!(%region_base, text_size, "text bounded by marker");

        let view = self.forger.forge(mem, region_base, max_search_size)?;
        let wanted = (text_size + SYSCALL_IDIOM_LEN as u64 - 1).min(max_search_size);
        let code = view.read_bytes(mem, 0, wanted as usize)?;

        let found = match_idioms(&code, text_size as usize);
        for (offset, number) in &found {
            let at = region_base.add(*offset as u64);
            trace!(number, address = %at, "syscall trampoline");
            table.insert(*number, at);
        }
        debug!(matches = found.len(), entries = table.len(), "syscall scan done");
        Ok(found.len())
    }
}

/// Scan with an explicit carrier layout.
pub fn scan_syscalls<M>(
    mem: &mut M,
    layout: CarrierLayout,
    table: &mut SyscallTable,
    region_base: Address,
    max_search_size: u64,
) -> Result<usize>
where
    M: AddressSpace + ObjectAllocator,
{
    SyscallScanner::new(layout).scan(mem, table, region_base, max_search_size)
}

/// Offset of the first marker occurrence whose 4 bytes lie in `[0, limit)`.
///
/// Windows end at `MARKER_WINDOW` boundaries, so nothing past the page
/// holding the first match is read. A marker straddling a boundary is
/// checked word by word at the window tail.
fn find_marker<S: AddressSpace>(space: &S, base: Address, limit: u64) -> Result<Option<u64>> {
    let finder = memmem::Finder::new(TEXT_END_MARKER);
    let width = TEXT_END_MARKER.len() as u64;
    let mut pos = 0u64;
    while pos + width <= limit {
        let here = base.add(pos);
        let boundary = here.align_down(MARKER_WINDOW).add(MARKER_WINDOW);
        let end = (pos + boundary.value.wrapping_sub(here.value)).min(limit);

        let window = space.read_bytes(here, (end - pos) as usize)?;
        if let Some(i) = finder.find(&window) {
            return Ok(Some(pos + i as u64));
        }
        for at in end.saturating_sub(width - 1).max(pos)..end {
            if at + width > limit {
                break;
            }
            if space.read32(base.add(at))? == TEXT_END_MARKER_WORD {
                return Ok(Some(at));
            }
        }
        pos = end;
    }
    Ok(None)
}

/// Non-overlapping idiom matches starting before `text_size`, as
/// `(offset, syscall number)`. A match must fit entirely inside `code`.
fn match_idioms(code: &[u8], text_size: usize) -> Vec<(usize, u32)> {
    let text_size = text_size.min(code.len());
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < text_size {
        let Some(rel) = memchr::memchr(IDIOM_PREFIX[0], &code[i..text_size]) else {
            break;
        };
        let at = i + rel;
        match decode_idiom(&code[at..]) {
            Some(number) => {
                out.push((at, number));
                i = at + SYSCALL_IDIOM_LEN;
            }
            None => i = at + 1,
        }
    }
    out
}

fn decode_idiom(bytes: &[u8]) -> Option<u32> {
    if bytes.len() < SYSCALL_IDIOM_LEN
        || bytes[..3] != IDIOM_PREFIX
        || bytes[7..SYSCALL_IDIOM_LEN] != IDIOM_SUFFIX
    {
        return None;
    }
    Some(u32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]))
}

//! SegmentLocator: find a loaded segment's base by its leading bytes.
//!
//! Starting from the page that contains a known-good address, pages are
//! probed one at a time in the requested direction until the first 16 bytes
//! of a page equal the active signature for the wanted segment kind.
//!
//! By default there is no iteration bound: the search either succeeds or
//! runs into unmapped memory, at which point the address space's fault is
//! returned as-is. Callers that cannot rely on layout knowledge may opt in
//! to a page budget with [`SegmentLocator::max_pages`]; exhausting it yields
//! `ProbeError::SegmentNotFound`.

use tracing::{debug, trace};

use crate::core::address::Address;
use crate::core::address_space::AddressSpace;
use crate::core::profile::{validate_page_size, Direction, SegmentKind, TargetProfile};
use crate::error::{ProbeError, Result};

/// Page-walking search for segment signatures.
pub struct SegmentLocator<'a, S: AddressSpace> {
    space: &'a S,
    profile: &'a TargetProfile,
    max_pages: Option<u64>,
}

impl<'a, S: AddressSpace> SegmentLocator<'a, S> {
    /// Locator over `space`; fails if the profile's page size is unusable.
    pub fn new(space: &'a S, profile: &'a TargetProfile) -> Result<Self> {
        validate_page_size(profile.page_size)?;
        Ok(Self {
            space,
            profile,
            max_pages: None,
        })
    }

    /// Limit the number of pages probed. `None` (the default) searches
    /// until a match or a fault.
    pub fn max_pages(mut self, limit: Option<u64>) -> Self {
        self.max_pages = limit;
        self
    }

    /// Return the page-aligned base of the first matching page at or
    /// beyond the page containing `address`, walking in `direction`.
    pub fn find(
        &self,
        address: Address,
        kind: SegmentKind,
        direction: Direction,
    ) -> Result<Address> {
        let page_size = self.profile.page_size;
        let signature = self.profile.signatures.get(kind);
        let step = direction.step(page_size);

        let _span = crate::span_trace!("find_segment_base", %kind).entered();
        let mut candidate = address.align_down(page_size);
        let mut probed = 0u64;
        debug!(start = %candidate, %kind, ?direction, "segment search");

        loop {
            if let Some(limit) = self.max_pages {
                if probed >= limit {
                    return Err(crate::log_error!(ProbeError::SegmentNotFound {
                        kind,
                        pages: probed
                    }));
                }
            }

            let first = self.space.read64(candidate)?;
            let second = self.space.read64(candidate.add(8))?;
            if signature.matches(first, second) {
                debug!(base = %candidate, pages = probed, %kind, "segment found");
                return Ok(candidate);
            }

            trace!(page = %candidate, "no signature");
            probed += 1;
            candidate = candidate.offset(step);
        }
    }
}

/// Find a segment base with no page budget.
pub fn find_segment_base<S: AddressSpace>(
    space: &S,
    profile: &TargetProfile,
    address: Address,
    kind: SegmentKind,
    direction: Direction,
) -> Result<Address> {
    SegmentLocator::new(space, profile)?.find(address, kind, direction)
}

//! ViewForger: fake buffer views over arbitrary remote memory.
//!
//! A fresh 1-byte view object is allocated in the host runtime purely as a
//! carrier. Its backing pointer, length and mode tag are then overwritten
//! through the address space so the runtime treats it as a view over the
//! caller's `(address, size)` range with no separate backing buffer.
//!
//! The resulting `ForgedView` is a handle, not a slice: every access goes
//! through explicit calls on an `AddressSpace`, resolving the carrier's
//! fields the same way the host runtime does. Sizes are the caller's
//! responsibility; indexing inside `size` but outside mapped memory fails
//! with whatever the address space reports.

use tracing::debug;

use crate::core::address::Address;
use crate::core::address_space::{AddressSpace, ObjectAllocator};
use crate::core::profile::CarrierLayout;
use crate::error::{ProbeError, Result};

/// Builds forged views according to a carrier layout.
#[derive(Debug, Clone, Default)]
pub struct ViewForger {
    layout: CarrierLayout,
}

impl ViewForger {
    /// Forger writing carrier fields at the offsets in `layout`.
    pub fn new(layout: CarrierLayout) -> Self {
        Self { layout }
    }

    /// Carrier layout in use.
    pub fn layout(&self) -> &CarrierLayout {
        &self.layout
    }

    /// Forge a view over `size` bytes starting at `address`.
    ///
    /// Each call allocates its own carrier, so two forged views never alias
    /// one carrier object.
    pub fn forge<M>(&self, mem: &mut M, address: Address, size: u64) -> Result<ForgedView>
    where
        M: AddressSpace + ObjectAllocator,
    {
        let length = u32::try_from(size).map_err(|_| {
            ProbeError::InvalidInput(format!(
                "view size {:#x} exceeds the 32-bit length field",
                size
            ))
        })?;

        let carrier = mem.allocate_carrier()?;
        let l = &self.layout;
        mem.write_pointer(carrier.add(l.vector_offset), address)?;
        mem.write32(carrier.add(l.length_offset), length)?;
        mem.write32(carrier.add(l.mode_offset), l.fast_mode)?;

        debug!(carrier = %carrier, target = %address, size, "forged view");
        Ok(ForgedView {
            carrier,
            layout: self.layout,
        })
    }
}

/// Forge a view with an explicit layout.
pub fn forge_view<M>(
    mem: &mut M,
    layout: CarrierLayout,
    address: Address,
    size: u64,
) -> Result<ForgedView>
where
    M: AddressSpace + ObjectAllocator,
{
    ViewForger::new(layout).forge(mem, address, size)
}

/// Handle to a carrier object whose fields were overwritten by
/// `ViewForger::forge`.
#[derive(Debug)]
pub struct ForgedView {
    carrier: Address,
    layout: CarrierLayout,
}

impl ForgedView {
    /// Address of the carrier object itself.
    pub fn carrier(&self) -> Address {
        self.carrier
    }

    /// Current backing pointer of the carrier.
    pub fn backing_address<S: AddressSpace>(&self, space: &S) -> Result<Address> {
        Ok(space.read_pointer(self.carrier.add(self.layout.vector_offset))?)
    }

    /// Current length of the carrier.
    pub fn len<S: AddressSpace>(&self, space: &S) -> Result<u64> {
        Ok(space.read32(self.carrier.add(self.layout.length_offset))? as u64)
    }

    /// Whether the carrier's length field is zero.
    pub fn is_empty<S: AddressSpace>(&self, space: &S) -> Result<bool> {
        Ok(self.len(space)? == 0)
    }

    /// Resolve `[index, index + count)` to a remote address.
    fn resolve<S: AddressSpace>(&self, space: &S, index: u64, count: u64) -> Result<Address> {
        let len = self.len(space)?;
        match index.checked_add(count) {
            Some(end) if end <= len => Ok(self.backing_address(space)?.add(index)),
            _ => Err(ProbeError::ViewOutOfBounds { index, len }),
        }
    }

    /// Byte at `index`.
    pub fn get<S: AddressSpace>(&self, space: &S, index: u64) -> Result<u8> {
        let at = self.resolve(space, index, 1)?;
        Ok(space.read8(at)?)
    }

    /// Overwrite the byte at `index`.
    pub fn set<S: AddressSpace>(&self, space: &mut S, index: u64, value: u8) -> Result<()> {
        let at = self.resolve(space, index, 1)?;
        Ok(space.write8(at, value)?)
    }

    /// Little-endian u32 at byte `index`.
    pub fn read_u32<S: AddressSpace>(&self, space: &S, index: u64) -> Result<u32> {
        let at = self.resolve(space, index, 4)?;
        Ok(space.read32(at)?)
    }

    /// Little-endian u64 at byte `index`.
    pub fn read_u64<S: AddressSpace>(&self, space: &S, index: u64) -> Result<u64> {
        let at = self.resolve(space, index, 8)?;
        Ok(space.read64(at)?)
    }

    /// `count` bytes starting at `index`.
    pub fn read_bytes<S: AddressSpace>(
        &self,
        space: &S,
        index: u64,
        count: usize,
    ) -> Result<Vec<u8>> {
        let at = self.resolve(space, index, count as u64)?;
        Ok(space.read_bytes(at, count)?)
    }

    /// Write `data` starting at `index`; the whole range must lie in the view.
    pub fn write_bytes<S: AddressSpace>(
        &self,
        space: &mut S,
        index: u64,
        data: &[u8],
    ) -> Result<()> {
        let at = self.resolve(space, index, data.len() as u64)?;
        Ok(space.write_bytes(at, data)?)
    }

    /// Copy the whole view out.
    pub fn to_vec<S: AddressSpace>(&self, space: &S) -> Result<Vec<u8>> {
        let len = self.len(space)?;
        self.read_bytes(space, 0, len as usize)
    }
}

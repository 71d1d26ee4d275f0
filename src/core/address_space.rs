//! AddressSpace: byte-granular access to a remote process's memory.
//!
//! This is the seam between the toolkit and whatever read/write primitive a
//! driver has established. Implementations only need to provide raw byte
//! reads and writes; word-sized accessors are derived from them and are
//! always little-endian.

use crate::core::address::Address;

/// Errors raised by an address space implementation.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("unmapped address: {0}")]
    Unmapped(Address),
    #[error("access fault at {address}: {reason}")]
    Fault { address: Address, reason: String },
    #[error("object allocation failed: {0}")]
    Allocation(String),
}

/// Byte-granular read/write access relative to 64-bit addresses.
pub trait AddressSpace {
    /// Fill `buf` with the bytes starting at `addr`.
    fn read_into(&self, addr: Address, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Write `data` starting at `addr`.
    fn write_bytes(&mut self, addr: Address, data: &[u8]) -> Result<(), MemoryError>;

    /// Read `len` bytes starting at `addr`.
    fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>, MemoryError> {
        let mut buf = vec![0u8; len];
        self.read_into(addr, &mut buf)?;
        Ok(buf)
    }

    fn read8(&self, addr: Address) -> Result<u8, MemoryError> {
        let mut b = [0u8; 1];
        self.read_into(addr, &mut b)?;
        Ok(b[0])
    }

    fn read16(&self, addr: Address) -> Result<u16, MemoryError> {
        let mut b = [0u8; 2];
        self.read_into(addr, &mut b)?;
        Ok(u16::from_le_bytes(b))
    }

    fn read32(&self, addr: Address) -> Result<u32, MemoryError> {
        let mut b = [0u8; 4];
        self.read_into(addr, &mut b)?;
        Ok(u32::from_le_bytes(b))
    }

    fn read64(&self, addr: Address) -> Result<u64, MemoryError> {
        let mut b = [0u8; 8];
        self.read_into(addr, &mut b)?;
        Ok(u64::from_le_bytes(b))
    }

    /// Read a pointer-sized value and return it as an `Address`.
    fn read_pointer(&self, addr: Address) -> Result<Address, MemoryError> {
        self.read64(addr).map(Address::new)
    }

    fn write8(&mut self, addr: Address, value: u8) -> Result<(), MemoryError> {
        self.write_bytes(addr, &[value])
    }

    fn write16(&mut self, addr: Address, value: u16) -> Result<(), MemoryError> {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    fn write32(&mut self, addr: Address, value: u32) -> Result<(), MemoryError> {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    fn write64(&mut self, addr: Address, value: u64) -> Result<(), MemoryError> {
        self.write_bytes(addr, &value.to_le_bytes())
    }

    fn write_pointer(&mut self, addr: Address, value: Address) -> Result<(), MemoryError> {
        self.write64(addr, value.value)
    }
}

/// Host-runtime capability used to obtain throwaway view objects.
///
/// `allocate_carrier` creates a fresh minimal (1-byte) buffer view in the
/// host runtime and returns the address of its internal representation,
/// i.e. what `addressOf` yields for that object. Each call must return a
/// distinct, never before returned object.
pub trait ObjectAllocator {
    fn allocate_carrier(&mut self) -> Result<Address, MemoryError>;
}

/// Sign-extend a 32-bit instruction displacement to 64 bits.
pub const fn sign_extend_disp32(disp: u32) -> i64 {
    disp as i32 as i64
}

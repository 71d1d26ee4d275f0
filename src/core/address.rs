//! Address type for remote memory locations.
//!
//! An `Address` is a plain 64-bit value naming a location in an externally
//! accessed address space. It is never dereferenced locally; all arithmetic
//! is exact 64-bit integer arithmetic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A location in a remote address space.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Address {
    /// The numeric value of the address
    pub value: u64,
}

impl Address {
    /// The null address.
    pub const NULL: Address = Address { value: 0 };

    /// Create a new Address from a 64-bit value.
    pub const fn new(value: u64) -> Self {
        Self { value }
    }

    /// Create an Address from its low and high 32-bit halves.
    pub const fn from_parts(low: u32, high: u32) -> Self {
        Self {
            value: ((high as u64) << 32) | low as u64,
        }
    }

    /// Low 32 bits.
    pub const fn low(&self) -> u32 {
        self.value as u32
    }

    /// High 32 bits.
    pub const fn high(&self) -> u32 {
        (self.value >> 32) as u32
    }

    /// Add a signed byte offset. Wraps at 64 bits.
    pub const fn offset(&self, delta: i64) -> Self {
        Self {
            value: self.value.wrapping_add_signed(delta),
        }
    }

    /// Add an unsigned byte offset. Wraps at 64 bits.
    pub const fn add(&self, delta: u64) -> Self {
        Self {
            value: self.value.wrapping_add(delta),
        }
    }

    /// Subtract an unsigned byte offset. Wraps at 64 bits.
    pub const fn sub(&self, delta: u64) -> Self {
        Self {
            value: self.value.wrapping_sub(delta),
        }
    }

    /// Round down to a multiple of `align`, which must be a power of two.
    pub const fn align_down(&self, align: u64) -> Self {
        Self {
            value: self.value & !(align - 1),
        }
    }

    /// Whether this address is a multiple of `align` (a power of two).
    pub const fn is_aligned(&self, align: u64) -> bool {
        self.value & (align - 1) == 0
    }

    /// True for address zero.
    pub const fn is_null(&self) -> bool {
        self.value == 0
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<Address> for u64 {
    fn from(addr: Address) -> Self {
        addr.value
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA:{:x}", self.value)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.value, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_roundtrip() {
        let addr = Address::from_parts(0xdead_beef, 0x0000_0009);
        assert_eq!(addr.value, 0x9_dead_beef);
        assert_eq!(addr.low(), 0xdead_beef);
        assert_eq!(addr.high(), 9);
    }

    #[test]
    fn test_precision_above_2_pow_53() {
        // Values a double cannot represent exactly
        let addr = Address::new((1u64 << 53) + 1);
        assert_eq!(addr.add(2).value, (1u64 << 53) + 3);
        assert_ne!(addr, Address::new(1u64 << 53));
    }

    #[test]
    fn test_signed_offset() {
        let addr = Address::new(0x9_0000_4000);
        assert_eq!(addr.offset(-0x4000).value, 0x9_0000_0000);
        assert_eq!(addr.offset(0x10).value, 0x9_0000_4010);
        // Borrow across the 32-bit boundary
        assert_eq!(addr.offset(-0x4001).high(), 8);
    }

    #[test]
    fn test_align_down() {
        let addr = Address::new(0x9_1234_5678);
        let page = addr.align_down(0x4000);
        assert_eq!(page.value, 0x9_1234_4000);
        assert!(page.is_aligned(0x4000));
        assert!(!addr.is_aligned(0x4000));
        assert_eq!(page.align_down(0x4000), page);
    }

    #[test]
    fn test_display() {
        assert_eq!(Address::new(0x401000).to_string(), "VA:401000");
        assert_eq!(format!("{:#x}", Address::new(0x10)), "0x10");
    }

    #[test]
    fn test_json_transparent() {
        let addr = Address::new(0x401000);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "4198400");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}

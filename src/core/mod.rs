//! Core data types for memprobe.
//!
//! The `Address` value type, the `AddressSpace` seam through which every
//! remote access flows, a synthetic page-mapped backend, and the per-build
//! target profile.

pub mod address;
pub mod address_space;
pub mod memory;
pub mod profile;

pub use address::Address;
pub use address_space::{AddressSpace, MemoryError, ObjectAllocator};
pub use memory::SparseMemory;
pub use profile::{CarrierLayout, Direction, MagicSignature, SegmentKind, SignatureSet, TargetProfile};

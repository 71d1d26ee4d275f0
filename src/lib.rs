//! memprobe: memory introspection over an established read/write primitive.
//!
//! Given an `AddressSpace` implementation for a remote process, the crate
//! forges buffer views over arbitrary ranges, finds segment bases by their
//! leading bytes, resolves `jmp [rip+disp32]` import stubs and recovers the
//! process's syscall trampoline table.

/// Core data types module
pub mod core;

/// Introspection operations
pub mod analysis;

pub mod error;
pub mod logging;

pub use crate::core::{Address, AddressSpace, ObjectAllocator, TargetProfile};
pub use crate::error::{ProbeError, Result};

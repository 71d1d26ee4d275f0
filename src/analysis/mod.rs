//! Memory introspection primitives.
//!
//! Four independent operations over an `AddressSpace`: forging buffer views
//! onto arbitrary memory, locating segment bases by signature, resolving
//! indirect-jump import stubs, and recovering syscall trampolines.

pub mod import;
pub mod segment;
pub mod syscall;
pub mod view;

pub use import::{decode_stub, resolve_import, resolve_imports, ImportStub};
pub use segment::{find_segment_base, SegmentLocator};
pub use syscall::{scan_syscalls, SyscallScanner, SyscallTable};
pub use view::{forge_view, ForgedView, ViewForger};

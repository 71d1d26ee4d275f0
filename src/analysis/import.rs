//! ImportResolver: chase PLT-style `jmp qword [rip + disp32]` stubs.
//!
//! Only the single fixed encoding `FF 25 <disp32>` is understood. The
//! displacement is relative to the end of the 6-byte instruction; the slot
//! it names holds the absolute target.

use serde::Serialize;
use tracing::{trace, warn};

use crate::core::address::Address;
use crate::core::address_space::{sign_extend_disp32, AddressSpace};
use crate::error::{ProbeError, Result};

/// `FF 25` read as a little-endian halfword.
pub const JMP_RIP_OPCODE: u16 = 0x25ff;

/// Encoded length of `jmp qword [rip + disp32]`.
pub const JMP_RIP_LEN: u64 = 6;

/// A decoded indirect-jump stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportStub {
    /// Address of the stub instruction
    pub stub: Address,
    /// Sign-extended displacement
    pub displacement: i64,
    /// Address of the pointer slot the stub jumps through
    pub slot: Address,
    /// Pointer value read from the slot
    pub target: Address,
}

/// Decode the stub at `stub` and read its jump slot.
pub fn decode_stub<S: AddressSpace>(space: &S, stub: Address) -> Result<ImportStub> {
    let opcode = space.read16(stub)?;
    if opcode != JMP_RIP_OPCODE {
        warn!(%stub, found = opcode, "not a jmp [rip+disp32] stub");
        return Err(ProbeError::Decode {
            address: stub,
            found: opcode,
        });
    }

    let displacement = sign_extend_disp32(space.read32(stub.add(2))?);
    let slot = stub.add(JMP_RIP_LEN).offset(displacement);
    let target = space.read_pointer(slot)?;
    trace!(%stub, %slot, %target, "resolved import stub");

    Ok(ImportStub {
        stub,
        displacement,
        slot,
        target,
    })
}

/// Resolve the absolute address a stub jumps to.
pub fn resolve_import<S: AddressSpace>(space: &S, stub: Address) -> Result<Address> {
    decode_stub(space, stub).map(|s| s.target)
}

/// Resolve `count` consecutive stubs spaced `stride` bytes apart,
/// stopping at the first one that fails to decode.
pub fn resolve_imports<S: AddressSpace>(
    space: &S,
    first: Address,
    stride: u64,
    count: usize,
) -> Result<Vec<ImportStub>> {
    if stride < JMP_RIP_LEN {
        return Err(ProbeError::InvalidInput(format!(
            "stub stride {:#x} shorter than the instruction",
            stride
        )));
    }
    let span = stride.checked_mul(count as u64).ok_or_else(|| {
        ProbeError::InvalidInput(format!(
            "{} stubs of stride {:#x} overflow the address space",
            count, stride
        ))
    })?;
    if first.value.checked_add(span).is_none() {
        return Err(ProbeError::InvalidInput(format!(
            "stub table at {} spanning {:#x} bytes wraps the address space",
            first, span
        )));
    }
    (0..count as u64)
        .map(|i| decode_stub(space, first.add(i * stride)))
        .collect()
}

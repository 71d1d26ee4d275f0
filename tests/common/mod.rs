//! Shared builders for synthetic target processes.

#![allow(dead_code)]

use memprobe::core::memory::SparseMemory;
use memprobe::core::profile::{CarrierLayout, MagicSignature, SignatureSet, TargetProfile};
use memprobe::Address;

/// Where simulated carrier objects are allocated.
pub const CARRIER_HEAP: u64 = 0x2_0000_0000;

/// Page size used by the synthetic targets.
pub const PAGE: u64 = 0x4000;

/// `mov rax, imm32; mov r10, rcx; syscall`
pub fn syscall_idiom(number: u32) -> Vec<u8> {
    let mut v = vec![0x48, 0xc7, 0xc0];
    v.extend_from_slice(&number.to_le_bytes());
    v.extend_from_slice(&[0x49, 0x89, 0xca, 0x0f, 0x05]);
    v
}

/// `jmp qword [rip + disp32]`
pub fn jmp_stub(disp: i32) -> Vec<u8> {
    let mut v = vec![0xff, 0x25];
    v.extend_from_slice(&disp.to_le_bytes());
    v
}

/// Empty memory with a carrier heap using the default layout.
pub fn target_memory() -> SparseMemory {
    SparseMemory::new().with_carrier_heap(Address::new(CARRIER_HEAP), CarrierLayout::default())
}

pub fn test_profile() -> TargetProfile {
    TargetProfile::new(
        "synthetic",
        SignatureSet {
            code: MagicSignature::from_hex("7f454c4602010109000000000000000a").unwrap(),
            data: MagicSignature::from_hex("00000000000000000000000000000001").unwrap(),
        },
    )
}

/// Code bytes of `len` with the given chunks written at their offsets.
pub fn region_bytes(len: usize, chunks: &[(usize, &[u8])]) -> Vec<u8> {
    let mut out = vec![0xccu8; len];
    for (offset, bytes) in chunks {
        out[*offset..*offset + bytes.len()].copy_from_slice(bytes);
    }
    out
}

mod common;

use common::{jmp_stub, target_memory};
use memprobe::analysis::import::{decode_stub, resolve_import};
use memprobe::{Address, AddressSpace, ProbeError};

const STUB: u64 = 0x8_0040_0000;

#[test]
fn resolves_documented_stub() {
    let mut mem = target_memory();
    mem.map(Address::new(STUB), 0x1000);
    mem.write_bytes(Address::new(STUB), &[0xff, 0x25, 0x10, 0x00, 0x00, 0x00])
        .unwrap();
    // Slot is relative to the end of the 6-byte instruction
    mem.write64(Address::new(STUB + 6 + 0x10), 0x9_2233_4455)
        .unwrap();

    assert_eq!(
        resolve_import(&mem, Address::new(STUB)).unwrap(),
        Address::new(0x9_2233_4455)
    );
}

#[test]
fn slot_below_stub() {
    let mut mem = target_memory();
    mem.map(Address::new(STUB - 0x1000), 0x2000);
    mem.write_bytes(Address::new(STUB), &jmp_stub(-0x806)).unwrap();
    mem.write64(Address::new(STUB - 0x800), 0xffff_8000_0000_1000)
        .unwrap();

    let stub = decode_stub(&mem, Address::new(STUB)).unwrap();
    assert_eq!(stub.slot, Address::new(STUB - 0x800));
    assert_eq!(stub.target.value, 0xffff_8000_0000_1000);
}

#[test]
fn every_other_leading_pair_is_rejected() {
    let mut mem = target_memory();
    mem.map(Address::new(STUB), 0x1000);
    for first in 0..=255u8 {
        for second in [0x00u8, 0x15, 0x24, 0x25, 0x26, 0xff] {
            if (first, second) == (0xff, 0x25) {
                continue;
            }
            mem.write_bytes(Address::new(STUB), &[first, second]).unwrap();
            assert!(
                matches!(
                    resolve_import(&mem, Address::new(STUB)),
                    Err(ProbeError::Decode { address, .. }) if address == Address::new(STUB)
                ),
                "accepted {:02x} {:02x}",
                first,
                second
            );
        }
    }
}

#[test]
fn unreadable_slot_faults() {
    let mut mem = target_memory();
    mem.map(Address::new(STUB), 0x1000);
    mem.write_bytes(Address::new(STUB), &jmp_stub(0x10_0000)).unwrap();
    assert!(matches!(
        resolve_import(&mem, Address::new(STUB)),
        Err(ProbeError::Memory(_))
    ));
}

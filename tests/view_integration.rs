mod common;

use common::target_memory;
use memprobe::analysis::view::ViewForger;
use memprobe::core::profile::CarrierLayout;
use memprobe::{Address, AddressSpace};

const DATA: u64 = 0x9_4000_0000;

#[test]
fn forged_view_and_direct_access_agree() {
    let mut mem = target_memory();
    mem.map(Address::new(DATA), 0x1000);
    let target = Address::new(DATA + 0x28);
    let view = ViewForger::default().forge(&mut mem, target, 8).unwrap();

    view.write_bytes(&mut mem, 0, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    assert_eq!(mem.read64(target).unwrap(), 0x0807_0605_0403_0201);

    mem.write64(target, u64::MAX - 1).unwrap();
    assert_eq!(view.read_u64(&mem, 0).unwrap(), u64::MAX - 1);
}

#[test]
fn custom_layout_is_honoured() {
    let layout = CarrierLayout {
        vector_offset: 0x20,
        length_offset: 0x28,
        mode_offset: 0x2c,
        fast_mode: 7,
    };
    let mut mem = memprobe::core::memory::SparseMemory::new()
        .with_carrier_heap(Address::new(common::CARRIER_HEAP), layout);
    mem.map(Address::new(DATA), 0x1000);

    let view = ViewForger::new(layout)
        .forge(&mut mem, Address::new(DATA), 0x100)
        .unwrap();
    let c = view.carrier();
    assert_eq!(mem.read64(c.add(0x20)).unwrap(), DATA);
    assert_eq!(mem.read32(c.add(0x28)).unwrap(), 0x100);
    assert_eq!(mem.read32(c.add(0x2c)).unwrap(), 7);
    assert_eq!(view.to_vec(&mem).unwrap().len(), 0x100);
}

#[test]
fn view_tracks_carrier_fields() {
    // Re-pointing the carrier redirects the view, as the host runtime would
    let mut mem = target_memory();
    mem.map(Address::new(DATA), 0x2000);
    mem.write32(Address::new(DATA + 0x1000), 0xfeed_f00d).unwrap();
    let view = ViewForger::default()
        .forge(&mut mem, Address::new(DATA), 4)
        .unwrap();
    assert_eq!(view.read_u32(&mem, 0).unwrap(), 0);

    let layout = CarrierLayout::default();
    mem.write64(view.carrier().add(layout.vector_offset), DATA + 0x1000)
        .unwrap();
    assert_eq!(view.read_u32(&mem, 0).unwrap(), 0xfeed_f00d);
}

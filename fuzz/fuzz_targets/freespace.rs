#![no_main]

use libfuzzer_sys::fuzz_target;
use snespatch::{ByteRange, FreeSpaceManager};

// Each 5-byte chunk is one operation: opcode, 16-bit offset, 16-bit length.
fuzz_target!(|data: &[u8]| {
    let mut space = FreeSpaceManager::new();
    if data.first().is_some_and(|b| b & 1 == 1) {
        space = space.with_bank_boundary(0x1000);
    }

    let mut allocated: Vec<ByteRange> = Vec::new();
    for op in data.chunks_exact(5) {
        let offset = u32::from(u16::from_le_bytes([op[1], op[2]]));
        let len = u32::from(u16::from_le_bytes([op[3], op[4]])) % 0x400 + 1;

        match op[0] % 3 {
            0 => {
                if let Ok(range) = ByteRange::from_len(offset, len) {
                    space.mark_free(range);
                    allocated.retain(|used| !used.overlaps(&range));
                }
            }
            1 => {
                let hint = (op[0] & 0x80 != 0).then_some(offset);
                if let Ok(addr) = space.get_free_addr(len, hint) {
                    let range = ByteRange::from_len(addr, len).unwrap();
                    space.mark_used(range).unwrap();
                    assert!(allocated.iter().all(|used| !used.overlaps(&range)));
                    if let Some(bank) = space.bank_boundary() {
                        assert_eq!(range.start() / bank, (range.end() - 1) / bank);
                    }
                    allocated.push(range);
                }
            }
            _ => {
                if let Ok(range) = ByteRange::from_len(offset, len) {
                    let was_free = space.is_free(&range);
                    assert_eq!(space.mark_used(range).is_ok(), was_free);
                }
            }
        }

        let ranges: Vec<ByteRange> = space.free_ranges().collect();
        for pair in ranges.windows(2) {
            assert!(pair[0].end() < pair[1].start());
        }
        for range in &ranges {
            assert!(allocated.iter().all(|used| !used.overlaps(range)));
        }
    }
});

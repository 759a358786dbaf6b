#![no_main]
use arbitrary::Arbitrary;
use cartridge_pagealloc::{MemoryPageSource, SectionAllocator, SectionDirectory};
use libfuzzer_sys::fuzz_target;
use std::collections::BTreeSet;

#[derive(Arbitrary, Debug)]
enum Op {
    Allocate(u16),
    Free(u16),
    FreeRaw(u32),
}

fuzz_target!(|ops: Vec<Op>| {
    let mut directory = SectionDirectory::new();
    let mut source = MemoryPageSource::with_capacity_limit(64 * 256);
    let mut allocator = SectionAllocator::new(&mut directory, &mut source);
    let mut live = BTreeSet::new();

    for op in ops {
        match op {
            Op::Allocate(nearby) => match allocator.allocate_single_page(nearby as u64) {
                Ok(page) => assert!(live.insert(page), "page {} handed out twice", page),
                Err(_) => return,
            },
            Op::Free(pick) => {
                if let Some(&page) = live.iter().nth(pick as usize % live.len().max(1)) {
                    allocator.free_page(page).unwrap();
                    live.remove(&page);
                }
            }
            Op::FreeRaw(page) => {
                // Arbitrary numbers either fail cleanly or free a tracked slot
                if allocator.free_page(page as u64).is_ok() {
                    live.remove(&(page as u64));
                }
            }
        }
    }

    for &page in &live {
        assert!(allocator.directory().is_allocated(page));
    }
});

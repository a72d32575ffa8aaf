#![no_main]

use libfuzzer_sys::fuzz_target;
use mokload::image::{load_sections, parse, relocate, PoolAllocator};

// SizeOfImage comes straight from the input
const MAX_IMAGE_SIZE: usize = 16 * 1024 * 1024;

fuzz_target!(|data: &[u8]| {
    let Ok(context) = parse(data) else {
        return;
    };

    let mut allocator = PoolAllocator::with_limit(MAX_IMAGE_SIZE);
    if let Ok(mut image) = load_sections(&context, data, &mut allocator) {
        let _ = relocate(&context, image.as_mut_slice(), 0x7F00_0000_0000);
    }
});

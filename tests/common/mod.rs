//! Shared helpers for the integration tests and benchmarks.
#![allow(dead_code)]

use std::cell::Cell;

use mokload::{
    image::{ImageAllocator, LoadedImageBuffer, RelocationType},
    platform::{EntryCall, ImageStarter, LoadedImageRecord, Status},
    Result,
};

pub const IMAGE_BASE: u64 = 0x1_4000_0000;
pub const TEXT_RVA: u32 = 0x1000;
pub const DATA_RVA: u32 = 0x2000;

const HEADERS_SIZE: u32 = 0x400;
const FILE_ALIGNMENT: u32 = 0x200;
const SECTION_ALIGNMENT: u32 = 0x1000;

fn align(value: u32, to: u32) -> u32 {
    value.div_ceil(to) * to
}

/// Relocation entry for `kind` at `offset` in its page.
pub fn entry(kind: RelocationType, offset: u16) -> u16 {
    ((kind as u16) << 12) | offset
}

/// A PE32+ image with `.text`, `.data` and `.reloc` sections.
///
/// `.text` always starts at [`TEXT_RVA`] and `.data` at [`DATA_RVA`] as long as the code fits
/// in one page.
#[derive(Debug, Clone)]
pub struct TestImage {
    pub image_base: u64,
    pub entry_point: u32,
    pub characteristics: u16,
    pub text: Vec<u8>,
    pub data: Vec<u8>,
    pub relocations: Vec<(u32, Vec<u16>)>,
}

impl Default for TestImage {
    fn default() -> Self {
        let mut data = vec![0u8; 0x100];
        data[0..8].copy_from_slice(&(IMAGE_BASE + 0x1000).to_le_bytes());
        data[0x10..0x14].copy_from_slice(&((IMAGE_BASE as u32) + 0x1800).to_le_bytes());

        TestImage {
            image_base: IMAGE_BASE,
            entry_point: TEXT_RVA,
            characteristics: 0x0022,
            // xor eax, eax; ret
            text: vec![0x31, 0xC0, 0xC3],
            data,
            relocations: vec![(
                DATA_RVA,
                vec![
                    entry(RelocationType::Dir64, 0x00),
                    entry(RelocationType::HighLow, 0x10),
                ],
            )],
        }
    }
}

impl TestImage {
    pub fn new() -> Self {
        Self::default()
    }

    fn relocation_table(&self) -> Vec<u8> {
        let mut table = Vec::new();
        for (page, entries) in &self.relocations {
            table.extend_from_slice(&page.to_le_bytes());
            table.extend_from_slice(&(8 + 2 * entries.len() as u32).to_le_bytes());
            for entry in entries {
                table.extend_from_slice(&entry.to_le_bytes());
            }
        }
        table
    }

    pub fn build(&self) -> Vec<u8> {
        let table = self.relocation_table();
        let reloc_len = table.len().max(1) as u32;

        let text_va = TEXT_RVA;
        let data_va = align(text_va + self.text.len() as u32, SECTION_ALIGNMENT);
        let reloc_va = align(data_va + self.data.len() as u32, SECTION_ALIGNMENT);
        let image_size = align(reloc_va + reloc_len, SECTION_ALIGNMENT);

        let text_ptr = HEADERS_SIZE;
        let data_ptr = text_ptr + align(self.text.len() as u32, FILE_ALIGNMENT);
        let reloc_ptr = data_ptr + align(self.data.len() as u32, FILE_ALIGNMENT);
        let file_size = reloc_ptr + align(reloc_len, FILE_ALIGNMENT);

        let mut file = vec![0u8; file_size as usize];
        let mut put = |offset: u32, bytes: &[u8]| {
            let offset = offset as usize;
            file[offset..offset + bytes.len()].copy_from_slice(bytes);
        };

        put(0, b"MZ");
        put(0x3C, &0x80u32.to_le_bytes());
        put(0x80, b"PE\0\0");

        put(0x84, &0x8664u16.to_le_bytes());
        put(0x86, &3u16.to_le_bytes());
        put(0x94, &240u16.to_le_bytes());
        put(0x96, &self.characteristics.to_le_bytes());

        let opt = 0x98;
        put(opt, &0x020Bu16.to_le_bytes());
        put(opt + 16, &self.entry_point.to_le_bytes());
        put(opt + 24, &self.image_base.to_le_bytes());
        put(opt + 32, &SECTION_ALIGNMENT.to_le_bytes());
        put(opt + 36, &FILE_ALIGNMENT.to_le_bytes());
        put(opt + 56, &image_size.to_le_bytes());
        put(opt + 60, &HEADERS_SIZE.to_le_bytes());
        put(opt + 68, &10u16.to_le_bytes());
        put(opt + 108, &16u32.to_le_bytes());
        if !table.is_empty() {
            put(opt + 112 + 5 * 8, &reloc_va.to_le_bytes());
            put(opt + 112 + 5 * 8 + 4, &(table.len() as u32).to_le_bytes());
        }

        let sections: [(&[u8; 8], u32, u32, u32, u32); 3] = [
            (b".text\0\0\0", self.text.len() as u32, text_va, text_ptr, 0x6000_0020),
            (b".data\0\0\0", self.data.len() as u32, data_va, data_ptr, 0xC000_0040),
            (b".reloc\0\0", reloc_len, reloc_va, reloc_ptr, 0x4200_0040),
        ];
        for (index, (name, size, va, ptr, flags)) in sections.iter().enumerate() {
            let header = opt + 240 + index as u32 * 40;
            put(header, *name);
            put(header + 8, &size.to_le_bytes());
            put(header + 12, &va.to_le_bytes());
            put(header + 16, &align(*size, FILE_ALIGNMENT).to_le_bytes());
            put(header + 20, &ptr.to_le_bytes());
            put(header + 36, &flags.to_le_bytes());
        }

        put(text_ptr, &self.text);
        put(data_ptr, &self.data);
        put(reloc_ptr, &table);

        file
    }
}

/// Heap allocator that counts allocations and releases.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    pub allocations: usize,
    pub releases: usize,
}

impl ImageAllocator for CountingAllocator {
    fn allocate(&mut self, size: usize) -> Result<LoadedImageBuffer> {
        self.allocations += 1;
        LoadedImageBuffer::zeroed(size)
    }

    fn release(&mut self, image: LoadedImageBuffer) {
        self.releases += 1;
        drop(image);
    }
}

/// Starter that snapshots what the child would see, then returns `exit`.
#[derive(Debug)]
pub struct SnapshotStarter {
    pub exit: Status,
    pub seen: Option<LoadedImageRecord>,
    pub entry_address: Option<u64>,
    pub code: Vec<u8>,
    pub calls: Cell<usize>,
}

impl SnapshotStarter {
    pub fn new(exit: Status) -> Self {
        SnapshotStarter {
            exit,
            seen: None,
            entry_address: None,
            code: Vec::new(),
            calls: Cell::new(0),
        }
    }
}

impl ImageStarter for SnapshotStarter {
    fn start(&mut self, call: &EntryCall<'_>) -> Status {
        self.calls.set(self.calls.get() + 1);
        self.seen = Some(*call.record);
        self.entry_address = Some(call.entry.address());
        // SAFETY: the launcher keeps the image alive and checked the entry point is inside it
        self.code =
            unsafe { std::slice::from_raw_parts(call.entry.address() as *const u8, 3) }.to_vec();
        self.exit
    }
}

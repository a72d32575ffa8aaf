//! Mock firmware capabilities.

use std::cell::Cell;

use widestring::U16CStr;

use crate::{
    image::{ImageAllocator, LoadedImageBuffer},
    platform::{EntryCall, EntryPoint, Handle, ImageStarter, LoadedImageRecord, Status, SystemTable},
    security::{Trust, Verifier},
    Error, Result,
};

/// Heap allocator that counts allocations and releases, optionally failing every request.
#[derive(Debug, Default)]
pub struct CountingAllocator {
    allocations: usize,
    releases: usize,
    failing: bool,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        CountingAllocator {
            failing: true,
            ..Self::default()
        }
    }

    pub fn allocations(&self) -> usize {
        self.allocations
    }

    pub fn releases(&self) -> usize {
        self.releases
    }
}

impl ImageAllocator for CountingAllocator {
    fn allocate(&mut self, size: usize) -> Result<LoadedImageBuffer> {
        if self.failing {
            return Err(Error::OutOfResources(size));
        }

        self.allocations += 1;
        LoadedImageBuffer::zeroed(size)
    }

    fn release(&mut self, image: LoadedImageBuffer) {
        self.releases += 1;
        drop(image);
    }
}

/// Verifier with a canned answer that counts how often it was asked.
#[derive(Debug)]
pub struct CountingVerifier {
    trust: Trust,
    calls: Cell<usize>,
}

impl CountingVerifier {
    pub fn new(trust: Trust) -> Self {
        CountingVerifier {
            trust,
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl Verifier for CountingVerifier {
    fn verify(&self, _image: &[u8]) -> Trust {
        self.calls.set(self.calls.get() + 1);
        self.trust
    }
}

/// What a [`RecordingStarter`] saw when it was asked to start an image.
#[derive(Debug, Clone)]
pub struct StartedImage {
    pub entry: EntryPoint,
    pub image_handle: Handle,
    pub system_table: SystemTable,
    pub record: LoadedImageRecord,
    pub load_options: String,
    pub entry_byte: u8,
}

/// Starter that records each call instead of jumping, and returns a fixed status.
#[derive(Debug)]
pub struct RecordingStarter {
    exit: Status,
    calls: Vec<StartedImage>,
}

impl RecordingStarter {
    pub fn new(exit: Status) -> Self {
        RecordingStarter {
            exit,
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[StartedImage] {
        &self.calls
    }
}

impl ImageStarter for RecordingStarter {
    fn start(&mut self, call: &EntryCall<'_>) -> Status {
        let record = *call.record;

        let load_options = if record.load_options.is_null() {
            String::new()
        } else {
            // The launcher keeps the options alive for the duration of the call
            unsafe { U16CStr::from_ptr_str(record.load_options.cast::<u16>()) }.to_string_lossy()
        };
        // The image buffer is alive and the entry point was checked to lie inside it
        let entry_byte = unsafe { *(call.entry.address() as *const u8) };

        self.calls.push(StartedImage {
            entry: call.entry,
            image_handle: call.image_handle,
            system_table: call.system_table,
            record,
            load_options,
            entry_byte,
        });

        self.exit
    }
}

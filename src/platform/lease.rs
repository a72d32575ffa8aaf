use std::ops::{Deref, DerefMut};

use super::LoadedImageRecord;

/// Exclusive, temporary write access to a [`LoadedImageRecord`].
///
/// Taking a lease snapshots the record. The holder may rewrite it freely through `DerefMut`; when
/// the lease is dropped the snapshot is written back, on every exit path including unwinding.
///
/// ```rust
/// use mokload::platform::{LoadedImageRecord, RecordLease};
///
/// let mut record = LoadedImageRecord::default();
/// {
///     let mut lease = RecordLease::take(&mut record);
///     lease.image_size = 0x4000;
///     assert_eq!(lease.saved().image_size, 0);
/// }
/// assert_eq!(record.image_size, 0);
/// ```
#[derive(Debug)]
pub struct RecordLease<'a> {
    record: &'a mut LoadedImageRecord,
    saved: LoadedImageRecord,
}

impl<'a> RecordLease<'a> {
    /// Snapshots `record` and leases it until the returned value is dropped.
    pub fn take(record: &'a mut LoadedImageRecord) -> Self {
        let saved = *record;
        RecordLease { record, saved }
    }

    /// The record as it was when the lease was taken.
    #[must_use]
    pub fn saved(&self) -> &LoadedImageRecord {
        &self.saved
    }
}

impl Deref for RecordLease<'_> {
    type Target = LoadedImageRecord;

    fn deref(&self) -> &LoadedImageRecord {
        self.record
    }
}

impl DerefMut for RecordLease<'_> {
    fn deref_mut(&mut self) -> &mut LoadedImageRecord {
        self.record
    }
}

impl Drop for RecordLease<'_> {
    fn drop(&mut self) {
        *self.record = self.saved;
        log::trace!("loaded image record restored");
    }
}

//! Record buffer.
//!
//! Append-only, strictly FIFO collection of records awaiting export. Producers
//! on any number of threads call [`RecordBuffer::process_record`]; a single
//! consumer reads everything back at flush time.
//!
//! Flushing requires producers to have quiesced. The buffer lock is held for
//! the whole flush, so a late append blocks until the flush is done and then
//! lands in the buffer without having been exported. Callers must not rely
//! on that: appending during a flush is a contract violation.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::Record;

#[derive(Debug, Default)]
pub struct RecordBuffer {
    records: Mutex<Vec<Record>>,
}

impl RecordBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a record. No deduplication and no size bound.
    pub fn process_record(&self, record: Record) {
        self.lock().push(record);
    }

    /// Run `f` over the buffered records in append order.
    pub fn with_records<R>(&self, f: impl FnOnce(&[Record]) -> R) -> R {
        let records = self.lock();
        f(&records)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

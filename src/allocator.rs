use crate::models::{Record, RecordId};

/// Next free id for a sequence: one past the largest id present, `1` when empty.
pub fn next_id<R: Record>(records: &[R]) -> RecordId {
    records.iter().map(|record| record.id()).max().map_or(1, |max| max + 1)
}

/// Hands out ids for one collection.
///
/// Seeded from whatever was loaded at startup and only ever moves forward,
/// so an id freed by a delete is not handed out again while the process runs.
#[derive(Debug, Clone)]
pub struct Allocator {
    next: RecordId,
}

impl Allocator {
    pub fn resume<R: Record>(records: &[R]) -> Self {
        Self {
            next: next_id(records),
        }
    }

    pub fn allocate(&mut self) -> RecordId {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn peek(&self) -> RecordId {
        self.next
    }
}

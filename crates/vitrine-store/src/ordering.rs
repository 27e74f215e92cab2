//! Ordering helpers shared by every collection.
//!
//! After any change to a collection's size or sequence, `order` is
//! renumbered so that it equals the record's 1-based position.

use serde::de::DeserializeOwned;
use serde::Serialize;

use vitrine_shared::{Background, Model, RecordId};

use crate::error::{Result, StoreError};

/// A record stored in a [`crate::JsonStore`].
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> RecordId;
    fn order(&self) -> i64;
    fn set_order(&mut self, order: i64);
}

impl Record for Model {
    fn id(&self) -> RecordId {
        self.id
    }
    fn order(&self) -> i64 {
        self.order
    }
    fn set_order(&mut self, order: i64) {
        self.order = order;
    }
}

impl Record for Background {
    fn id(&self) -> RecordId {
        self.id
    }
    fn order(&self) -> i64 {
        self.order
    }
    fn set_order(&mut self, order: i64) {
        self.order = order;
    }
}

/// `max(id) + 1`, or 1 for an empty collection.
pub fn next_id<T: Record>(records: &[T]) -> RecordId {
    records.iter().map(Record::id).max().map_or(1, |max| max + 1)
}

pub fn position_of<T: Record>(records: &[T], id: RecordId) -> Result<usize> {
    records
        .iter()
        .position(|r| r.id() == id)
        .ok_or(StoreError::NotFound(id))
}

/// Stable sort by `order`; records sharing an order keep their relative
/// positions.
pub fn sort_by_order<T: Record>(records: &mut [T]) {
    records.sort_by_key(Record::order);
}

/// Rewrite `order` to the dense sequence `1..=len`.
pub fn renumber<T: Record>(records: &mut [T]) {
    for (idx, record) in records.iter_mut().enumerate() {
        record.set_order(idx as i64 + 1);
    }
}

/// Move the record `id` to index `position` (clamped to the collection),
/// shifting the records in between by one, then renumber.
pub fn move_to<T: Record>(records: &mut Vec<T>, id: RecordId, position: i64) -> Result<()> {
    let from = position_of(records, id)?;
    let last = records.len() as i64 - 1;
    let to = position.clamp(0, last) as usize;

    let record = records.remove(from);
    records.insert(to, record);
    renumber(records);
    Ok(())
}

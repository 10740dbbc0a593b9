//! Join system records to field records by normalized connote.

use std::collections::HashMap;

use crate::model::{FieldRecord, SystemRecord};

/// A system record with its field-side counterpart, ready for geocoding and
/// classification.
#[derive(Debug, Clone)]
pub struct MatchedRecord {
    pub system: SystemRecord,
    pub field: FieldRecord,
}

/// The join partition. `matched` preserves system-input order; `unmatched`
/// records are terminal errors and never reach the geocoder.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub matched: Vec<MatchedRecord>,
    pub unmatched: Vec<SystemRecord>,
}

/// Index the field side once (O(n)), then scan system records in order with
/// O(1) lookups. Duplicate field connotes are last-write-wins — flagged in
/// the log, not silently merged.
pub fn reconcile(system: &[SystemRecord], field: &[FieldRecord]) -> Reconciliation {
    let mut index: HashMap<&str, &FieldRecord> = HashMap::with_capacity(field.len());
    let mut duplicates = 0usize;
    for record in field {
        if index.insert(record.connote.as_str(), record).is_some() {
            duplicates += 1;
        }
    }
    if duplicates > 0 {
        log::warn!("field dataset: {duplicates} duplicate connote(s), keeping the last occurrence");
    }

    let mut out = Reconciliation::default();
    for record in system {
        match index.get(record.connote.as_str()) {
            Some(field_record) => out.matched.push(MatchedRecord {
                system: record.clone(),
                field: (*field_record).clone(),
            }),
            None => out.unmatched.push(record.clone()),
        }
    }
    out
}

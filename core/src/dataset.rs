//! The fixed sample dataset and the results it must produce.

use std::collections::BTreeSet;

/// Column names of the sample table, in record field order.
pub const COLUMNS: [&str; 2] = ["ID", "Name"];

pub const ID_COLUMN: &str = COLUMNS[0];
pub const NAME_COLUMN: &str = COLUMNS[1];

/// A single row of the sample table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: i64,
    pub name: String,
}

impl Record {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A `(name, id)` pair as collected back from the engine.
pub type NameId = (String, i64);

/// The three literal records every run loads.
pub fn sample_records() -> Vec<Record> {
    vec![
        Record::new(1, "Alice"),
        Record::new(2, "Bob"),
        Record::new(3, "Charlie"),
    ]
}

/// What projecting `(Name, ID)` over the sample table must yield, as a set.
pub fn expected_pairs() -> BTreeSet<NameId> {
    sample_records()
        .into_iter()
        .map(|record| (record.name, record.id))
        .collect()
}

use std::sync::Arc;

use crate::encoding;
use crate::planner::{Access, Plan};
use crate::record::{ObjectRecord, Row};
use crate::table::BucketTable;

/// A lazily evaluated query over one bucket snapshot.
///
/// The cursor owns an immutable snapshot taken when the query started, so
/// writes acknowledged before that point are visible and later writes are
/// not. It is consumed as it iterates and cannot be restarted.
pub struct Cursor {
    table: Arc<BucketTable>,
    plan: Plan,
    index_prefix: Option<Vec<u8>>,
    position: Position,
    emitted: usize,
    exhausted: bool,
}

enum Position {
    Start,
    Row(String),
    IndexEntry(Vec<u8>),
}

impl Cursor {
    pub(crate) fn new(table: Arc<BucketTable>, plan: Plan) -> Self {
        let index_prefix = match &plan.access {
            Access::IndexEq { field, value } => Some(encoding::index_scan_prefix(field, value)),
            Access::Scan => None,
        };
        Self {
            table,
            plan,
            index_prefix,
            position: Position::Start,
            emitted: 0,
            exhausted: false,
        }
    }

    pub fn bucket(&self) -> &str {
        self.table.name()
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Advance to the next candidate row, matching or not.
    fn next_candidate(&mut self) -> Option<Row> {
        match &self.index_prefix {
            None => {
                let after = match &self.position {
                    Position::Row(k) => Some(k.as_str()),
                    _ => None,
                };
                let row = self.table.next_row(after)?.clone();
                self.position = Position::Row(row.key.clone());
                Some(row)
            }
            Some(prefix) => loop {
                let after = match &self.position {
                    Position::IndexEntry(k) => Some(k.as_slice()),
                    _ => None,
                };
                let (entry, key) = self.table.next_index_entry(prefix, after)?;
                let entry = entry.clone();
                let row = self.table.rows.get(key).cloned();
                self.position = Position::IndexEntry(entry);
                if let Some(row) = row {
                    return Some(row);
                }
            },
        }
    }
}

impl Iterator for Cursor {
    type Item = ObjectRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        if self.plan.limit.is_some_and(|limit| self.emitted >= limit) {
            self.exhausted = true;
            return None;
        }
        loop {
            let Some(row) = self.next_candidate() else {
                self.exhausted = true;
                return None;
            };
            if self.plan.predicate.matches(&row.value) {
                self.emitted += 1;
                return Some(row.to_record(self.table.name()));
            }
        }
    }
}

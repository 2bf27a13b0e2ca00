//! Filter-compatibility resolution.
//!
//! Decides, for every clause of a filter, how its literal is typed and
//! whether the index column can answer it:
//!
//! | field                       | literal type    | evaluated against         |
//! |-----------------------------|-----------------|---------------------------|
//! | declared, backfill complete | declared type   | index column (or raw)     |
//! | declared, backfill pending  | declared type   | raw value of every object |
//! | not declared                | untyped string  | raw value of every object |
//!
//! An untyped literal only equals stored strings, so a filter on an
//! undeclared boolean or number field matches nothing even when objects
//! with that value exist.

use bson::Document;
use shoal_query::{Filter, TypedValue};

use crate::bucket::{Bucket, IndexState};
use crate::error::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    Indexed,
    PendingReindex,
    Unindexed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedClause {
    pub field: String,
    pub value: TypedValue,
    pub class: FieldClass,
    pub unique: bool,
}

impl ResolvedClause {
    pub fn matches(&self, doc: &Document) -> bool {
        doc.get(&self.field).is_some_and(|v| self.value.matches(v))
    }
}

/// A filter whose literals have been typed against a bucket schema.
/// All clauses are ANDed.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFilter {
    pub clauses: Vec<ResolvedClause>,
}

impl ResolvedFilter {
    pub fn matches(&self, doc: &Document) -> bool {
        self.clauses.iter().all(|c| c.matches(doc))
    }
}

pub fn classify(bucket: &Bucket, field: &str) -> FieldClass {
    match bucket.field(field).map(|f| f.state) {
        Some(IndexState::Complete) => FieldClass::Indexed,
        Some(IndexState::PendingReindex) => FieldClass::PendingReindex,
        None => FieldClass::Unindexed,
    }
}

pub fn resolve(bucket: &Bucket, filter: &Filter) -> Result<ResolvedFilter, DbError> {
    let clauses = filter
        .conditions()
        .into_iter()
        .map(|condition| {
            let def = bucket.field(&condition.field);
            let value = TypedValue::coerce(&condition.literal, def.map(|d| d.field_type))?;
            Ok(ResolvedClause {
                field: condition.field.clone(),
                value,
                class: classify(bucket, &condition.field),
                unique: def.is_some_and(|d| d.unique),
            })
        })
        .collect::<Result<Vec<_>, DbError>>()?;
    Ok(ResolvedFilter { clauses })
}

/// Refuse to run a query against a schema other than the one the caller expects.
pub fn check_required_version(bucket: &Bucket, required: Option<u32>) -> Result<(), DbError> {
    match required {
        Some(required) if required != bucket.version => Err(DbError::SchemaVersionMismatch {
            bucket: bucket.name.clone(),
            required,
            current: bucket.version,
        }),
        _ => Ok(()),
    }
}

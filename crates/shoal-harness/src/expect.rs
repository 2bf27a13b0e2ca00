use bson::{Bson, Document};
use shoal_db::ObjectRecord;
use shoal_query::{FieldType, TypedValue};

use crate::error::HarnessError;

pub fn count(records: &[ObjectRecord], expected: usize) -> Result<(), HarnessError> {
    if records.len() != expected {
        return Err(HarnessError::Count {
            expected,
            actual: records.len(),
        });
    }
    Ok(())
}

/// Every record must carry each field of `expected` with an equal value.
pub fn properties(records: &[ObjectRecord], expected: &Document) -> Result<(), HarnessError> {
    for record in records {
        for (field, want) in expected {
            let found = record.value.get(field);
            if found.is_none_or(|got| !same_value(got, want)) {
                return Err(HarnessError::Property {
                    key: record.key.clone(),
                    field: field.clone(),
                    expected: want.to_string(),
                    actual: found.map_or_else(|| "nothing".to_string(), Bson::to_string),
                });
            }
        }
    }
    Ok(())
}

fn same_value(got: &Bson, want: &Bson) -> bool {
    match (as_number(got), as_number(want)) {
        (Some(a), Some(b)) => a == b,
        _ => got == want,
    }
}

fn as_number(value: &Bson) -> Option<TypedValue> {
    TypedValue::from_stored(value, FieldType::Number)
}

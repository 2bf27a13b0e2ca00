use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

use crate::error::DbError;

/// An object as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub bucket: String,
    pub key: String,
    pub value: Document,
    pub id: u64,
    pub etag: String,
    pub mtime: bson::DateTime,
    /// Bucket schema version in effect when the object was written.
    pub written_at_version: u32,
}

/// Stored row. `indexed_version` is the schema version whose index columns
/// this row currently carries; a row below the bucket version is stale.
#[derive(Debug, Clone)]
pub(crate) struct Row {
    pub id: u64,
    pub key: String,
    pub value: Document,
    pub etag: String,
    pub mtime: bson::DateTime,
    pub written_at_version: u32,
    pub indexed_version: u32,
}

impl Row {
    pub fn to_record(&self, bucket: &str) -> ObjectRecord {
        ObjectRecord {
            bucket: bucket.to_string(),
            key: self.key.clone(),
            value: self.value.clone(),
            id: self.id,
            etag: self.etag.clone(),
            mtime: self.mtime,
            written_at_version: self.written_at_version,
        }
    }
}

/// Check that an object only holds values the store can keep: strings,
/// numbers, booleans, dates, null, and arrays or sub-objects of those.
/// The error names the offending path, e.g. `meta.tags[2]`.
pub fn validate_document(doc: &Document) -> Result<(), DbError> {
    doc.iter()
        .try_for_each(|(name, value)| check_value(value, &mut name.clone()))
}

fn check_value(value: &Bson, path: &mut String) -> Result<(), DbError> {
    match value {
        Bson::Document(doc) => {
            for (name, nested) in doc {
                let mark = path.len();
                path.push('.');
                path.push_str(name);
                check_value(nested, path)?;
                path.truncate(mark);
            }
            Ok(())
        }
        Bson::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                let mark = path.len();
                path.push_str(&format!("[{i}]"));
                check_value(item, path)?;
                path.truncate(mark);
            }
            Ok(())
        }
        other if bson_type_name(other) == UNSUPPORTED => Err(DbError::InvalidObject(format!(
            "{path}: values of BSON type {:?} cannot be stored",
            other.element_type()
        ))),
        _ => Ok(()),
    }
}

const UNSUPPORTED: &str = "unsupported";

/// Short human-readable type name used in error messages.
pub(crate) fn bson_type_name(value: &Bson) -> &'static str {
    match value {
        Bson::String(_) => "string",
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => "number",
        Bson::Boolean(_) => "boolean",
        Bson::Null => "null",
        Bson::Array(_) => "array",
        Bson::Document(_) => "object",
        Bson::DateTime(_) => "date",
        _ => UNSUPPORTED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn scalars_and_nested_values_validate() {
        let doc = doc! { "name": "bar", "n": 42_i64, "flag": true, "tags": ["a"], "meta": { "x": 1 } };
        assert!(validate_document(&doc).is_ok());
    }

    #[test]
    fn binary_is_rejected() {
        let doc = doc! {
            "blob": bson::Binary { subtype: bson::spec::BinarySubtype::Generic, bytes: vec![1, 2] }
        };
        assert!(matches!(
            validate_document(&doc),
            Err(DbError::InvalidObject(_))
        ));
    }

    #[test]
    fn rejection_names_the_nested_path() {
        let doc = doc! { "meta": { "tags": ["a", "b", bson::oid::ObjectId::new()] } };
        let Err(DbError::InvalidObject(message)) = validate_document(&doc) else {
            panic!("object id inside an array must be rejected");
        };
        assert!(message.starts_with("meta.tags[2]:"), "{message}");
    }
}

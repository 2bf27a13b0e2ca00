#![allow(dead_code)]

use bson::{Bson, doc};
use shoal_db::{BucketConfig, Database, DatabaseConfig, FindOptions, PutOptions};
use shoal_query::FieldType;

pub const BUCKET: &str = "widgets";
pub const PROPERTY: &str = "newly_indexed_property";

pub fn temp_db() -> Database {
    Database::open(DatabaseConfig::default())
}

pub fn v1_config() -> BucketConfig {
    BucketConfig::new()
        .with_unique_index("uuid", FieldType::String)
        .with_index("name", FieldType::String)
}

pub fn v2_config(field_type: FieldType) -> BucketConfig {
    v1_config()
        .with_index(PROPERTY, field_type)
        .with_version(2)
}

pub fn sentinel(field_type: FieldType) -> Bson {
    match field_type {
        FieldType::String => Bson::String("sentinel".into()),
        FieldType::Boolean => Bson::Boolean(true),
        FieldType::Number => Bson::Int64(42),
    }
}

pub fn sentinel_literal(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String => "sentinel",
        FieldType::Boolean => "true",
        FieldType::Number => "42",
    }
}

/// Put one object named `name` carrying `value` under `PROPERTY`.
pub fn put_named(db: &Database, bucket: &str, key: &str, name: &str, value: Bson) {
    let mut object = doc! { "uuid": key, "name": name };
    object.insert(PROPERTY, value);
    db.put_object(bucket, key, object, &PutOptions::default())
        .unwrap();
}

/// Seed one `foo` and one `bar`, both carrying the sentinel.
pub fn seed_foo_bar(db: &Database, bucket: &str, field_type: FieldType) {
    put_named(db, bucket, "k-foo", "foo", sentinel(field_type));
    put_named(db, bucket, "k-bar", "bar", sentinel(field_type));
}

pub fn count(db: &Database, bucket: &str, filter: &str, version: u32) -> usize {
    db.find_objects(bucket, filter, &FindOptions::required_version(version))
        .unwrap()
        .count()
}

pub fn compound_filter(field_type: FieldType) -> String {
    format!("(&(name=bar)({PROPERTY}={}))", sentinel_literal(field_type))
}

/// Run reindex batches until nothing remains.
pub fn reindex_all(db: &Database, bucket: &str, batch_size: usize) -> usize {
    let mut total = 0;
    loop {
        let result = db.reindex_objects(bucket, batch_size).unwrap();
        total += result.processed;
        if result.processed == 0 || result.remaining == 0 {
            return total;
        }
    }
}

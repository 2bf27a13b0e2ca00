mod common;
use common::*;

use bson::Bson;
use shoal_db::{DbError, IndexState, ReindexResult};
use shoal_query::FieldType;

/// Schema evolves after objects exist; the new field must be usable before
/// and after the backfill.
#[test]
fn existing_values_survive_schema_change() {
    for field_type in FieldType::ALL {
        let db = temp_db();
        db.create_bucket(BUCKET, &v1_config()).unwrap();
        seed_foo_bar(&db, BUCKET, field_type);
        assert_eq!(count(&db, BUCKET, "(name=bar)", 1), 1);

        db.update_bucket(BUCKET, &v2_config(field_type)).unwrap();
        assert_eq!(count(&db, BUCKET, "(name=bar)", 2), 1);
        assert_eq!(count(&db, BUCKET, &compound_filter(field_type), 2), 1);

        assert_eq!(reindex_all(&db, BUCKET, 100), 2);
        let bucket = db.get_bucket(BUCKET).unwrap();
        assert_eq!(bucket.field(PROPERTY).unwrap().state, IndexState::Complete);

        let results: Vec<_> = db
            .find_objects(
                BUCKET,
                &compound_filter(field_type),
                &shoal_db::FindOptions::required_version(2),
            )
            .unwrap()
            .collect();
        assert_eq!(results.len(), 1, "type {field_type}");
        assert_eq!(
            results[0].value.get(PROPERTY),
            Some(&sentinel(field_type))
        );
    }
}

/// Objects written after the schema change are indexed on write.
#[test]
fn new_values_are_indexed_on_write() {
    for field_type in FieldType::ALL {
        let db = temp_db();
        db.create_bucket(BUCKET, &v1_config()).unwrap();
        db.update_bucket(BUCKET, &v2_config(field_type)).unwrap();
        seed_foo_bar(&db, BUCKET, field_type);

        assert_eq!(count(&db, BUCKET, "(name=bar)", 2), 1);
        assert_eq!(count(&db, BUCKET, &compound_filter(field_type), 2), 1);

        let result = db.reindex_objects(BUCKET, 100).unwrap();
        assert_eq!(result, ReindexResult { processed: 0, remaining: 0 });
        assert_eq!(count(&db, BUCKET, &compound_filter(field_type), 2), 1);
    }
}

#[test]
fn partial_backfill_does_not_hide_objects() {
    let db = temp_db();
    db.create_bucket(BUCKET, &v1_config()).unwrap();
    for i in 0..5 {
        put_named(&db, BUCKET, &format!("k{i}"), "bar", Bson::Boolean(true));
    }
    db.update_bucket(BUCKET, &v2_config(FieldType::Boolean))
        .unwrap();

    let filter = format!("({PROPERTY}=true)");
    let first = db.reindex_objects(BUCKET, 2).unwrap();
    assert_eq!(first, ReindexResult { processed: 2, remaining: 3 });
    assert_eq!(count(&db, BUCKET, &filter, 2), 5);

    // Writes during the backfill land at the current version.
    put_named(&db, BUCKET, "k9", "bar", Bson::Boolean(true));
    assert_eq!(count(&db, BUCKET, &filter, 2), 6);

    assert_eq!(reindex_all(&db, BUCKET, 2), 3);
    assert!(!db.get_bucket(BUCKET).unwrap().has_pending_reindex());
    assert_eq!(count(&db, BUCKET, &filter, 2), 6);
}

#[test]
fn reindex_rejects_zero_batch() {
    let db = temp_db();
    db.create_bucket(BUCKET, &v1_config()).unwrap();
    let err = db.reindex_objects(BUCKET, 0).unwrap_err();
    assert_eq!(err.name(), "InvalidQueryError");
}

#[test]
fn reindex_unknown_bucket() {
    let db = temp_db();
    assert_eq!(
        db.reindex_objects("missing", 100).unwrap_err(),
        DbError::BucketNotFound("missing".into())
    );
}

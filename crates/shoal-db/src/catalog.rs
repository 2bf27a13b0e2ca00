use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use arc_swap::ArcSwap;

use crate::error::DbError;
use crate::table::BucketTable;

type Slot = Arc<ArcSwap<BucketTable>>;

/// Registry of bucket tables.
///
/// Readers load the current snapshot of a table without locking. Writers are
/// serialized by `write_lock`, copy the table (cheap, structurally shared),
/// mutate the copy and publish it atomically. A write is visible to every
/// read that starts after it returns.
pub(crate) struct Catalog {
    buckets: RwLock<HashMap<String, Slot>>,
    write_lock: Mutex<()>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn snapshot(&self, name: &str) -> Result<Arc<BucketTable>, DbError> {
        Ok(self.slot(name)?.load_full())
    }

    pub fn names(&self) -> Result<Vec<String>, DbError> {
        let buckets = self.buckets.read()?;
        let mut names: Vec<String> = buckets.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    pub fn insert(&self, table: BucketTable) -> Result<(), DbError> {
        let _guard = self.lock_writes();
        let mut buckets = self.buckets.write()?;
        if buckets.contains_key(table.name()) {
            return Err(DbError::BucketAlreadyExists(table.name().to_string()));
        }
        buckets.insert(
            table.name().to_string(),
            Arc::new(ArcSwap::new(Arc::new(table))),
        );
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<(), DbError> {
        let _guard = self.lock_writes();
        let mut buckets = self.buckets.write()?;
        buckets
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DbError::BucketNotFound(name.to_string()))
    }

    /// Apply `f` to a private copy of the table and publish the result.
    /// On error nothing is published.
    pub fn mutate<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut BucketTable) -> Result<R, DbError>,
    ) -> Result<R, DbError> {
        let _guard = self.lock_writes();
        let slot = self.slot(name)?;
        let mut table = (**slot.load()).clone();
        let out = f(&mut table)?;
        slot.store(Arc::new(table));
        Ok(out)
    }

    fn slot(&self, name: &str) -> Result<Slot, DbError> {
        let buckets = self.buckets.read()?;
        buckets
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::BucketNotFound(name.to_string()))
    }

    /// The lock guards no data: a writer that panicked published nothing, so
    /// a poisoned lock is taken over as is.
    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use shoal_query::FieldType;

    use super::*;
    use crate::bucket::{Bucket, BucketConfig};

    fn table(name: &str) -> BucketTable {
        let config = BucketConfig::new().with_index("name", FieldType::String);
        BucketTable::new(Bucket::create(name, &config).unwrap())
    }

    #[test]
    fn writes_continue_after_a_panicking_writer() {
        let catalog = Catalog::new();
        catalog.insert(table("a")).unwrap();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _: Result<(), DbError> = catalog.mutate("a", |_| panic!("writer died"));
        }));
        assert!(outcome.is_err());

        catalog.insert(table("b")).unwrap();
        let version = catalog
            .mutate("a", |table| Ok(table.bucket.version))
            .unwrap();
        assert_eq!(version, 1);
        assert_eq!(catalog.names().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn failed_mutation_publishes_nothing() {
        let catalog = Catalog::new();
        catalog.insert(table("a")).unwrap();
        let err = catalog
            .mutate("a", |table| {
                table.put("k", bson::doc! { "name": "x" })?;
                Err::<(), _>(DbError::Internal("abort".into()))
            })
            .unwrap_err();
        assert_eq!(err.name(), "InternalError");
        assert!(catalog.snapshot("a").unwrap().is_empty());
    }
}

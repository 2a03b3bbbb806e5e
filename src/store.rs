use std::sync::Arc;

use tokio::sync::Mutex;

use crate::allocator::Allocator;
use crate::err::Error;
use crate::io::{decode, encode, Gateway};
use crate::models::{Record, RecordId};

struct State<R> {
    records: Vec<R>,
    ids: Allocator,
}

/// The authoritative in-memory copy of one collection.
///
/// Records keep their insertion order. Every mutation rewrites the whole
/// collection through the [`Gateway`] while the lock is still held, so a
/// reader sees either the state before a mutation or after its flush.
pub struct Store<R: Record> {
    state: Mutex<State<R>>,
    gateway: Arc<dyn Gateway>,
}

impl<R: Record> Store<R> {
    /// Loads the collection and resumes id numbering above its maximum.
    ///
    /// A missing collection starts empty. So does one that fails to parse:
    /// the problem is logged and the next flush overwrites it.
    pub async fn open(gateway: Arc<dyn Gateway>) -> anyhow::Result<Self> {
        let records = match gateway.load(R::COLLECTION).await? {
            None => Vec::new(),
            Some(bytes) => decode::<R>(&bytes).unwrap_or_else(|err| {
                log::warn!(
                    "{} storage is malformed, starting empty: {:#}",
                    R::COLLECTION,
                    err
                );
                Vec::new()
            }),
        };
        let ids = Allocator::resume(&records);
        log::info!(
            "{} loaded: {} record(s), next id {}",
            R::COLLECTION,
            records.len(),
            ids.peek()
        );
        Ok(Self {
            state: Mutex::new(State { records, ids }),
            gateway,
        })
    }

    pub async fn list(&self) -> Vec<R> {
        self.state.lock().await.records.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn get(&self, id: RecordId) -> Result<R, Error> {
        let state = self.state.lock().await;
        state
            .records
            .iter()
            .find(|record| record.id() == id)
            .cloned()
            .ok_or_else(|| Error::not_found(R::NAME))
    }

    pub async fn contains(&self, id: RecordId) -> bool {
        let state = self.state.lock().await;
        state.records.iter().any(|record| record.id() == id)
    }

    /// Records matching `keep`, in store order.
    pub async fn filter<F>(&self, keep: F) -> Vec<R>
    where
        F: Fn(&R) -> bool,
    {
        let state = self.state.lock().await;
        state
            .records
            .iter()
            .filter(|record| keep(record))
            .cloned()
            .collect()
    }

    pub async fn insert(&self, draft: R::Draft) -> Result<R, Error> {
        let mut state = self.state.lock().await;
        let id = state.ids.allocate();
        let record = R::from_draft(id, draft);
        state.records.push(record.clone());
        self.flush(&state.records).await?;
        Ok(record)
    }

    pub async fn replace(&self, id: RecordId, patch: R::Draft) -> Result<R, Error> {
        let mut state = self.state.lock().await;
        let record = state
            .records
            .iter_mut()
            .find(|record| record.id() == id)
            .ok_or_else(|| Error::not_found(R::NAME))?;
        record.apply(patch);
        let updated = record.clone();
        self.flush(&state.records).await?;
        Ok(updated)
    }

    pub async fn remove(&self, id: RecordId) -> Result<R, Error> {
        let mut state = self.state.lock().await;
        let index = state
            .records
            .iter()
            .position(|record| record.id() == id)
            .ok_or_else(|| Error::not_found(R::NAME))?;
        let removed = state.records.remove(index);
        self.flush(&state.records).await?;
        Ok(removed)
    }

    async fn flush(&self, records: &[R]) -> Result<(), Error> {
        let bytes = encode(records)?;
        match self.gateway.save(R::COLLECTION, bytes).await {
            Ok(()) => {
                log::debug!("flushed {} {}", records.len(), R::COLLECTION);
                Ok(())
            }
            Err(err) => {
                log::error!("failed to flush {}: {:#}", R::COLLECTION, err);
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{DiskGateway, MemoryGateway};
    use crate::models::{Student, StudentDraft, Teacher, TeacherDraft, TestResult};
    use async_trait::async_trait;
    use serde_json::json;

    fn named(first: &str) -> TeacherDraft {
        TeacherDraft {
            first_name: Some(json!(first)),
            ..Default::default()
        }
    }

    async fn memory_store() -> (Arc<MemoryGateway>, Store<Teacher>) {
        let gateway = Arc::new(MemoryGateway::new());
        let store = Store::open(gateway.clone()).await.unwrap();
        (gateway, store)
    }

    #[tokio::test]
    async fn created_ids_are_distinct_and_increasing() {
        let (_, store) = memory_store().await;
        let mut ids = Vec::new();
        for name in ["a", "b", "c", "d"] {
            ids.push(store.insert(named(name)).await.unwrap().id);
        }
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn deleted_ids_are_not_reused() {
        let (_, store) = memory_store().await;
        store.insert(named("a")).await.unwrap();
        let last = store.insert(named("b")).await.unwrap();
        store.remove(last.id).await.unwrap();

        let next = store.insert(named("c")).await.unwrap();
        assert_eq!(next.id, 3);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (_, store) = memory_store().await;
        let err = store.get(42).await.unwrap_err();
        assert_eq!(err.to_string(), "Teacher not found");
    }

    #[tokio::test]
    async fn replace_keeps_unspecified_fields() {
        let (_, store) = memory_store().await;
        let created = store
            .insert(TeacherDraft {
                first_name: Some("Ada".into()),
                email: Some("ada@school.test".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let updated = store
            .replace(created.id, TeacherDraft {
                room: Some("B12".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.first_name, Some(json!("Ada")));
        assert_eq!(updated.email, Some(json!("ada@school.test")));
        assert_eq!(updated.room, Some(json!("B12")));
        assert_eq!(store.get(created.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn replace_missing_is_not_found() {
        let (_, store) = memory_store().await;
        assert!(matches!(
            store.replace(5, named("x")).await,
            Err(Error::NotFound { entity: "Teacher" })
        ));
    }

    #[tokio::test]
    async fn remove_missing_leaves_collection_alone() {
        let (_, store) = memory_store().await;
        store.insert(named("a")).await.unwrap();
        store.insert(named("b")).await.unwrap();

        assert!(store.remove(9).await.is_err());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn remove_returns_the_record_and_keeps_order() {
        let (_, store) = memory_store().await;
        for name in ["a", "b", "c"] {
            store.insert(named(name)).await.unwrap();
        }
        let removed = store.remove(2).await.unwrap();
        assert_eq!(removed.first_name, Some(json!("b")));

        let remaining: Vec<_> = store.list().await.iter().map(|t| t.id).collect();
        assert_eq!(remaining, vec![1, 3]);
    }

    #[tokio::test]
    async fn every_mutation_is_flushed() {
        let (gateway, store) = memory_store().await;
        store.insert(named("a")).await.unwrap();
        store.insert(named("b")).await.unwrap();
        store.replace(1, named("z")).await.unwrap();
        store.remove(2).await.unwrap();

        let saved = gateway.load("teachers").await.unwrap().unwrap();
        let saved: Vec<Teacher> = decode(&saved).unwrap();
        assert_eq!(saved, store.list().await);
        assert_eq!(saved[0].first_name, Some(json!("z")));
    }

    #[tokio::test]
    async fn reload_reproduces_records_and_resumes_numbering() {
        let dir = tempfile::tempdir().unwrap();
        let gateway: Arc<dyn Gateway> = Arc::new(DiskGateway::new(dir.path()));

        let store = Store::<Student>::open(gateway.clone()).await.unwrap();
        for name in ["Ann", "Bo", "Cy"] {
            store
                .insert(StudentDraft {
                    first_name: Some(name.into()),
                    grade: Some(json!(9)),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        let before = store.list().await;
        drop(store);

        let reopened = Store::<Student>::open(gateway).await.unwrap();
        assert_eq!(reopened.list().await, before);
        let next = reopened.insert(StudentDraft::default()).await.unwrap();
        assert_eq!(next.id, 4);
    }

    #[tokio::test]
    async fn malformed_storage_starts_empty() {
        let gateway = Arc::new(MemoryGateway::with("teachers", "{ definitely not json"));
        let store = Store::<Teacher>::open(gateway).await.unwrap();
        assert_eq!(store.len().await, 0);
        assert_eq!(store.insert(named("a")).await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn loosely_typed_records_survive_a_reload() {
        let file = json!([
            {"id": 1, "studentId": 1, "courseId": 2, "mark": 8, "outOf": 10},
            {"id": 2, "studentId": "1", "mark": "9", "outOf": 10, "testName": 7},
            {"id": 5}
        ]);
        let gateway = Arc::new(MemoryGateway::with(
            "tests",
            serde_json::to_vec(&file).unwrap(),
        ));
        let store = Store::<TestResult>::open(gateway).await.unwrap();

        let loaded = store.list().await;
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[1].mark, Some(json!("9")));
        assert_eq!(serde_json::to_value(&loaded).unwrap(), file);
        assert_eq!(store.insert(Default::default()).await.unwrap().id, 6);
    }

    struct ReadOnly;

    #[async_trait]
    impl Gateway for ReadOnly {
        async fn load(&self, _: &str) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn save(&self, _: &str, _: Vec<u8>) -> anyhow::Result<()> {
            anyhow::bail!("read-only filesystem")
        }
    }

    #[tokio::test]
    async fn failed_flush_is_reported() {
        let store = Store::<Teacher>::open(Arc::new(ReadOnly)).await.unwrap();
        let err = store.insert(named("a")).await.unwrap_err();
        assert!(matches!(err, Error::InternalError { kind: "StorageError", .. }));
    }
}

//! In-memory stand-ins for the remote bucket.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use storage::{ObjectHandle, ObjectStoreRemote, RemoteStore, StorageError, StorageResult};

/// A remote backed by `InMemory`, holding `objects` as `(key, body)` pairs.
pub async fn seed_store(objects: &[(&str, &[u8])]) -> ObjectStoreRemote {
    let store = InMemory::new();
    for (key, body) in objects {
        store
            .put(&ObjectPath::from(*key), Bytes::copy_from_slice(body).into())
            .await
            .expect("Failed to seed in-memory store");
    }
    ObjectStoreRemote::new(Arc::new(store), "memory")
}

/// Seed every key with a small placeholder body.
pub async fn seed_keys(keys: &[String]) -> ObjectStoreRemote {
    let objects: Vec<(&str, &[u8])> = keys.iter().map(|k| (k.as_str(), b"raw".as_slice())).collect();
    seed_store(&objects).await
}

/// Delegates to `inner`, except listings of `failing_prefix` time out.
pub struct PrefixFailingStore<S> {
    pub inner: S,
    pub failing_prefix: String,
}

#[async_trait]
impl<S: RemoteStore> RemoteStore for PrefixFailingStore<S> {
    async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<ObjectHandle>> {
        if prefix == self.failing_prefix {
            return Err(StorageError::Timeout(format!("listing {}", prefix)));
        }
        self.inner.list_objects(prefix).await
    }

    async fn download(&self, handle: &ObjectHandle, dest: &Path) -> StorageResult<u64> {
        self.inner.download(handle, dest).await
    }
}

//! Key-value store wrapper.

use dbx_domain::error::Result;
use dbx_domain::ContentType;

use crate::client::CoreStoreClient;
use crate::subscription::Subscription;
use crate::transport::ObserveMode;
use crate::types::ObserveResponse;

/// Key-value view of a store for one content type.
///
/// Paths are `/kv/<data_source_id>/<key>`.
#[derive(Clone)]
pub struct KvStore {
    core: CoreStoreClient,
    content_type: ContentType,
}

impl KvStore {
    pub fn new(core: CoreStoreClient, content_type: ContentType) -> Self {
        Self { core, content_type }
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub async fn write(&self, data_source_id: &str, key: &str, payload: &[u8]) -> Result<()> {
        self.core
            .write(&key_path(data_source_id, key), payload, self.content_type)
            .await
    }

    pub async fn read(&self, data_source_id: &str, key: &str) -> Result<Vec<u8>> {
        self.core
            .read(&key_path(data_source_id, key), self.content_type)
            .await
    }

    pub async fn delete(&self, data_source_id: &str, key: &str) -> Result<()> {
        self.core
            .delete(&key_path(data_source_id, key), self.content_type)
            .await
    }

    /// Remove every key of the data source.
    pub async fn delete_all(&self, data_source_id: &str) -> Result<()> {
        self.core
            .delete(&format!("/kv/{data_source_id}"), self.content_type)
            .await
    }

    /// Keys currently stored. The store answers with a JSON array whatever
    /// the wrapper's content type.
    pub async fn list_keys(&self, data_source_id: &str) -> Result<Vec<String>> {
        let body = self
            .core
            .read(&format!("/kv/{data_source_id}/keys"), ContentType::Json)
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Every write to any key of the data source.
    pub async fn observe(&self, data_source_id: &str) -> Result<Subscription<ObserveResponse>> {
        self.core
            .observe(
                &format!("/kv/{data_source_id}/*"),
                self.content_type,
                ObserveMode::Data,
            )
            .await
    }

    pub async fn observe_key(
        &self,
        data_source_id: &str,
        key: &str,
    ) -> Result<Subscription<ObserveResponse>> {
        self.core
            .observe(
                &key_path(data_source_id, key),
                self.content_type,
                ObserveMode::Data,
            )
            .await
    }
}

fn key_path(data_source_id: &str, key: &str) -> String {
    format!("/kv/{data_source_id}/{key}")
}

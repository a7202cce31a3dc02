//! Data source registration and store catalogue lookup.

use dbx_arbiter::{store_url_from_href, Method};
use dbx_domain::error::{Error, Result};
use dbx_domain::{ContentType, DataSourceMetadata, HypercatItem, HypercatRoot};

use crate::client::CoreStoreClient;

const CAT_PATH: &str = "/cat";

impl CoreStoreClient {
    /// Advertise a data source in this store's catalogue (`POST /cat`).
    pub async fn register_datasource(&self, metadata: &DataSourceMetadata) -> Result<()> {
        let item = metadata.to_hypercat(self.endpoint())?;
        let body = serde_json::to_vec(&item)?;
        self.write(CAT_PATH, &body, ContentType::Json).await
    }

    /// Fetch the catalogue of the store at `store_url`.
    ///
    /// The token is requested for `<store_url>/cat`; the read goes through
    /// this client's transport, which must be connected to that store.
    /// Decode failures are returned, never papered over.
    pub async fn store_catalogue(&self, store_url: &str) -> Result<HypercatRoot> {
        let href = format!("{}{CAT_PATH}", store_url.trim_end_matches('/'));
        let token = self
            .arbiter()
            .request_token(&href, Method::Get, None)
            .await
            .map_err(|e| Error::Arbiter(format!("Error getting Arbiter Token: {e}")))?;

        let body = self
            .transport()
            .get(&token, CAT_PATH, ContentType::Json)
            .await
            .map_err(|e| {
                self.arbiter().invalidate_cache(&href, Method::Get, None);
                Error::Store(format!("Error reading catalogue: {e}"))
            })?;

        if body.is_empty() {
            return Err(Error::Store(format!("empty catalogue from {store_url}")));
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Metadata of a catalogue item plus the URL of the store holding it.
pub fn hypercat_to_datasource(item: &HypercatItem) -> Result<(DataSourceMetadata, String)> {
    let store_url = store_url_from_href(&item.href)?;
    Ok((DataSourceMetadata::from_hypercat(item), store_url))
}

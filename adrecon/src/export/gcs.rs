//! Google Cloud Storage object store over the JSON API.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use adrecon_core::{HttpClient, ServiceAccountAuth, ServiceAccountKey};
use adrecon_types::AdreconError;

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";
const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

use super::store::ObjectStore;

/// Bucket-backed store authenticated by a service account.
pub struct GcsStore {
    bucket: String,
    client: HttpClient,
    auth: ServiceAccountAuth,
    endpoint: String,
}

impl GcsStore {
    /// Open a store on `bucket` with the given service-account key.
    #[must_use]
    pub fn new(bucket: impl Into<String>, key: ServiceAccountKey) -> Self {
        Self {
            bucket: bucket.into(),
            client: HttpClient::new(),
            auth: ServiceAccountAuth::new(key, STORAGE_SCOPE.to_string()),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Point the store at a different API endpoint (tests). The token
    /// exchange is redirected to the same host.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.auth = self.auth.with_token_uri(format!("{endpoint}/token"));
        self.endpoint = endpoint;
        self
    }

    fn encode(component: &str) -> String {
        url::form_urlencoded::byte_serialize(component.as_bytes()).collect()
    }

    async fn bearer(&self) -> Result<String, AdreconError> {
        self.auth
            .bearer(&self.client)
            .await
            .map_err(|e| AdreconError::Export(format!("storage auth: {e}")))
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, AdreconError> {
        let token = self.bearer().await?;
        let url = format!("{}/storage/v1/b/{}/o", self.endpoint, self.bucket);

        let data: Value = self
            .client
            .send_json(
                self.client
                    .get(&url)
                    .query(&[("prefix", prefix)])
                    .bearer_auth(&token),
            )
            .await
            .map_err(|e| AdreconError::Export(format!("list {prefix}: {e}")))?;

        let mut keys: Vec<String> = data
            .get("items")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|item| item.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, path: &str) -> Result<(), AdreconError> {
        let token = self.bearer().await?;
        let url = format!(
            "{}/storage/v1/b/{}/o/{}",
            self.endpoint,
            self.bucket,
            Self::encode(path)
        );

        match self
            .client
            .send(self.client.inner().delete(&url).bearer_auth(&token))
            .await
        {
            Ok(_) => Ok(()),
            // Already gone is the desired postcondition.
            Err(e) if e.status() == Some(404) => Ok(()),
            Err(e) => Err(AdreconError::Export(format!("delete {path}: {e}"))),
        }
    }

    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), AdreconError> {
        let token = self.bearer().await?;
        let url = format!(
            "{}/upload/storage/v1/b/{}/o",
            self.endpoint, self.bucket
        );

        self.client
            .send(
                self.client
                    .post(&url)
                    .query(&[("uploadType", "media"), ("name", path)])
                    .bearer_auth(&token)
                    .header("Content-Type", "application/octet-stream")
                    .body(bytes),
            )
            .await
            .map_err(|e| AdreconError::Export(format!("upload {path}: {e}")))?;
        debug!(path, bucket = %self.bucket, "artifact uploaded");
        Ok(())
    }
}

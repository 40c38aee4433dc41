use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{decode_path, encode_object_name, validate_path, ObjectStore, ObjectStoreError, ProgressFn};

const API_ROOT: &str = "https://storage.googleapis.com";
const UPLOAD_CHUNK: usize = 256 * 1024;
/// Refresh this long before the token actually expires
const TOKEN_SLACK: Duration = Duration::from_secs(60);

/// Google Cloud Storage object store backend.
///
/// URLs handed out are JSON API media links
/// (`.../download/storage/v1/b/<bucket>/o/<object>?alt=media`), which is also
/// what `delete_by_url` and `get_by_url` parse back into object names.
pub struct GcsStore {
    bucket: String,
    client: Client,
    token: RwLock<Option<AccessToken>>,
    credentials_file: Option<String>,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expiry")]
    expires_in: u64,
}

fn default_expiry() -> u64 {
    3600
}

impl GcsStore {
    pub async fn new(bucket: &str, credentials_file: Option<&str>) -> Result<Self, anyhow::Error> {
        let store = Self {
            bucket: bucket.to_string(),
            client: Client::builder().build()?,
            token: RwLock::new(None),
            credentials_file: credentials_file.map(|s| s.to_string()),
        };

        // Fail fast on bad credentials
        store.bearer().await?;
        Ok(store)
    }

    /// Current access token, refreshed when close to expiry.
    async fn bearer(&self) -> Result<String, anyhow::Error> {
        if let Some(token) = self.token.read().await.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_SLACK {
                return Ok(token.value.clone());
            }
        }

        let mut slot = self.token.write().await;
        if let Some(token) = slot.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_SLACK {
                return Ok(token.value.clone());
            }
        }

        let fresh = match self.credentials_file {
            Some(ref path) => self.token_from_service_account(path).await?,
            None => self.token_from_metadata_server().await?,
        };
        let value = fresh.access_token.clone();
        *slot = Some(AccessToken {
            value: fresh.access_token,
            expires_at: Instant::now() + Duration::from_secs(fresh.expires_in),
        });
        tracing::debug!(bucket = %self.bucket, "Refreshed GCS access token");
        Ok(value)
    }

    async fn token_from_service_account(&self, path: &str) -> Result<TokenResponse, anyhow::Error> {
        let key_json = tokio::fs::read_to_string(path).await?;
        let key: ServiceAccountKey = serde_json::from_str(&key_json)?;
        let assertion = signed_assertion(&key)?;

        let resp = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp)
    }

    async fn token_from_metadata_server(&self) -> Result<TokenResponse, anyhow::Error> {
        let resp = self
            .client
            .get("http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token")
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp)
    }

    async fn auth(&self) -> Result<String, ObjectStoreError> {
        self.bearer()
            .await
            .map_err(|e| ObjectStoreError::Backend(format!("GCS auth failed: {e}")))
    }

    fn media_url(&self, object: &str) -> String {
        format!(
            "{API_ROOT}/download/storage/v1/b/{}/o/{}?alt=media",
            self.bucket,
            encode_object_name(object)
        )
    }

    fn metadata_url(&self, object: &str) -> String {
        format!(
            "{API_ROOT}/storage/v1/b/{}/o/{}",
            self.bucket,
            encode_object_name(object)
        )
    }

    /// Object name behind a media URL issued by this store.
    fn object_from_url(&self, url: &str) -> Result<String, ObjectStoreError> {
        let prefix = format!("{API_ROOT}/download/storage/v1/b/{}/o/", self.bucket);
        let encoded = url
            .strip_prefix(&prefix)
            .map(|rest| rest.split('?').next().unwrap_or(rest))
            .ok_or_else(|| ObjectStoreError::ForeignUrl(url.to_string()))?;
        decode_path(encoded)
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
        progress: ProgressFn,
    ) -> Result<String, ObjectStoreError> {
        validate_path(path)?;
        let token = self.auth().await?;
        let total = data.len() as u64;

        // Slice the payload so progress tracks what the HTTP body has handed off
        let chunks: Vec<Bytes> = (0..data.len())
            .step_by(UPLOAD_CHUNK)
            .map(|start| data.slice(start..(start + UPLOAD_CHUNK).min(data.len())))
            .collect();
        let reporter = progress.clone();
        let mut sent = 0u64;
        let body = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len() as u64;
            reporter(sent, total);
            Ok::<Bytes, std::io::Error>(chunk)
        }));

        progress(0, total);
        let resp = self
            .client
            .post(format!("{API_ROOT}/upload/storage/v1/b/{}/o", self.bucket))
            .query(&[("uploadType", "media"), ("name", path)])
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header(reqwest::header::CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "GCS upload failed ({status}): {body}"
            )));
        }

        progress(total, total);
        Ok(self.media_url(path))
    }

    async fn get_by_url(&self, url: &str) -> Result<Bytes, ObjectStoreError> {
        let object = self.object_from_url(url)?;
        let token = self.auth().await?;

        let resp = self
            .client
            .get(self.media_url(&object))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(url.to_string()));
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "GCS download failed ({status}): {body}"
            )));
        }

        resp.bytes()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))
    }

    async fn delete_by_url(&self, url: &str) -> Result<(), ObjectStoreError> {
        let object = self.object_from_url(url)?;
        let token = self.auth().await?;

        let resp = self
            .client
            .delete(self.metadata_url(&object))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(url.to_string()));
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "GCS delete failed ({status}): {body}"
            )));
        }

        Ok(())
    }

    async fn exists_by_url(&self, url: &str) -> Result<bool, ObjectStoreError> {
        let object = self.object_from_url(url)?;
        let token = self.auth().await?;

        let resp = self
            .client
            .get(self.metadata_url(&object))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        Ok(resp.status().is_success())
    }
}

/// RS256-signed JWT assertion for the OAuth2 service-account flow.
fn signed_assertion(key: &ServiceAccountKey) -> Result<String, anyhow::Error> {
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use base64::Engine;

    let now = chrono::Utc::now().timestamp();
    let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&serde_json::json!({
        "alg": "RS256",
        "typ": "JWT"
    }))?);
    let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&serde_json::json!({
        "iss": key.client_email,
        "scope": "https://www.googleapis.com/auth/devstorage.read_write",
        "aud": key.token_uri,
        "iat": now,
        "exp": now + 3600,
    }))?);
    let unsigned = format!("{header}.{claims}");

    let der_b64: String = key
        .private_key
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    let der = STANDARD.decode(der_b64.trim())?;

    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(&der)
        .map_err(|e| anyhow::anyhow!("Failed to parse RSA key: {e}"))?;
    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            unsigned.as_bytes(),
            &mut signature,
        )
        .map_err(|e| anyhow::anyhow!("Failed to sign: {e}"))?;

    Ok(format!("{unsigned}.{}", URL_SAFE_NO_PAD.encode(&signature)))
}

use thiserror::Error;

use crate::thumbnail::ThumbnailSize;
use crate::viewer::ViewerOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub sharing: SharingConfig,
    pub viewer: ViewerConfig,
    /// Enables dangerous operations like purge. Must never be true in production.
    pub test_mode: bool,
    /// Maximum size of a single uploaded file in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    pub data_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Gcs,
    Local,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory for local storage backend
    pub local_storage_path: String,
    /// URL prefix under which the local backend's blobs are served
    pub blob_base_url: String,
    /// Derive thumbnail renditions on upload (local backend)
    pub generate_thumbnails: bool,
    /// GCS bucket name (required when backend is gcs)
    pub gcs_bucket: Option<String>,
    /// Path to GCS service account JSON (optional, defaults to ADC)
    pub gcs_credentials_file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SharingConfig {
    /// Origin public links are built on, e.g. `https://photos.example.com`
    pub public_origin: String,
    pub public_route_prefix: String,
}

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub thumbnail_size: ThumbnailSize,
    /// Fraction of the viewport width a swipe must exceed
    pub swipe_threshold: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            data_dir: "./data".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_storage_path: "./files".to_string(),
            blob_base_url: "http://localhost:8080/blobs".to_string(),
            generate_thumbnails: true,
            gcs_bucket: None,
            gcs_credentials_file: None,
        }
    }
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            public_origin: "http://localhost:8080".to_string(),
            public_route_prefix: "public/album".to_string(),
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            thumbnail_size: ThumbnailSize::default(),
            swipe_threshold: 0.2,
        }
    }
}

impl ViewerConfig {
    pub fn options(&self) -> ViewerOptions {
        ViewerOptions {
            swipe_threshold: self.swipe_threshold,
            thumbnail_size: self.thumbnail_size,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            sharing: SharingConfig::default(),
            viewer: ViewerConfig::default(),
            test_mode: false,
            max_upload_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or(defaults.server.bind_address);

        let data_dir = std::env::var("DATA_DIR").unwrap_or(defaults.server.data_dir);

        let test_mode = env_flag("TEST_MODE", false);

        let max_upload_size = match std::env::var("MAX_UPLOAD_SIZE") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("MAX_UPLOAD_SIZE '{raw}' is not a byte count"))
            })?,
            Err(_) => defaults.max_upload_size,
        };

        let backend = match std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "gcs" => StorageBackend::Gcs,
            "local" => StorageBackend::Local,
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown STORAGE_BACKEND '{other}', expected local or gcs"
                )))
            }
        };

        let local_storage_path = std::env::var("LOCAL_STORAGE_PATH")
            .unwrap_or(defaults.storage.local_storage_path);
        let blob_base_url =
            std::env::var("BLOB_BASE_URL").unwrap_or(defaults.storage.blob_base_url);
        let generate_thumbnails = env_flag("GENERATE_THUMBNAILS", true);

        let gcs_bucket = std::env::var("GCS_BUCKET").ok();
        let gcs_credentials_file = std::env::var("GCS_CREDENTIALS_FILE").ok();

        let public_origin =
            std::env::var("PUBLIC_ORIGIN").unwrap_or(defaults.sharing.public_origin);
        let public_route_prefix = std::env::var("PUBLIC_ROUTE_PREFIX")
            .unwrap_or(defaults.sharing.public_route_prefix);

        let thumbnail_size = match std::env::var("THUMBNAIL_SIZE") {
            Ok(raw) => raw.parse().map_err(ConfigError::ValidationError)?,
            Err(_) => defaults.viewer.thumbnail_size,
        };

        let swipe_threshold = match std::env::var("SWIPE_THRESHOLD") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("SWIPE_THRESHOLD '{raw}' is not a number"))
            })?,
            Err(_) => defaults.viewer.swipe_threshold,
        };

        let config = Config {
            server: ServerConfig {
                bind_address,
                data_dir,
            },
            storage: StorageConfig {
                backend,
                local_storage_path,
                blob_base_url,
                generate_thumbnails,
                gcs_bucket,
                gcs_credentials_file,
            },
            sharing: SharingConfig {
                public_origin,
                public_route_prefix,
            },
            viewer: ViewerConfig {
                thumbnail_size,
                swipe_threshold,
            },
            test_mode,
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::Gcs && self.storage.gcs_bucket.is_none() {
            return Err(ConfigError::ValidationError(
                "GCS_BUCKET is required when STORAGE_BACKEND=gcs".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than zero".to_string(),
            ));
        }

        if !(self.viewer.swipe_threshold > 0.0 && self.viewer.swipe_threshold < 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "SWIPE_THRESHOLD must be between 0 and 1, got {}",
                self.viewer.swipe_threshold
            )));
        }

        for (name, url) in [
            ("PUBLIC_ORIGIN", &self.sharing.public_origin),
            ("BLOB_BASE_URL", &self.storage.blob_base_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be an http(s) URL, got '{url}'"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_gcs_requires_bucket() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Gcs;
        assert!(config.validate().is_err());

        config.storage.gcs_bucket = Some("photos".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_swipe_threshold_range() {
        let mut config = Config::default();
        config.viewer.swipe_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_public_origin_must_be_http() {
        let mut config = Config::default();
        config.sharing.public_origin = "photos.example.com".to_string();
        assert!(config.validate().is_err());
    }
}

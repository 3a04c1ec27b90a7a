//! Object store connection settings.

use etl_core::defaults;

/// Connection settings for the S3-compatible object store.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Host and port, optionally with a scheme (`minio:9000`, `https://s3.local`).
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    /// Use HTTPS when the endpoint has no scheme.
    pub secure: bool,
    pub region: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::MINIO_ENDPOINT.to_string(),
            access_key: defaults::MINIO_ACCESS_KEY.to_string(),
            secret_key: defaults::MINIO_SECRET_KEY.to_string(),
            secure: false,
            region: defaults::MINIO_REGION.to_string(),
        }
    }
}

impl StorageConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `MINIO_ENDPOINT` | `localhost:9000` |
    /// | `MINIO_ACCESS_KEY` | `minioadmin` |
    /// | `MINIO_SECRET_KEY` | `minioadmin` |
    /// | `MINIO_SECURE` | `false` |
    /// | `MINIO_REGION` | `us-east-1` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base = Self::default();
        Self {
            endpoint: lookup("MINIO_ENDPOINT").unwrap_or(base.endpoint),
            access_key: lookup("MINIO_ACCESS_KEY").unwrap_or(base.access_key),
            secret_key: lookup("MINIO_SECRET_KEY").unwrap_or(base.secret_key),
            secure: lookup("MINIO_SECURE")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(base.secure),
            region: lookup("MINIO_REGION").unwrap_or(base.region),
        }
    }

    /// Endpoint URL with a scheme.
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            self.endpoint.trim_end_matches('/').to_string()
        } else {
            let scheme = if self.secure { "https" } else { "http" };
            format!("{}://{}", scheme, self.endpoint.trim_end_matches('/'))
        }
    }

    /// Set the endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the access and secret keys.
    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = access_key.into();
        self.secret_key = secret_key.into();
        self
    }
}

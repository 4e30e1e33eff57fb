use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub encryption: EncryptionConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub blob_store: BlobStoreConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Clone, Deserialize, Default)]
pub struct EncryptionConfig {
    /// Secret whose first 32 bytes form the cipher key
    #[serde(default)]
    pub key: String,
}

impl std::fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// HS256 secret for session tokens
    #[serde(default)]
    pub session_secret: String,
    /// Older HS256 secrets still accepted during rotation
    #[serde(default)]
    pub previous_session_secrets: Vec<String>,
    /// RS256 public key (PEM); takes precedence over `session_secret`
    #[serde(default)]
    pub session_public_key: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    /// Identity webhook secret, `whsec_<base64>`
    #[serde(default)]
    pub webhook_signing_secret: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    Pinata,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlobStoreConfig {
    #[serde(default = "default_backend")]
    pub backend: BlobBackend,
    #[serde(default = "default_local_path")]
    pub local_path: String,
    #[serde(default)]
    pub pinata_jwt: String,
    #[serde(default = "default_pinata_api_url")]
    pub pinata_api_url: String,
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_size")]
    pub max_size_bytes: usize,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "data/vault.db".to_string()
}

fn default_backend() -> BlobBackend {
    BlobBackend::Pinata
}

fn default_local_path() -> String {
    "data/blobs".to_string()
}

fn default_pinata_api_url() -> String {
    "https://api.pinata.cloud".to_string()
}

fn default_gateway_url() -> String {
    "https://gateway.pinata.cloud".to_string()
}

fn default_max_size() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local_path: default_local_path(),
            pinata_jwt: String::new(),
            pinata_api_url: default_pinata_api_url(),
            gateway_url: default_gateway_url(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.ensure_directories()?;
        config.ensure_encryption_key(Path::new("data/.encryption_key"))?;
        tracing::info!(
            "Blob store: {:?}, upload limit {} bytes",
            config.blob_store.backend,
            config.upload.max_size_bytes
        );
        Ok(config)
    }

    /// Ensure an encryption secret is configured, persisting a generated one otherwise
    fn ensure_encryption_key(&mut self, key_path: &Path) -> anyhow::Result<()> {
        if !self.encryption.key.is_empty() {
            return Ok(());
        }

        if key_path.exists() {
            let secret = fs::read_to_string(key_path)?;
            self.encryption.key = secret.trim().to_string();
            tracing::warn!("No encryption key configured, using persisted key from {:?}", key_path);
        } else {
            let secret: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(48)
                .map(char::from)
                .collect();

            if let Some(parent) = key_path.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::write(key_path, &secret)?;
            self.encryption.key = secret;
            tracing::warn!(
                "No encryption key configured, generated a new one at {:?}; losing it makes stored files unreadable",
                key_path
            );
        }
        Ok(())
    }

    /// Load configuration from conf.toml or config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["conf.toml", "config.toml", "data/conf.toml", "data/config.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config = Self::from_toml(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides
    /// Format: CV_CONF_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(val) = var("CV_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        if let Some(val) = var("CV_CONF_SERVER_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }

        // Database overrides
        if let Some(val) = var("CV_CONF_DATABASE_PATH") {
            self.database.path = val;
        }

        // Encryption overrides
        if let Some(val) = var("CV_CONF_ENCRYPTION_KEY") {
            self.encryption.key = val;
        }

        // Auth overrides
        if let Some(val) = var("CV_CONF_AUTH_SESSION_SECRET") {
            self.auth.session_secret = val;
        }
        if let Some(val) = var("CV_CONF_AUTH_PREVIOUS_SESSION_SECRETS") {
            self.auth.previous_session_secrets = val
                .split(',')
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect();
        }
        if let Some(val) = var("CV_CONF_AUTH_SESSION_PUBLIC_KEY") {
            if !val.trim().is_empty() {
                self.auth.session_public_key = Some(val);
            }
        }
        if let Some(val) = var("CV_CONF_AUTH_ISSUER") {
            if !val.trim().is_empty() {
                self.auth.issuer = Some(val);
            }
        }
        if let Some(val) = var("CV_CONF_AUTH_WEBHOOK_SIGNING_SECRET") {
            if !val.trim().is_empty() {
                self.auth.webhook_signing_secret = Some(val);
            }
        }

        // Blob store overrides
        if let Some(val) = var("CV_CONF_BLOB_STORE_BACKEND") {
            match val.to_lowercase().as_str() {
                "pinata" => self.blob_store.backend = BlobBackend::Pinata,
                "local" => self.blob_store.backend = BlobBackend::Local,
                other => tracing::warn!("Ignoring unknown blob store backend {:?}", other),
            }
        }
        if let Some(val) = var("CV_CONF_BLOB_STORE_LOCAL_PATH") {
            self.blob_store.local_path = val;
        }
        if let Some(val) = var("CV_CONF_BLOB_STORE_PINATA_JWT") {
            self.blob_store.pinata_jwt = val;
        }
        if let Some(val) = var("CV_CONF_BLOB_STORE_PINATA_API_URL") {
            self.blob_store.pinata_api_url = val;
        }
        if let Some(val) = var("CV_CONF_BLOB_STORE_GATEWAY_URL") {
            self.blob_store.gateway_url = val;
        }

        // Upload overrides
        if let Some(val) = var("CV_CONF_UPLOAD_MAX_SIZE_BYTES") {
            if let Ok(size) = val.parse() {
                self.upload.max_size_bytes = size;
            }
        }
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }

        if self.blob_store.backend == BlobBackend::Local {
            fs::create_dir_all(&self.blob_store.local_path)?;
        }

        Ok(())
    }
}

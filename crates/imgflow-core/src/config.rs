//! Configuration module
//!
//! Configuration is read from the environment exactly once, at process start, and then
//! passed by reference into each component. Nothing below this module calls `env::var`.

use std::collections::HashSet;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_ALLOWED_CONTENT_TYPES, DEFAULT_CREDENTIAL_EXPIRY_SECS, DEFAULT_DISPATCH_CONCURRENCY,
    DEFAULT_ENCODE_CONCURRENCY, DEFAULT_MAX_UPLOAD_SIZE_MB, DEFAULT_PROCESSING_TIMEOUT_SECS,
    DEFAULT_QUALITY, DEFAULT_THUMBNAIL_SIZES,
};
use crate::models::{ImageContentType, VariantSpec};
use crate::storage_types::StorageBackend;

const MIN_JWT_SECRET_LEN: usize = 32;
const MIN_WEBHOOK_TOKEN_LEN: usize = 16;

/// Server-level settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub jwt_secret: String,
    pub event_webhook_token: String,
    pub environment: String,
    /// `compact` or `json`
    pub log_format: String,
}

/// Storage and pipeline settings
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub base: BaseConfig,
    pub storage_backend: StorageBackend,
    pub origin_bucket: String,
    pub derived_bucket: String,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, R2, etc.)
    pub public_base_url: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub max_upload_size_bytes: u64,
    pub thumbnail_quality: u8,
    pub alternate_format_quality: u8,
    pub credential_expiry_secs: u64,
    pub thumbnail_sizes: Vec<VariantSpec>,
    pub allowed_content_types: Vec<ImageContentType>,
    pub dispatch_concurrency: usize,
    pub encode_concurrency: usize,
    pub processing_timeout_secs: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PipelineConfig>);

impl Config {
    fn as_pipeline(&self) -> &PipelineConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.as_pipeline().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. `from_env` is this over the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = PipelineConfig::from_lookup(&lookup)?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_pipeline().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_pipeline().base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.as_pipeline().base.environment
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_pipeline().base.cors_origins
    }

    pub fn jwt_secret(&self) -> &str {
        &self.as_pipeline().base.jwt_secret
    }

    pub fn event_webhook_token(&self) -> &str {
        &self.as_pipeline().base.event_webhook_token
    }

    pub fn log_format(&self) -> &str {
        &self.as_pipeline().base.log_format
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.as_pipeline().storage_backend
    }

    pub fn origin_bucket(&self) -> &str {
        &self.as_pipeline().origin_bucket
    }

    pub fn derived_bucket(&self) -> &str {
        &self.as_pipeline().derived_bucket
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.as_pipeline().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_pipeline().s3_endpoint.as_deref()
    }

    pub fn public_base_url(&self) -> Option<&str> {
        self.as_pipeline().public_base_url.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.as_pipeline().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.as_pipeline().local_storage_base_url.as_deref()
    }

    pub fn max_upload_size_bytes(&self) -> u64 {
        self.as_pipeline().max_upload_size_bytes
    }

    pub fn thumbnail_quality(&self) -> u8 {
        self.as_pipeline().thumbnail_quality
    }

    pub fn alternate_format_quality(&self) -> u8 {
        self.as_pipeline().alternate_format_quality
    }

    pub fn credential_expiry(&self) -> Duration {
        Duration::from_secs(self.as_pipeline().credential_expiry_secs)
    }

    pub fn thumbnail_sizes(&self) -> &[VariantSpec] {
        &self.as_pipeline().thumbnail_sizes
    }

    pub fn allowed_content_types(&self) -> &[ImageContentType] {
        &self.as_pipeline().allowed_content_types
    }

    pub fn dispatch_concurrency(&self) -> usize {
        self.as_pipeline().dispatch_concurrency
    }

    pub fn encode_concurrency(&self) -> usize {
        self.as_pipeline().encode_concurrency
    }

    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.as_pipeline().processing_timeout_secs)
    }
}

/// `production` / `prod`, case-insensitive
pub fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

/// Parse an optional variable, failing with a message that names it.
fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", key, raw)),
        None => Ok(default),
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_thumbnail_sizes(raw: &str, quality: u8) -> Result<Vec<VariantSpec>, anyhow::Error> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            VariantSpec::parse(s, quality)
                .map_err(|e| anyhow::anyhow!("THUMBNAIL_SIZES is invalid: {}", e))
        })
        .collect()
}

fn parse_content_types(raw: &str) -> Result<Vec<ImageContentType>, anyhow::Error> {
    let mut types = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let ct = ImageContentType::parse(entry).ok_or_else(|| {
            anyhow::anyhow!("ALLOWED_CONTENT_TYPES contains an unsupported type: {}", entry)
        })?;
        if !types.contains(&ct) {
            types.push(ct);
        }
    }
    Ok(types)
}

impl PipelineConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = non_empty(lookup, "ENVIRONMENT")
            .or_else(|| non_empty(lookup, "APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins: Vec<String> = non_empty(lookup, "CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: parse_var(lookup, "PORT", 4000u16)?,
            cors_origins,
            jwt_secret: non_empty(lookup, "JWT_SECRET")
                .ok_or_else(|| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            event_webhook_token: non_empty(lookup, "EVENT_WEBHOOK_TOKEN").ok_or_else(|| {
                anyhow::anyhow!("EVENT_WEBHOOK_TOKEN must be set to accept storage notifications")
            })?,
            environment,
            log_format: non_empty(lookup, "LOG_FORMAT")
                .unwrap_or_else(|| "compact".to_string())
                .to_lowercase(),
        };

        let storage_backend = parse_var(lookup, "STORAGE_BACKEND", StorageBackend::S3)?;

        let thumbnail_quality = parse_var(lookup, "THUMBNAIL_QUALITY", DEFAULT_QUALITY)?;
        let thumbnail_sizes = parse_thumbnail_sizes(
            &non_empty(lookup, "THUMBNAIL_SIZES")
                .unwrap_or_else(|| DEFAULT_THUMBNAIL_SIZES.to_string()),
            thumbnail_quality,
        )?;
        let allowed_content_types = parse_content_types(
            &non_empty(lookup, "ALLOWED_CONTENT_TYPES")
                .unwrap_or_else(|| DEFAULT_ALLOWED_CONTENT_TYPES.to_string()),
        )?;

        let max_upload_size_mb: u64 =
            parse_var(lookup, "MAX_UPLOAD_SIZE_MB", DEFAULT_MAX_UPLOAD_SIZE_MB)?;

        let config = PipelineConfig {
            base,
            storage_backend,
            origin_bucket: non_empty(lookup, "ORIGIN_BUCKET")
                .ok_or_else(|| anyhow::anyhow!("ORIGIN_BUCKET must be set"))?,
            derived_bucket: non_empty(lookup, "DERIVED_BUCKET")
                .ok_or_else(|| anyhow::anyhow!("DERIVED_BUCKET must be set"))?,
            s3_region: non_empty(lookup, "S3_REGION").or_else(|| non_empty(lookup, "AWS_REGION")),
            s3_endpoint: non_empty(lookup, "S3_ENDPOINT"),
            public_base_url: non_empty(lookup, "PUBLIC_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string()),
            local_storage_path: non_empty(lookup, "LOCAL_STORAGE_PATH"),
            local_storage_base_url: non_empty(lookup, "LOCAL_STORAGE_BASE_URL"),
            max_upload_size_bytes: max_upload_size_mb.saturating_mul(1024 * 1024),
            thumbnail_quality,
            alternate_format_quality: parse_var(
                lookup,
                "ALTERNATE_FORMAT_QUALITY",
                DEFAULT_QUALITY,
            )?,
            credential_expiry_secs: parse_var(
                lookup,
                "CREDENTIAL_EXPIRY_SECS",
                DEFAULT_CREDENTIAL_EXPIRY_SECS,
            )?,
            thumbnail_sizes,
            allowed_content_types,
            dispatch_concurrency: parse_var(
                lookup,
                "DISPATCH_CONCURRENCY",
                DEFAULT_DISPATCH_CONCURRENCY,
            )?,
            encode_concurrency: parse_var(
                lookup,
                "ENCODE_CONCURRENCY",
                DEFAULT_ENCODE_CONCURRENCY,
            )?,
            processing_timeout_secs: parse_var(
                lookup,
                "PROCESSING_TIMEOUT_SECS",
                DEFAULT_PROCESSING_TIMEOUT_SECS,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LEN
            ));
        }

        if self.base.event_webhook_token.len() < MIN_WEBHOOK_TOKEN_LEN {
            return Err(anyhow::anyhow!(
                "EVENT_WEBHOOK_TOKEN must be at least {} characters long",
                MIN_WEBHOOK_TOKEN_LEN
            ));
        }

        if is_production_env(&self.base.environment)
            && self.base.cors_origins.iter().any(|o| o == "*")
        {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if !matches!(self.base.log_format.as_str(), "compact" | "json") {
            return Err(anyhow::anyhow!("LOG_FORMAT must be 'compact' or 'json'"));
        }

        if self.origin_bucket == self.derived_bucket {
            return Err(anyhow::anyhow!(
                "ORIGIN_BUCKET and DERIVED_BUCKET must differ"
            ));
        }

        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than zero"));
        }

        for (key, quality) in [
            ("THUMBNAIL_QUALITY", self.thumbnail_quality),
            ("ALTERNATE_FORMAT_QUALITY", self.alternate_format_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(anyhow::anyhow!("{} must be between 1 and 100", key));
            }
        }

        if self.credential_expiry_secs == 0 {
            return Err(anyhow::anyhow!(
                "CREDENTIAL_EXPIRY_SECS must be greater than zero"
            ));
        }

        if self.thumbnail_sizes.is_empty() {
            return Err(anyhow::anyhow!(
                "THUMBNAIL_SIZES must list at least one size"
            ));
        }

        // Derived keys carry only the width, so two boxes of the same width would collide.
        let mut widths = HashSet::new();
        for spec in &self.thumbnail_sizes {
            if !widths.insert(spec.width) {
                return Err(anyhow::anyhow!(
                    "THUMBNAIL_SIZES contains duplicate width {}",
                    spec.width
                ));
            }
        }

        if self.allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!(
                "ALLOWED_CONTENT_TYPES must list at least one type"
            ));
        }

        for (key, value) in [
            ("DISPATCH_CONCURRENCY", self.dispatch_concurrency),
            ("ENCODE_CONCURRENCY", self.encode_concurrency),
        ] {
            if value == 0 {
                return Err(anyhow::anyhow!("{} must be greater than zero", key));
            }
        }

        if self.processing_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "PROCESSING_TIMEOUT_SECS must be greater than zero"
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, String> {
        HashMap::from([
            ("JWT_SECRET", "x".repeat(32)),
            ("EVENT_WEBHOOK_TOKEN", "t".repeat(16)),
            ("ORIGIN_BUCKET", "origin".to_string()),
            ("DERIVED_BUCKET", "derived".to_string()),
            ("S3_REGION", "eu-west-1".to_string()),
        ])
    }

    fn load(vars: &HashMap<&'static str, String>) -> Result<Config, anyhow::Error> {
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_vars()).unwrap();
        assert_eq!(config.server_port(), 4000);
        assert_eq!(config.storage_backend(), StorageBackend::S3);
        assert_eq!(config.max_upload_size_bytes(), 10 * 1024 * 1024);
        assert_eq!(config.thumbnail_quality(), 85);
        assert_eq!(config.alternate_format_quality(), 85);
        assert_eq!(config.credential_expiry(), Duration::from_secs(3600));
        assert_eq!(config.dispatch_concurrency(), 4);
        assert_eq!(config.encode_concurrency(), 3);
        assert_eq!(config.processing_timeout(), Duration::from_secs(60));
        assert_eq!(config.allowed_content_types().len(), 4);

        let sizes: Vec<(u32, u32)> = config
            .thumbnail_sizes()
            .iter()
            .map(|s| (s.width, s.height))
            .collect();
        assert_eq!(sizes, vec![(150, 150), (300, 300), (600, 400)]);
        assert!(!config.is_production());
    }

    #[test]
    fn test_invalid_value_names_variable() {
        let mut vars = base_vars();
        vars.insert("MAX_UPLOAD_SIZE_MB", "ten".to_string());
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("MAX_UPLOAD_SIZE_MB"));
    }

    #[test]
    fn test_required_variables() {
        let mut vars = base_vars();
        vars.remove("ORIGIN_BUCKET");
        assert!(load(&vars)
            .unwrap_err()
            .to_string()
            .contains("ORIGIN_BUCKET"));

        let mut vars = base_vars();
        vars.insert("JWT_SECRET", "short".to_string());
        assert!(load(&vars).unwrap_err().to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_duplicate_thumbnail_widths_rejected() {
        let mut vars = base_vars();
        vars.insert("THUMBNAIL_SIZES", "150x150,150x100".to_string());
        assert!(load(&vars)
            .unwrap_err()
            .to_string()
            .contains("duplicate width 150"));
    }

    #[test]
    fn test_quality_range() {
        let mut vars = base_vars();
        vars.insert("THUMBNAIL_QUALITY", "0".to_string());
        assert!(load(&vars)
            .unwrap_err()
            .to_string()
            .contains("THUMBNAIL_QUALITY"));
    }

    #[test]
    fn test_wildcard_cors_rejected_in_production() {
        let mut vars = base_vars();
        vars.insert("ENVIRONMENT", "production".to_string());
        assert!(load(&vars).unwrap_err().to_string().contains("CORS_ORIGINS"));

        vars.insert("CORS_ORIGINS", "https://example.com".to_string());
        assert!(load(&vars).unwrap().is_production());
    }

    #[test]
    fn test_local_backend_requires_path() {
        let mut vars = base_vars();
        vars.insert("STORAGE_BACKEND", "local".to_string());
        assert!(load(&vars)
            .unwrap_err()
            .to_string()
            .contains("LOCAL_STORAGE_PATH"));

        vars.insert("LOCAL_STORAGE_PATH", "/tmp/imgflow".to_string());
        vars.insert("LOCAL_STORAGE_BASE_URL", "http://localhost:4000/media".to_string());
        assert_eq!(load(&vars).unwrap().storage_backend(), StorageBackend::Local);
    }
}

//! Application-wide constants.

/// Default limit for originals pulled into memory by the pipeline (10 MiB).
pub const DEFAULT_MAX_UPLOAD_SIZE_MB: u64 = 10;

/// Default JPEG quality for thumbnails and WebP quality for the alternate encode.
pub const DEFAULT_QUALITY: u8 = 85;

/// Lifetime of a presigned upload URL.
pub const DEFAULT_CREDENTIAL_EXPIRY_SECS: u64 = 3600;

/// Thumbnail boxes produced for every original, as `WxH`.
pub const DEFAULT_THUMBNAIL_SIZES: &str = "150x150,300x300,600x400";

/// Content types accepted for direct upload.
pub const DEFAULT_ALLOWED_CONTENT_TYPES: &str = "image/jpeg,image/png,image/webp,image/gif";

/// Length of the random suffix in generated object keys.
pub const UPLOAD_KEY_SUFFIX_LEN: usize = 9;

/// Width of the variant surfaced as `thumbnail` in upload responses.
pub const PRIMARY_THUMBNAIL_WIDTH: u32 = 300;

pub const DEFAULT_DISPATCH_CONCURRENCY: usize = 4;
pub const DEFAULT_ENCODE_CONCURRENCY: usize = 3;
pub const DEFAULT_PROCESSING_TIMEOUT_SECS: u64 = 60;

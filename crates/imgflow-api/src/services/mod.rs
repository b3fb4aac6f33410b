pub mod upload_authorizer;

pub use upload_authorizer::{generate_object_key, UploadAuthorizer, UploadAuthorizerConfig};

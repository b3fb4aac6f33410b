//! Application state shared by every handler.

use std::sync::Arc;

use imgflow_core::Config;
use imgflow_storage::StoragePair;
use imgflow_worker::EventDispatcher;

use crate::auth::IdentityVerifier;
use crate::services::UploadAuthorizer;

/// Built once at start-up. The authorizer and the dispatcher share no state; they only agree
/// on the key-naming rule.
pub struct AppState {
    pub config: Config,
    pub storages: StoragePair,
    pub authorizer: UploadAuthorizer,
    pub dispatcher: EventDispatcher,
    pub verifier: Arc<dyn IdentityVerifier>,
}

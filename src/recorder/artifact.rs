//! Download-reference registry
//!
//! Finished clips are exposed to the hosting UI through transient in-process
//! references. The registry holds at most one live reference: minting a new
//! one, or resetting, always revokes the previous reference first, so no
//! released clip buffer stays reachable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Transient reference to a clip's encoded bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadUrl(String);

impl DownloadUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DownloadUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owner of the single live download reference
#[derive(Default)]
pub struct ArtifactStore {
    current: Option<(DownloadUrl, Arc<Vec<u8>>)>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a reference for a finished clip, revoking any previous one
    pub fn mint(&mut self, data: Arc<Vec<u8>>) -> DownloadUrl {
        self.revoke_current();
        let url = DownloadUrl(format!("mem://clip/{}", Uuid::new_v4()));
        self.current = Some((url.clone(), data));
        url
    }

    /// Drop the live reference, if any
    pub fn revoke_current(&mut self) {
        if let Some((url, _)) = self.current.take() {
            tracing::debug!(url = %url, "download reference revoked");
        }
    }

    /// Resolve a reference to the clip bytes it points at
    ///
    /// Revoked references resolve to `None`.
    pub fn resolve(&self, url: &DownloadUrl) -> Option<Arc<Vec<u8>>> {
        match &self.current {
            Some((current, data)) if current == url => Some(Arc::clone(data)),
            _ => None,
        }
    }

    /// Whether any reference is currently live
    pub fn has_live_reference(&self) -> bool {
        self.current.is_some()
    }
}

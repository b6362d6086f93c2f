//! Mount configuration and the decorator-stack factory.
//!
//! The CLI layer fills in a [`FederationConfig`] and hands it to
//! [`build_filesystem`]; nothing in the core reads global state.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{FsError, FsResult};
use crate::federation::Federation;
use crate::fs::LeafRef;
use crate::locked::SharedLockFs;
use crate::logged::OpLogFs;
use crate::reflector::DirReflector;
use crate::types::Caller;

/// Everything needed to assemble a mountable filesystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FederationConfig {
    /// Roots of the backing leaf directories, in declaration order. Order
    /// matters: striped files claim chunks on leaves in this order.
    pub leaf_roots: Vec<PathBuf>,
    /// When set, every operation is appended to this file, one line per call.
    pub log_path: Option<PathBuf>,
}

impl FederationConfig {
    pub fn new(leaf_roots: Vec<PathBuf>) -> Self {
        FederationConfig {
            leaf_roots,
            log_path: None,
        }
    }

    pub fn with_log(mut self, log_path: PathBuf) -> Self {
        self.log_path = Some(log_path);
        self
    }
}

/// Build the decorator stack for a mount:
/// federation behind its reader/writer lock (or a bare reflector when only
/// one leaf is configured), optionally wrapped by the operation log.
pub fn build_filesystem(config: &FederationConfig, owner: Caller) -> FsResult<LeafRef> {
    if config.leaf_roots.is_empty() {
        return Err(FsError::invalid("no leaf filesystems configured"));
    }

    let mut leaves: Vec<LeafRef> = Vec::with_capacity(config.leaf_roots.len());
    for root in &config.leaf_roots {
        let abs = std::path::absolute(root)?;
        leaves.push(Arc::new(DirReflector::new(abs)?));
    }

    let base: LeafRef = if leaves.len() == 1 {
        // A single leaf needs neither striping nor the federation lock; the
        // reflector serves the mount directly.
        leaves.remove(0)
    } else {
        info!(leaves = leaves.len(), "federating leaves");
        Arc::new(SharedLockFs::new(Federation::new(owner, leaves)))
    };

    match &config.log_path {
        Some(path) => {
            info!(log = %path.display(), "operation log enabled");
            Ok(Arc::new(OpLogFs::new(base, path)?))
        }
        None => Ok(base),
    }
}

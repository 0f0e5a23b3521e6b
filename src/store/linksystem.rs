//! Link resolution: typed nodes stored as JSON blocks.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::store::blockstore::{Blockstore, Cid};
use crate::store::datastore::StoreError;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("node encoding failed: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("link {0} not found")]
    NotFound(Cid),
}

/// Resolves content ids to decoded nodes.
#[derive(Clone, Debug)]
pub struct LinkSystem {
    blocks: Blockstore,
}

impl LinkSystem {
    pub fn new(blocks: Blockstore) -> Self {
        Self { blocks }
    }

    /// Encode `node` and store it, returning the link to it.
    pub fn store<T: Serialize>(&self, node: &T) -> Result<Cid, LinkError> {
        let bytes = serde_json::to_vec(node)?;
        Ok(self.blocks.put(&bytes)?)
    }

    /// Resolve `cid` and decode the node.
    pub fn load<T: DeserializeOwned>(&self, cid: &Cid) -> Result<T, LinkError> {
        let bytes = self
            .blocks
            .get(cid)?
            .ok_or_else(|| LinkError::NotFound(cid.clone()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

//! Content-addressed block layer over the datastore.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::datastore::{Datastore, StoreError};

const CID_PREFIX: &str = "b3-";
const BLOCK_KEY_PREFIX: &str = "/blocks/";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid content id '{0}'")]
pub struct InvalidCid(pub String);

/// Content identifier: `b3-` followed by the BLAKE3 hex digest of the block.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid(String);

impl Cid {
    /// Compute the content id of `bytes`.
    pub fn of(bytes: &[u8]) -> Self {
        Self(format!("{CID_PREFIX}{}", blake3::hash(bytes).to_hex()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Cid {
    type Err = InvalidCid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digest = s
            .strip_prefix(CID_PREFIX)
            .ok_or_else(|| InvalidCid(s.to_string()))?;
        if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidCid(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Cid {
    type Error = InvalidCid;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Cid> for String {
    fn from(cid: Cid) -> Self {
        cid.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.0)
    }
}

/// Stores blocks under `/blocks/<cid>`. Pure wrapper: no lifecycle of its own.
#[derive(Clone, Debug)]
pub struct Blockstore {
    datastore: Datastore,
}

impl Blockstore {
    pub fn new(datastore: Datastore) -> Self {
        Self { datastore }
    }

    fn key(cid: &Cid) -> String {
        format!("{BLOCK_KEY_PREFIX}{cid}")
    }

    /// Store a block, returning its content id. Re-putting identical bytes is a no-op.
    pub fn put(&self, bytes: &[u8]) -> Result<Cid, StoreError> {
        let cid = Cid::of(bytes);
        let key = Self::key(&cid);
        if !self.datastore.has(&key)? {
            self.datastore.put(&key, bytes.to_vec())?;
        }
        Ok(cid)
    }

    pub fn get(&self, cid: &Cid) -> Result<Option<Vec<u8>>, StoreError> {
        self.datastore.get(&Self::key(cid))
    }

    pub fn has(&self, cid: &Cid) -> Result<bool, StoreError> {
        self.datastore.has(&Self::key(cid))
    }
}

//! Writer and read-back API for the rollup store.

use super::types::{Data, ExtendedCommitInfo, Signature, SignedHeader, State};
use crate::config::Config;
use crate::error::Result;
use crate::persistence::{decode, encode, open_store, KvStore, OpenMode, WriteBatch};
use tracing::info;

const STATE_KEY: &[u8] = b"/s";
const HEADER_PREFIX: &str = "/h/";
const DATA_PREFIX: &str = "/d/";
const SIGNATURE_PREFIX: &str = "/c/";
const EXTENDED_COMMIT_PREFIX: &str = "/ec/";
const INDEX_PREFIX: &str = "/i/";

fn height_key(prefix: &str, height: u64) -> Vec<u8> {
    format!("{}{}", prefix, height).into_bytes()
}

fn index_key(hash: &[u8]) -> Vec<u8> {
    format!("{}{}", INDEX_PREFIX, hex::encode(hash)).into_bytes()
}

/// The rollup store written by the migration.
pub struct TargetStore {
    db: Box<dyn KvStore>,
}

impl TargetStore {
    pub fn new(db: Box<dyn KvStore>) -> Self {
        Self { db }
    }

    /// Opens (creating if needed) `<target home>/<db_dir>/<namespace>`.
    pub fn open(config: &Config) -> Result<Self> {
        let dir = config.target_db_dir_path();
        let db = open_store(
            config.db_backend,
            &dir,
            &config.migration.namespace,
            OpenMode::ReadWrite,
        )?;
        info!(
            "Opened target store {} in {}",
            config.migration.namespace,
            dir.display()
        );
        Ok(Self::new(db))
    }

    pub fn update_state(&self, state: &State) -> Result<()> {
        self.db.set(STATE_KEY, &encode(state)?)
    }

    /// Writes header, data, signature and the hash index in one batch.
    pub fn save_block_data(
        &self,
        header: &SignedHeader,
        data: &Data,
        signature: &Signature,
    ) -> Result<()> {
        let height = header.header.height();
        let mut batch = WriteBatch::new();
        batch.put(height_key(HEADER_PREFIX, height), encode(header)?);
        batch.put(height_key(DATA_PREFIX, height), encode(data)?);
        batch.put(height_key(SIGNATURE_PREFIX, height), encode(signature)?);
        batch.put(index_key(&header.header.hash()), encode(&height)?);
        self.db.write_batch(batch)
    }

    pub fn save_extended_commit(&self, height: u64, info: &ExtendedCommitInfo) -> Result<()> {
        self.db
            .set(&height_key(EXTENDED_COMMIT_PREFIX, height), &encode(info)?)
    }

    pub fn load_state(&self) -> Result<Option<State>> {
        self.get(STATE_KEY)
    }

    pub fn get_block_data(&self, height: u64) -> Result<Option<(SignedHeader, Data)>> {
        let header = self.get(&height_key(HEADER_PREFIX, height))?;
        let data = self.get(&height_key(DATA_PREFIX, height))?;
        Ok(header.zip(data))
    }

    pub fn get_signature(&self, height: u64) -> Result<Option<Signature>> {
        self.get(&height_key(SIGNATURE_PREFIX, height))
    }

    pub fn get_extended_commit(&self, height: u64) -> Result<Option<ExtendedCommitInfo>> {
        self.get(&height_key(EXTENDED_COMMIT_PREFIX, height))
    }

    pub fn height_for_hash(&self, hash: &[u8]) -> Result<Option<u64>> {
        self.get(&index_key(hash))
    }

    /// Heights with a stored header, ascending.
    pub fn block_heights(&self) -> Result<Vec<u64>> {
        self.heights(HEADER_PREFIX)
    }

    /// Heights with a stored extended commit, ascending.
    pub fn extended_commit_heights(&self) -> Result<Vec<u64>> {
        self.heights(EXTENDED_COMMIT_PREFIX)
    }

    /// Every record in the store, in key order.
    pub fn dump(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.db.iter_prefix(b"/")
    }

    fn get<T: serde::de::DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn heights(&self, prefix: &str) -> Result<Vec<u64>> {
        let mut heights: Vec<u64> = self
            .db
            .iter_prefix(prefix.as_bytes())?
            .into_iter()
            .filter_map(|(key, _)| {
                std::str::from_utf8(&key[prefix.len()..])
                    .ok()
                    .and_then(|h| h.parse().ok())
            })
            .collect();
        heights.sort_unstable();
        Ok(heights)
    }
}

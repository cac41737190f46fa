//! Read-only access to the consensus node's block and state stores.

use super::types::{Block, BlockStoreState, ExtendedCommit, State};
use crate::config::Config;
use crate::error::{MigrationError, Result};
use crate::persistence::{db_file, decode, open_store, KvStore, OpenMode};
use tracing::info;

pub const BLOCK_STORE_DB: &str = "blockstore";
pub const STATE_DB: &str = "state";

pub const BLOCK_STORE_STATE_KEY: &[u8] = b"blockStore";
pub const STATE_KEY: &[u8] = b"stateKey";

pub fn block_key(height: i64) -> Vec<u8> {
    format!("H:{}", height).into_bytes()
}

pub fn extended_commit_key(height: i64) -> Vec<u8> {
    format!("EC:{}", height).into_bytes()
}

/// Read-only view over the node's block store.
pub struct BlockStore {
    db: Box<dyn KvStore>,
}

impl BlockStore {
    pub fn new(db: Box<dyn KvStore>) -> Self {
        Self { db }
    }

    /// Base and height recorded by the node; zero when never written.
    pub fn store_state(&self) -> Result<BlockStoreState> {
        match self.db.get(BLOCK_STORE_STATE_KEY)? {
            Some(bytes) => decode(&bytes),
            None => Ok(BlockStoreState::default()),
        }
    }

    pub fn base(&self) -> Result<i64> {
        Ok(self.store_state()?.base)
    }

    pub fn height(&self) -> Result<i64> {
        Ok(self.store_state()?.height)
    }

    pub fn load_block(&self, height: i64) -> Result<Block> {
        let bytes = self.db.get(&block_key(height))?.ok_or(MigrationError::NotFound {
            record: "block",
            height,
        })?;
        decode(&bytes)
    }

    /// Only meaningful for heights at which vote extensions were enabled.
    pub fn load_block_extended_commit(&self, height: i64) -> Result<ExtendedCommit> {
        let bytes = self
            .db
            .get(&extended_commit_key(height))?
            .ok_or(MigrationError::NotFound {
                record: "extended commit",
                height,
            })?;
        decode(&bytes)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StateStoreOptions {
    pub discard_abci_responses: bool,
}

/// Read-only view over the node's state store.
pub struct StateStore {
    db: Box<dyn KvStore>,
    options: StateStoreOptions,
}

impl StateStore {
    pub fn new(db: Box<dyn KvStore>, options: StateStoreOptions) -> Self {
        Self { db, options }
    }

    pub fn options(&self) -> StateStoreOptions {
        self.options
    }

    pub fn load(&self) -> Result<State> {
        let bytes = self
            .db
            .get(STATE_KEY)?
            .ok_or(MigrationError::EmptyStore(STATE_DB))?;
        decode(&bytes)
    }
}

/// Opens the block and state stores under the configured database directory.
///
/// Both backing files must already exist; nothing is created on the source side.
pub fn open_source_stores(config: &Config) -> Result<(BlockStore, StateStore)> {
    let db_dir = config.db_dir_path();
    let backend = config.db_backend;

    if !db_file(&db_dir, BLOCK_STORE_DB).exists() {
        return Err(MigrationError::StoreMissing {
            store: "blockstore",
            dir: db_dir,
        });
    }
    let block_store = BlockStore::new(open_store(
        backend,
        &db_dir,
        BLOCK_STORE_DB,
        OpenMode::ReadOnly,
    )?);

    if !db_file(&db_dir, STATE_DB).exists() {
        return Err(MigrationError::StoreMissing {
            store: "statestore",
            dir: db_dir,
        });
    }
    let options = StateStoreOptions {
        discard_abci_responses: config.storage.discard_abci_responses,
    };
    let state_store = StateStore::new(
        open_store(backend, &db_dir, STATE_DB, OpenMode::ReadOnly)?,
        options,
    );

    info!(
        "Opened source stores in {} (backend = {})",
        db_dir.display(),
        backend
    );

    Ok((block_store, state_store))
}

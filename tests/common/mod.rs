//! Shared fixtures: a consensus node home with SQLite block and state stores.

use chainport::config::Config;
use chainport::persistence::{db_file, encode, KvStore, OpenMode, SqliteStore};
use chainport::source::{
    block_key, extended_commit_key, Block, BlockId, BlockIdFlag, BlockStoreState, Commit,
    CommitSig, ConsensusParams, ConsensusVersion, Data, ExtendedCommit, ExtendedCommitSig, Header,
    PartSetHeader, PubKey, State, StateVersion, Validator, ValidatorSet, BLOCK_STORE_DB,
    BLOCK_STORE_STATE_KEY, STATE_DB, STATE_KEY,
};
use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;

pub const CHAIN_ID: &str = "migration-test-1";
pub const VALIDATORS: u8 = 4;

pub fn address(tag: u8) -> Vec<u8> {
    vec![tag; 20]
}

fn validator_set(tags: &[u8]) -> ValidatorSet {
    let validators: Vec<Validator> = tags
        .iter()
        .map(|tag| Validator {
            address: address(*tag),
            pub_key: PubKey {
                key_type: "ed25519".to_string(),
                bytes: vec![*tag; 32],
            },
            voting_power: *tag as i64 * 10,
            proposer_priority: 0,
        })
        .collect();
    ValidatorSet {
        proposer: validators.first().cloned(),
        validators,
    }
}

/// Validators 1..=4; the proposer of height `h` is `h % 4 + 1`.
pub fn proposer_of(height: i64) -> u8 {
    (height % VALIDATORS as i64) as u8 + 1
}

pub fn chain_state(height: i64, extensions_from: i64) -> State {
    let all: Vec<u8> = (1..=VALIDATORS).collect();
    let mut consensus_params = ConsensusParams::default();
    consensus_params.abci.vote_extensions_enable_height = extensions_from;

    State {
        version: StateVersion {
            consensus: ConsensusVersion { block: 11, app: 1 },
            software: "0.38.12".to_string(),
        },
        chain_id: CHAIN_ID.to_string(),
        initial_height: 1,
        last_block_height: height,
        last_block_id: BlockId {
            hash: vec![0xAB; 32],
            part_set_header: PartSetHeader {
                total: 1,
                hash: vec![0xCD; 32],
            },
        },
        last_block_time: block_time(height),
        next_validators: validator_set(&all),
        validators: validator_set(&all),
        last_validators: validator_set(&all[..3]),
        last_height_validators_changed: 1,
        consensus_params,
        last_height_consensus_params_changed: 1,
        last_results_hash: vec![0x11; 32],
        app_hash: vec![0x22; 32],
    }
}

fn block_time(height: i64) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(6 * height)
}

fn commit_sig(tag: u8, height: i64) -> CommitSig {
    CommitSig {
        block_id_flag: BlockIdFlag::Commit,
        validator_address: address(tag),
        timestamp: block_time(height),
        signature: vec![tag, (height % 251) as u8, 0x5E],
    }
}

pub fn block(height: i64) -> Block {
    Block {
        header: Header {
            version: ConsensusVersion { block: 11, app: 1 },
            chain_id: CHAIN_ID.to_string(),
            height,
            time: block_time(height),
            last_block_id: BlockId {
                hash: (height - 1).to_be_bytes().repeat(4),
                part_set_header: PartSetHeader::default(),
            },
            last_commit_hash: vec![0x01; 32],
            data_hash: height.to_be_bytes().repeat(4),
            validators_hash: vec![0x03; 32],
            next_validators_hash: vec![0x03; 32],
            consensus_hash: vec![0x04; 32],
            app_hash: vec![0x05; 32],
            last_results_hash: vec![0x06; 32],
            evidence_hash: Vec::new(),
            proposer_address: address(proposer_of(height)),
        },
        data: Data {
            txs: (0..(height % 5))
                .map(|i| format!("tx-{}-{}", height, i).into_bytes())
                .collect(),
        },
        last_commit: Commit {
            height: height - 1,
            round: 0,
            block_id: BlockId::default(),
            signatures: (1..=VALIDATORS).map(|tag| commit_sig(tag, height)).collect(),
        },
    }
}

pub fn extended_commit(height: i64) -> ExtendedCommit {
    ExtendedCommit {
        height,
        round: 1,
        block_id: BlockId::default(),
        extended_signatures: (1..=VALIDATORS)
            .map(|tag| ExtendedCommitSig {
                commit_sig: commit_sig(tag, height),
                extension: format!("oracle-{}-{}", tag, height).into_bytes(),
                extension_signature: vec![tag, 0xE5],
            })
            .collect(),
    }
}

/// A node home holding `height` blocks, with extended commits from
/// `extensions_from` (0 disables them).
pub struct NodeHome {
    pub dir: TempDir,
}

impl NodeHome {
    pub fn new(height: i64, extensions_from: i64) -> Self {
        let home = NodeHome {
            dir: TempDir::new().unwrap(),
        };
        let db_dir = home.config().db_dir_path();

        let states = SqliteStore::open(&db_file(&db_dir, STATE_DB), OpenMode::ReadWrite).unwrap();
        states
            .set(STATE_KEY, &encode(&chain_state(height, extensions_from)).unwrap())
            .unwrap();

        let blocks =
            SqliteStore::open(&db_file(&db_dir, BLOCK_STORE_DB), OpenMode::ReadWrite).unwrap();
        for h in 1..=height {
            blocks.set(&block_key(h), &encode(&block(h)).unwrap()).unwrap();
            if extensions_from > 0 && h >= extensions_from {
                blocks
                    .set(&extended_commit_key(h), &encode(&extended_commit(h)).unwrap())
                    .unwrap();
            }
        }
        let range = BlockStoreState { base: 1, height };
        blocks
            .set(BLOCK_STORE_STATE_KEY, &encode(&range).unwrap())
            .unwrap();

        home
    }

    pub fn config(&self) -> Config {
        Config::with_root(self.dir.path())
    }

    /// Config writing the rollup store under a separate home.
    pub fn config_with_target(&self, target: &TempDir) -> Config {
        let mut config = self.config();
        config.migration.target_root_dir = Some(target.path().to_path_buf());
        config
    }
}

//! Records persisted by the consensus node: the state snapshot, blocks and
//! extended commits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Hash = Vec<u8>;
pub type Address = Vec<u8>;
pub type Tx = Vec<u8>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusVersion {
    pub block: u64,
    pub app: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateVersion {
    pub consensus: ConsensusVersion,
    pub software: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartSetHeader {
    pub total: u32,
    #[serde(with = "serde_bytes")]
    pub hash: Hash,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockId {
    #[serde(with = "serde_bytes")]
    pub hash: Hash,
    pub part_set_header: PartSetHeader,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKey {
    pub key_type: String,
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    #[serde(with = "serde_bytes")]
    pub address: Address,
    pub pub_key: PubKey,
    pub voting_power: i64,
    pub proposer_priority: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSet {
    pub validators: Vec<Validator>,
    pub proposer: Option<Validator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockParams {
    pub max_bytes: i64,
    pub max_gas: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceParams {
    pub max_age_num_blocks: i64,
    pub max_age_duration: std::time::Duration,
    pub max_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorParams {
    pub pub_key_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionParams {
    pub app: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbciParams {
    /// First height at which vote extensions are required; 0 disables them.
    pub vote_extensions_enable_height: i64,
}

impl AbciParams {
    pub fn vote_extensions_enabled(&self, height: i64) -> bool {
        self.vote_extensions_enable_height > 0 && height >= self.vote_extensions_enable_height
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParams {
    pub block: BlockParams,
    pub evidence: EvidenceParams,
    pub validator: ValidatorParams,
    pub version: VersionParams,
    pub abci: AbciParams,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            block: BlockParams {
                max_bytes: 22_020_096,
                max_gas: -1,
            },
            evidence: EvidenceParams {
                max_age_num_blocks: 100_000,
                max_age_duration: std::time::Duration::from_secs(48 * 60 * 60),
                max_bytes: 1_048_576,
            },
            validator: ValidatorParams {
                pub_key_types: vec!["ed25519".to_string()],
            },
            version: VersionParams { app: 0 },
            abci: AbciParams::default(),
        }
    }
}

/// Consensus state as of the last committed height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub version: StateVersion,
    pub chain_id: String,
    pub initial_height: i64,

    pub last_block_height: i64,
    pub last_block_id: BlockId,
    pub last_block_time: DateTime<Utc>,

    pub next_validators: ValidatorSet,
    pub validators: ValidatorSet,
    pub last_validators: ValidatorSet,
    pub last_height_validators_changed: i64,

    pub consensus_params: ConsensusParams,
    pub last_height_consensus_params_changed: i64,

    #[serde(with = "serde_bytes")]
    pub last_results_hash: Hash,
    #[serde(with = "serde_bytes")]
    pub app_hash: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: ConsensusVersion,
    pub chain_id: String,
    pub height: i64,
    pub time: DateTime<Utc>,
    pub last_block_id: BlockId,

    #[serde(with = "serde_bytes")]
    pub last_commit_hash: Hash,
    #[serde(with = "serde_bytes")]
    pub data_hash: Hash,

    #[serde(with = "serde_bytes")]
    pub validators_hash: Hash,
    #[serde(with = "serde_bytes")]
    pub next_validators_hash: Hash,
    #[serde(with = "serde_bytes")]
    pub consensus_hash: Hash,
    #[serde(with = "serde_bytes")]
    pub app_hash: Hash,
    #[serde(with = "serde_bytes")]
    pub last_results_hash: Hash,

    #[serde(with = "serde_bytes")]
    pub evidence_hash: Hash,
    #[serde(with = "serde_bytes")]
    pub proposer_address: Address,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    pub txs: Vec<Tx>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum BlockIdFlag {
    #[default]
    Unknown = 0,
    Absent = 1,
    Commit = 2,
    Nil = 3,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSig {
    pub block_id_flag: BlockIdFlag,
    #[serde(with = "serde_bytes")]
    pub validator_address: Address,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub height: i64,
    pub round: i32,
    pub block_id: BlockId,
    pub signatures: Vec<CommitSig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: Header,
    pub data: Data,
    pub last_commit: Commit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedCommitSig {
    pub commit_sig: CommitSig,
    #[serde(with = "serde_bytes")]
    pub extension: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub extension_signature: Vec<u8>,
}

/// Commit for a height at which vote extensions were required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedCommit {
    pub height: i64,
    pub round: i32,
    pub block_id: BlockId,
    pub extended_signatures: Vec<ExtendedCommitSig>,
}

/// Range of heights held by the block store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStoreState {
    pub base: i64,
    pub height: i64,
}

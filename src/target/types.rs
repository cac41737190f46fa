//! Records in the rollup store schema.

use crate::source::{Address, BlockId, BlockIdFlag, Hash, StateVersion, Tx, ValidatorSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Data-availability height assigned to a freshly migrated chain.
pub const INITIAL_DA_HEIGHT: u64 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duration {
    pub seconds: i64,
    pub nanos: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockParamsRecord {
    pub max_bytes: i64,
    pub max_gas: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceParamsRecord {
    pub max_age_num_blocks: i64,
    pub max_age_duration: Duration,
    pub max_bytes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorParamsRecord {
    pub pub_key_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionParamsRecord {
    pub app: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbciParamsRecord {
    pub vote_extensions_enable_height: i64,
}

/// Wire form of the consensus parameters: every section is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusParamsRecord {
    pub block: Option<BlockParamsRecord>,
    pub evidence: Option<EvidenceParamsRecord>,
    pub validator: Option<ValidatorParamsRecord>,
    pub version: Option<VersionParamsRecord>,
    pub abci: Option<AbciParamsRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub version: StateVersion,
    pub chain_id: String,
    pub initial_height: u64,

    pub last_block_height: u64,
    pub last_block_id: BlockId,
    pub last_block_time: DateTime<Utc>,

    pub da_height: u64,

    pub consensus_params: ConsensusParamsRecord,
    pub last_height_consensus_params_changed: u64,

    #[serde(with = "serde_bytes")]
    pub last_results_hash: Hash,
    #[serde(with = "serde_bytes")]
    pub app_hash: Hash,

    pub validators: ValidatorSet,
    pub next_validators: ValidatorSet,
    pub last_validators: ValidatorSet,
    pub last_height_validators_changed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseHeader {
    pub height: u64,
    /// Unix time in nanoseconds.
    pub time: u64,
    pub chain_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub block: u64,
    pub app: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub base: BaseHeader,
    pub version: Version,

    #[serde(with = "serde_bytes")]
    pub last_header_hash: Hash,
    #[serde(with = "serde_bytes")]
    pub last_commit_hash: Hash,
    #[serde(with = "serde_bytes")]
    pub data_hash: Hash,
    #[serde(with = "serde_bytes")]
    pub consensus_hash: Hash,
    #[serde(with = "serde_bytes")]
    pub app_hash: Hash,
    #[serde(with = "serde_bytes")]
    pub last_results_hash: Hash,
    #[serde(with = "serde_bytes")]
    pub validator_hash: Hash,
    #[serde(with = "serde_bytes")]
    pub proposer_address: Address,
}

impl Header {
    pub fn height(&self) -> u64 {
        self.base.height
    }

    /// SHA-256 over the encoded header fields.
    pub fn hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.base.height.to_le_bytes());
        hasher.update(self.base.time.to_le_bytes());
        hasher.update(self.base.chain_id.as_bytes());
        hasher.update(self.version.block.to_le_bytes());
        hasher.update(self.version.app.to_le_bytes());
        for field in [
            &self.last_header_hash,
            &self.last_commit_hash,
            &self.data_hash,
            &self.consensus_hash,
            &self.app_hash,
            &self.last_results_hash,
            &self.validator_hash,
            &self.proposer_address,
        ] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        hasher.finalize().into()
    }
}

/// Proposer signature over a block; empty when none was recovered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "serde_bytes")] pub Vec<u8>);

impl Signature {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedHeader {
    pub header: Header,
    pub signature: Signature,
    pub validators: ValidatorSet,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub chain_id: String,
    pub height: u64,
    pub time: u64,
    #[serde(with = "serde_bytes")]
    pub last_data_hash: Hash,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    pub metadata: Metadata,
    pub txs: Vec<Tx>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteValidator {
    #[serde(with = "serde_bytes")]
    pub address: Address,
    pub power: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedVoteInfo {
    pub validator: VoteValidator,
    #[serde(with = "serde_bytes")]
    pub vote_extension: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub extension_signature: Vec<u8>,
    pub block_id_flag: BlockIdFlag,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedCommitInfo {
    pub round: i32,
    pub votes: Vec<ExtendedVoteInfo>,
}

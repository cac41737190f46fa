//! Pure mappings from consensus-node records to rollup records.
//!
//! Nothing in this module touches a store, so every mapping can be exercised
//! against literal records.

use crate::error::{MigrationError, Result};
use crate::source::{self, Address, BlockIdFlag, ConsensusParams, ValidatorSet};
use crate::target::{
    self, AbciParamsRecord, BaseHeader, BlockParamsRecord, ConsensusParamsRecord, Duration,
    EvidenceParamsRecord, ExtendedCommitInfo, ExtendedVoteInfo, Header, Metadata, Signature,
    SignedHeader, ValidatorParamsRecord, Version, VersionParamsRecord, VoteValidator,
    INITIAL_DA_HEIGHT,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Unix time in nanoseconds, wrapping like a signed-to-unsigned cast for
/// pre-epoch times. Times past the nanosecond range map to zero.
pub fn unix_nanos(time: &DateTime<Utc>) -> u64 {
    time.timestamp_nanos_opt().unwrap_or_default() as u64
}

fn height_to_u64(field: &str, height: i64) -> Result<u64> {
    u64::try_from(height)
        .map_err(|_| MigrationError::InvalidRecord(format!("{} is negative: {}", field, height)))
}

pub fn consensus_params_to_wire(params: &ConsensusParams) -> ConsensusParamsRecord {
    let max_age = params.evidence.max_age_duration;
    ConsensusParamsRecord {
        block: Some(BlockParamsRecord {
            max_bytes: params.block.max_bytes,
            max_gas: params.block.max_gas,
        }),
        evidence: Some(EvidenceParamsRecord {
            max_age_num_blocks: params.evidence.max_age_num_blocks,
            max_age_duration: Duration {
                seconds: max_age.as_secs() as i64,
                nanos: max_age.subsec_nanos() as i32,
            },
            max_bytes: params.evidence.max_bytes,
        }),
        validator: Some(ValidatorParamsRecord {
            pub_key_types: params.validator.pub_key_types.clone(),
        }),
        version: Some(VersionParamsRecord {
            app: params.version.app,
        }),
        abci: Some(AbciParamsRecord {
            vote_extensions_enable_height: params.abci.vote_extensions_enable_height,
        }),
    }
}

/// Maps the final consensus state onto the rollup state.
///
/// The migration height becomes the rollup's initial height, and the DA
/// height starts at its minimum since no DA history is carried over.
pub fn transform_state(state: &source::State) -> Result<target::State> {
    let last_block_height = height_to_u64("last_block_height", state.last_block_height)?;

    Ok(target::State {
        version: state.version.clone(),
        chain_id: state.chain_id.clone(),
        initial_height: last_block_height,

        last_block_height,
        last_block_id: state.last_block_id.clone(),
        last_block_time: state.last_block_time,

        da_height: INITIAL_DA_HEIGHT,

        consensus_params: consensus_params_to_wire(&state.consensus_params),
        last_height_consensus_params_changed: height_to_u64(
            "last_height_consensus_params_changed",
            state.last_height_consensus_params_changed,
        )?,

        last_results_hash: state.last_results_hash.clone(),
        app_hash: state.app_hash.clone(),

        validators: state.validators.clone(),
        next_validators: state.next_validators.clone(),
        last_validators: state.last_validators.clone(),
        last_height_validators_changed: state.last_height_validators_changed,
    })
}

/// The commit signature of the block's proposer, or an empty signature when
/// the proposer did not sign the last commit. First match wins.
pub fn proposer_signature(block: &source::Block) -> Signature {
    let proposer = &block.header.proposer_address;
    block
        .last_commit
        .signatures
        .iter()
        .find(|sig| &sig.validator_address == proposer)
        .map(|sig| Signature(sig.signature.clone()))
        .unwrap_or_default()
}

/// Maps one block onto the rollup header, data and signature.
///
/// The header carries `state.validators`, the set as of the migration point,
/// for every height: per-height validator history is not reconstructed.
///
/// `last_header_hash` is filled with the block's last-commit hash, not the
/// hash in `last_block_id`. Both header fields therefore hold the same bytes,
/// which rollup readers expecting the previous header hash will not match.
pub fn transform_block(
    block: &source::Block,
    state: &source::State,
) -> (SignedHeader, target::Data, Signature) {
    let signature = proposer_signature(block);
    let h = &block.header;
    let height = h.height as u64;
    let time = unix_nanos(&h.time);

    let header = SignedHeader {
        header: Header {
            base: BaseHeader {
                height,
                time,
                chain_id: h.chain_id.clone(),
            },
            version: Version {
                block: h.version.block,
                app: h.version.app,
            },
            last_header_hash: h.last_commit_hash.clone(),
            last_commit_hash: h.last_commit_hash.clone(),
            data_hash: h.data_hash.clone(),
            consensus_hash: h.consensus_hash.clone(),
            app_hash: h.app_hash.clone(),
            last_results_hash: h.last_results_hash.clone(),
            validator_hash: h.validators_hash.clone(),
            proposer_address: h.proposer_address.clone(),
        },
        signature: signature.clone(),
        validators: ValidatorSet {
            validators: state.validators.validators.clone(),
            proposer: state.validators.proposer.clone(),
        },
    };

    let data = target::Data {
        metadata: Metadata {
            chain_id: h.chain_id.clone(),
            height,
            time,
            last_data_hash: h.data_hash.clone(),
        },
        txs: block.data.txs.clone(),
    };

    (header, data, signature)
}

/// Voting power by validator address.
#[derive(Debug, Clone, Default)]
pub struct VotingPowers {
    powers: HashMap<Address, i64>,
}

impl VotingPowers {
    /// Indexes a validator set. A repeated address keeps its first power.
    pub fn from_validator_set(set: &ValidatorSet) -> Self {
        let mut powers = HashMap::with_capacity(set.validators.len());
        for validator in &set.validators {
            powers
                .entry(validator.address.clone())
                .or_insert(validator.voting_power);
        }
        Self { powers }
    }

    /// Zero for addresses outside the set.
    pub fn power_of(&self, address: &[u8]) -> i64 {
        self.powers.get(address).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.powers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.powers.is_empty()
    }
}

/// Maps an extended commit onto the rollup's extended commit info.
///
/// Votes are the non-absent signatures in validator order; powers come from
/// `powers`, built from the state's last validator set.
pub fn transform_extended_commit(
    commit: &source::ExtendedCommit,
    powers: &VotingPowers,
) -> ExtendedCommitInfo {
    let votes = commit
        .extended_signatures
        .iter()
        .filter(|ext| ext.commit_sig.block_id_flag != BlockIdFlag::Absent)
        .map(|ext| {
            let address = &ext.commit_sig.validator_address;
            ExtendedVoteInfo {
                validator: VoteValidator {
                    address: address.clone(),
                    power: powers.power_of(address),
                },
                vote_extension: ext.extension.clone(),
                extension_signature: ext.extension_signature.clone(),
                block_id_flag: ext.commit_sig.block_id_flag,
            }
        })
        .collect();

    ExtendedCommitInfo {
        round: commit.round,
        votes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{
        Block, BlockId, Commit, CommitSig, ConsensusVersion, Data, ExtendedCommit,
        ExtendedCommitSig, Header as SourceHeader, PartSetHeader, PubKey, State, StateVersion,
        Validator,
    };
    use chrono::TimeZone;

    fn validator(tag: u8, power: i64) -> Validator {
        Validator {
            address: vec![tag; 20],
            pub_key: PubKey {
                key_type: "ed25519".to_string(),
                bytes: vec![tag; 32],
            },
            voting_power: power,
            proposer_priority: 0,
        }
    }

    fn validator_set(validators: Vec<Validator>) -> ValidatorSet {
        let proposer = validators.first().cloned();
        ValidatorSet {
            validators,
            proposer,
        }
    }

    fn test_state(height: i64) -> State {
        State {
            version: StateVersion {
                consensus: ConsensusVersion { block: 11, app: 1 },
                software: "0.38.0".to_string(),
            },
            chain_id: "test-chain".to_string(),
            initial_height: 1,
            last_block_height: height,
            last_block_id: BlockId {
                hash: vec![0xBB; 32],
                part_set_header: PartSetHeader {
                    total: 1,
                    hash: vec![0xCC; 32],
                },
            },
            last_block_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            next_validators: validator_set(vec![validator(1, 10), validator(2, 20)]),
            validators: validator_set(vec![validator(1, 10), validator(2, 20)]),
            last_validators: validator_set(vec![validator(1, 10), validator(3, 30)]),
            last_height_validators_changed: 1,
            consensus_params: ConsensusParams::default(),
            last_height_consensus_params_changed: 1,
            last_results_hash: vec![0xDD; 32],
            app_hash: vec![0xEE; 32],
        }
    }

    fn commit_sig(tag: u8, flag: BlockIdFlag) -> CommitSig {
        CommitSig {
            block_id_flag: flag,
            validator_address: vec![tag; 20],
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 5).unwrap(),
            signature: vec![tag, 0x51, 0x61],
        }
    }

    fn test_block(height: i64, proposer: u8, signers: &[u8], txs: Vec<Vec<u8>>) -> Block {
        Block {
            header: SourceHeader {
                version: ConsensusVersion { block: 11, app: 1 },
                chain_id: "test-chain".to_string(),
                height,
                time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                last_block_id: BlockId {
                    hash: vec![0x01; 32],
                    part_set_header: PartSetHeader::default(),
                },
                last_commit_hash: vec![0x02; 32],
                data_hash: vec![0x03; 32],
                validators_hash: vec![0x04; 32],
                next_validators_hash: vec![0x05; 32],
                consensus_hash: vec![0x06; 32],
                app_hash: vec![0x07; 32],
                last_results_hash: vec![0x08; 32],
                evidence_hash: vec![0x09; 32],
                proposer_address: vec![proposer; 20],
            },
            data: Data { txs },
            last_commit: Commit {
                height: height - 1,
                round: 0,
                block_id: BlockId::default(),
                signatures: signers
                    .iter()
                    .map(|tag| commit_sig(*tag, BlockIdFlag::Commit))
                    .collect(),
            },
        }
    }

    #[test]
    fn test_state_initial_and_da_height() {
        for height in [1, 100, 5_000_000] {
            let migrated = transform_state(&test_state(height)).unwrap();
            assert_eq!(migrated.initial_height, height as u64);
            assert_eq!(migrated.last_block_height, height as u64);
            assert_eq!(migrated.da_height, 1);
        }
    }

    #[test]
    fn test_state_carries_fields_verbatim() {
        let state = test_state(100);
        let migrated = transform_state(&state).unwrap();

        assert_eq!(migrated.chain_id, state.chain_id);
        assert_eq!(migrated.version, state.version);
        assert_eq!(migrated.last_block_id, state.last_block_id);
        assert_eq!(migrated.last_block_time, state.last_block_time);
        assert_eq!(migrated.app_hash, state.app_hash);
        assert_eq!(migrated.last_results_hash, state.last_results_hash);
        assert_eq!(migrated.validators, state.validators);
        assert_eq!(migrated.next_validators, state.next_validators);
        assert_eq!(migrated.last_validators, state.last_validators);
        assert_eq!(migrated.last_height_validators_changed, 1);
        assert_eq!(migrated.last_height_consensus_params_changed, 1);
    }

    #[test]
    fn test_state_rejects_negative_height() {
        let mut state = test_state(10);
        state.last_height_consensus_params_changed = -1;
        assert!(matches!(
            transform_state(&state),
            Err(MigrationError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_consensus_params_wire_form() {
        let mut params = ConsensusParams::default();
        params.evidence.max_age_duration = std::time::Duration::new(172_800, 500);
        params.abci.vote_extensions_enable_height = 50;

        let wire = consensus_params_to_wire(&params);
        let evidence = wire.evidence.unwrap();
        assert_eq!(evidence.max_age_duration.seconds, 172_800);
        assert_eq!(evidence.max_age_duration.nanos, 500);
        assert_eq!(wire.abci.unwrap().vote_extensions_enable_height, 50);
        assert_eq!(wire.block.unwrap().max_gas, -1);
    }

    #[test]
    fn test_block_preserves_txs_in_order() {
        let txs: Vec<Vec<u8>> = (0..25u8).map(|i| vec![i; (i as usize) + 1]).collect();
        let block = test_block(42, 1, &[1, 2], txs.clone());

        let (_, data, _) = transform_block(&block, &test_state(100));
        assert_eq!(data.txs.len(), txs.len());
        assert_eq!(data.txs, txs);
    }

    #[test]
    fn test_block_without_txs() {
        let block = test_block(3, 1, &[1], Vec::new());
        let (_, data, _) = transform_block(&block, &test_state(100));
        assert!(data.txs.is_empty());
    }

    #[test]
    fn test_proposer_signature_is_extracted() {
        let block = test_block(42, 2, &[1, 2, 3], Vec::new());
        let (header, _, signature) = transform_block(&block, &test_state(100));

        assert_eq!(signature.as_bytes(), &[2, 0x51, 0x61]);
        assert_eq!(header.signature, signature);
    }

    #[test]
    fn test_first_matching_signature_wins() {
        let mut block = test_block(42, 2, &[2], Vec::new());
        let mut duplicate = commit_sig(2, BlockIdFlag::Commit);
        duplicate.signature = vec![0xFF];
        block.last_commit.signatures.push(duplicate);

        assert_eq!(proposer_signature(&block).as_bytes(), &[2, 0x51, 0x61]);
    }

    #[test]
    fn test_missing_proposer_signature_is_empty() {
        let block = test_block(42, 9, &[1, 2, 3], Vec::new());
        let (header, _, signature) = transform_block(&block, &test_state(100));

        assert!(signature.is_empty());
        assert!(header.signature.is_empty());
    }

    #[test]
    fn test_header_copies_hashes_and_uses_current_validators() {
        let state = test_state(100);
        let block = test_block(42, 1, &[1], Vec::new());
        let (signed, data, _) = transform_block(&block, &state);
        let header = &signed.header;

        assert_eq!(header.height(), 42);
        assert_eq!(header.base.chain_id, "test-chain");
        assert_eq!(header.base.time, 1_704_067_200_000_000_000);
        assert_eq!(header.version, Version { block: 11, app: 1 });
        assert_eq!(header.last_header_hash, block.header.last_commit_hash);
        assert_ne!(header.last_header_hash, block.header.last_block_id.hash);
        assert_eq!(header.last_commit_hash, block.header.last_commit_hash);
        assert_eq!(header.data_hash, block.header.data_hash);
        assert_eq!(header.consensus_hash, block.header.consensus_hash);
        assert_eq!(header.app_hash, block.header.app_hash);
        assert_eq!(header.last_results_hash, block.header.last_results_hash);
        assert_eq!(header.validator_hash, block.header.validators_hash);
        assert_eq!(header.proposer_address, block.header.proposer_address);
        assert_eq!(signed.validators, state.validators);

        assert_eq!(data.metadata.height, 42);
        assert_eq!(data.metadata.time, header.base.time);
        assert_eq!(data.metadata.last_data_hash, block.header.data_hash);
    }

    #[test]
    fn test_last_header_hash_takes_last_commit_hash() {
        let mut block = test_block(7, 1, &[1], Vec::new());
        block.header.last_block_id.hash = vec![0xAA; 32];
        block.header.last_commit_hash = vec![0xCC; 32];

        let (signed, _, _) = transform_block(&block, &test_state(100));
        assert_eq!(signed.header.last_header_hash, vec![0xCC; 32]);
        assert_eq!(signed.header.last_commit_hash, vec![0xCC; 32]);
    }

    #[test]
    fn test_unix_nanos_before_epoch_wraps() {
        let time = Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(unix_nanos(&time), (-1_000_000_000i64) as u64);
    }

    fn extended_commit(entries: &[(u8, BlockIdFlag)]) -> ExtendedCommit {
        ExtendedCommit {
            height: 60,
            round: 2,
            block_id: BlockId::default(),
            extended_signatures: entries
                .iter()
                .map(|(tag, flag)| ExtendedCommitSig {
                    commit_sig: commit_sig(*tag, *flag),
                    extension: vec![*tag, 0xE0],
                    extension_signature: vec![*tag, 0xE5],
                })
                .collect(),
        }
    }

    #[test]
    fn test_extended_commit_powers_from_last_validators() {
        let state = test_state(100);
        let powers = VotingPowers::from_validator_set(&state.last_validators);
        let commit = extended_commit(&[
            (1, BlockIdFlag::Commit),
            (2, BlockIdFlag::Commit),
            (3, BlockIdFlag::Nil),
        ]);

        let info = transform_extended_commit(&commit, &powers);
        assert_eq!(info.round, 2);
        assert_eq!(info.votes.len(), 3);

        assert_eq!(info.votes[0].validator.power, 10);
        // validator 2 is only in the current set
        assert_eq!(info.votes[1].validator.power, 0);
        assert_eq!(info.votes[2].validator.power, 30);
        assert_eq!(info.votes[2].block_id_flag, BlockIdFlag::Nil);

        assert_eq!(info.votes[0].validator.address, vec![1; 20]);
        assert_eq!(info.votes[0].vote_extension, vec![1, 0xE0]);
        assert_eq!(info.votes[0].extension_signature, vec![1, 0xE5]);
    }

    #[test]
    fn test_extended_commit_skips_absent_votes() {
        let powers = VotingPowers::from_validator_set(&test_state(100).last_validators);
        let commit = extended_commit(&[(1, BlockIdFlag::Absent), (3, BlockIdFlag::Commit)]);

        let info = transform_extended_commit(&commit, &powers);
        assert_eq!(info.votes.len(), 1);
        assert_eq!(info.votes[0].validator.address, vec![3; 20]);
    }

    #[test]
    fn test_voting_powers_first_match() {
        let set = validator_set(vec![validator(1, 10), validator(1, 99), validator(4, 40)]);
        let powers = VotingPowers::from_validator_set(&set);

        assert_eq!(powers.len(), 2);
        assert_eq!(powers.power_of(&[1; 20]), 10);
        assert_eq!(powers.power_of(&[4; 20]), 40);
        assert_eq!(powers.power_of(&[5; 20]), 0);
        assert!(VotingPowers::from_validator_set(&ValidatorSet::default()).is_empty());
    }
}

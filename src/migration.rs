//! Drives a migration run: state first, then every block from the last
//! committed height down to height 1.

use crate::config::Config;
use crate::error::{MigrationError, Result};
use crate::source::{open_source_stores, BlockStore, State, StateStore};
use crate::target::TargetStore;
use crate::transform::{transform_block, transform_extended_commit, transform_state, VotingPowers};
use indicatif::ProgressBar;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    Init,
    StateMigrated,
    /// Migrating the block at this height.
    BlockLoop(i64),
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtendedCommitFailure {
    pub height: u64,
    pub error: String,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub chain_id: String,
    pub migration_height: u64,
    pub blocks_migrated: u64,
    pub extended_commits_written: u64,
    /// Extended-commit writes that failed; these do not abort the run.
    pub extended_commit_failures: Vec<ExtendedCommitFailure>,
    /// Heights stored with an empty signature because the proposer's commit
    /// signature was not found.
    pub missing_proposer_signatures: Vec<u64>,
    pub elapsed: Duration,
}

pub struct Migrator {
    block_store: BlockStore,
    state_store: StateStore,
    target: TargetStore,
    phase: MigrationPhase,
}

impl Migrator {
    pub fn new(block_store: BlockStore, state_store: StateStore, target: TargetStore) -> Self {
        Self {
            block_store,
            state_store,
            target,
            phase: MigrationPhase::Init,
        }
    }

    /// Opens the source stores, then the target. A failed pre-flight check
    /// leaves the target untouched.
    pub fn open(config: &Config) -> Result<Self> {
        let (block_store, state_store) = open_source_stores(config)?;
        let target = TargetStore::open(config)?;
        Ok(Self::new(block_store, state_store, target))
    }

    pub fn phase(&self) -> MigrationPhase {
        self.phase
    }

    pub fn target(&self) -> &TargetStore {
        &self.target
    }

    pub fn into_target(self) -> TargetStore {
        self.target
    }

    pub fn run(&mut self) -> Result<MigrationReport> {
        self.run_with_progress(&ProgressBar::hidden())
    }

    /// Runs the migration, advancing `progress` once per migrated height.
    ///
    /// The first fatal error stops the run; records already written stay in
    /// the target store.
    pub fn run_with_progress(&mut self, progress: &ProgressBar) -> Result<MigrationReport> {
        let result = self.migrate(progress);
        if let Err(e) = &result {
            warn!("Migration failed during {:?}: {}", self.phase, e);
            self.phase = MigrationPhase::Failed;
        }
        result
    }

    fn migrate(&mut self, progress: &ProgressBar) -> Result<MigrationReport> {
        let started = Instant::now();

        debug!(
            "Loading state (discard_abci_responses = {})",
            self.state_store.options().discard_abci_responses
        );
        let state = self.state_store.load()?;
        let migrated_state = transform_state(&state)?;
        self.target.update_state(&migrated_state)?;
        self.phase = MigrationPhase::StateMigrated;
        info!(
            "Migrated state of {} at height {} (initial height {}, DA height {})",
            state.chain_id,
            state.last_block_height,
            migrated_state.initial_height,
            migrated_state.da_height
        );

        let store_range = self.block_store.store_state()?;
        debug!(
            "Block store holds heights {}..={}",
            store_range.base, store_range.height
        );
        if store_range.height < state.last_block_height {
            warn!(
                "Block store height {} is below state height {}",
                store_range.height, state.last_block_height
            );
        }

        let powers = VotingPowers::from_validator_set(&state.last_validators);
        let mut report = MigrationReport {
            chain_id: state.chain_id.clone(),
            migration_height: migrated_state.last_block_height,
            ..Default::default()
        };

        progress.set_length(migrated_state.last_block_height);
        let mut height = state.last_block_height;
        while height > 0 {
            self.phase = MigrationPhase::BlockLoop(height);
            self.migrate_height(height, &state, &powers, &mut report)?;
            progress.inc(1);
            height -= 1;
        }

        self.phase = MigrationPhase::Done;
        report.elapsed = started.elapsed();
        info!(
            "Migrated {} blocks and {} extended commits",
            report.blocks_migrated, report.extended_commits_written
        );
        Ok(report)
    }

    fn migrate_height(
        &self,
        height: i64,
        state: &State,
        powers: &VotingPowers,
        report: &mut MigrationReport,
    ) -> Result<()> {
        let block = self.block_store.load_block(height)?;
        if block.header.height != height {
            return Err(MigrationError::InvalidRecord(format!(
                "block stored at height {} reports height {}",
                height, block.header.height
            )));
        }

        let (header, data, signature) = transform_block(&block, state);
        if signature.is_empty() {
            warn!(
                "No commit signature from proposer {} at height {}, storing an empty signature",
                hex::encode(&block.header.proposer_address),
                height
            );
            report.missing_proposer_signatures.push(header.header.height());
        }

        self.target.save_block_data(&header, &data, &signature)?;
        report.blocks_migrated += 1;
        debug!("Migrated block {} ({} txs)", height, data.txs.len());

        if state
            .consensus_params
            .abci
            .vote_extensions_enabled(block.header.height)
        {
            let commit = self.block_store.load_block_extended_commit(height)?;
            let info = transform_extended_commit(&commit, powers);

            match self.target.save_extended_commit(header.header.height(), &info) {
                Ok(()) => report.extended_commits_written += 1,
                Err(e) => {
                    warn!("Failed to save extended commit at height {}: {}", height, e);
                    report.extended_commit_failures.push(ExtendedCommitFailure {
                        height: header.header.height(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

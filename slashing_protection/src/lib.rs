use core::ops::ControlFlow;
use std::{collections::HashMap, path::Path};

use anyhow::Result;
use bls::PublicKeyBytes;
use helper_functions::misc;
use itertools::Itertools as _;
use log::{debug, info, warn};
use rusqlite::{Connection, OptionalExtension, Rows, Transaction, TransactionBehavior};
use thiserror::Error;
use types::{
    phase0::primitives::{Epoch, Slot, H256},
    preset::Preset,
};

use crate::interchange_format::{
    InterchangeAttestation, InterchangeBlock, InterchangeData, InterchangeFormat,
};

pub mod interchange_format;

#[allow(clippy::str_to_string)]
mod schema {
    use refinery::embed_migrations;
    embed_migrations!();
}

pub const DEFAULT_SLASHING_PROTECTION_HISTORY_LIMIT: u64 = 256;

const DB_PATH: &str = "slashing_protection.sqlite";
const CURRENT_EPOCH_KEY: &str = "current_epoch";

type ValidatorId = i32;

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum SlashingValidationError {
    #[error(
        "conflicting signed beacon block proposal \
         (proposal: {proposal:?}, matching proposal: {matching_proposal:?})"
    )]
    ConflictingProposal {
        proposal: BlockProposal,
        matching_proposal: BlockProposal,
    },
    #[error(
        "signed beacon block proposal attempts to change the past \
         (proposal: {proposal:?}, min slot: {min_slot:?})"
    )]
    PastProposal {
        proposal: BlockProposal,
        min_slot: Slot,
    },
    #[error("slashable attestation (attestation: {attestation:?})")]
    InvalidAttestation { attestation: Attestation },
    #[error(
        "write from a rolled-back clock (current_epoch: {current_epoch:?}, \
         stored_epoch: {stored_epoch:?})"
    )]
    PastEpoch {
        current_epoch: Epoch,
        stored_epoch: Epoch,
    },
}

#[derive(Debug, Error)]
#[error("validator not found in database (pubkey: {pubkey:?})")]
pub struct DbError {
    pubkey: PublicKeyBytes,
}

#[cfg_attr(test, derive(PartialEq, Eq, Debug))]
pub enum SlashingValidationOutcome {
    Accept,
    /// The record already exists with a bit-identical signing root. Replaying
    /// the same signing attempt is not slashable.
    Ignore,
    Reject(SlashingValidationError),
}

#[derive(Clone, Copy, Debug)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct BlockProposal {
    pub slot: Slot,
    pub signing_root: Option<H256>,
}

#[derive(Clone, Copy, Debug)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Attestation {
    pub source_epoch: Epoch,
    pub target_epoch: Epoch,
    pub signing_root: Option<H256>,
}

#[derive(Default)]
#[cfg_attr(test, derive(Debug))]
pub struct ImportReport {
    validators: ImportRecords<PublicKeyBytes>,
    blocks: ImportRecords<BlockProposal>,
    attestations: ImportRecords<Attestation>,
}

impl ImportReport {
    #[must_use]
    pub fn imported_records(&self) -> usize {
        self.validators.succeeded.len()
            + self.blocks.succeeded.len()
            + self.attestations.succeeded.len()
    }

    #[must_use]
    pub fn failed_records(&self) -> usize {
        self.validators.failed.len() + self.blocks.failed.len() + self.attestations.failed.len()
    }
}

#[cfg_attr(test, derive(Debug))]
struct ImportRecords<T> {
    succeeded: Vec<T>,
    failed: Vec<T>,
}

impl<T> Default for ImportRecords<T> {
    fn default() -> Self {
        Self {
            succeeded: vec![],
            failed: vec![],
        }
    }
}

pub struct SlashingProtector {
    connection: Connection,
    history_limit: u64,
}

impl SlashingProtector {
    pub fn persistent(validator_directory: impl AsRef<Path>, history_limit: u64) -> Result<Self> {
        let validator_directory = validator_directory.as_ref();

        let mut connection = Self::open_connection_from_path(validator_directory, DB_PATH)?;
        schema::migrations::runner().run(&mut connection)?;
        Self::set_shared_pragma(&connection)?;

        connection.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            connection,
            history_limit,
        })
    }

    pub fn in_memory(history_limit: u64) -> Result<Self> {
        let mut connection = Connection::open_in_memory()?;
        schema::migrations::runner().run(&mut connection)?;
        Self::set_shared_pragma(&connection)?;

        // See the last paragraph of
        // <https://www.sqlite.org/pragma.html#pragma_journal_mode>.
        connection.pragma_update(None, "journal_mode", "MEMORY")?;

        Ok(Self {
            connection,
            history_limit,
        })
    }

    fn set_shared_pragma(connection: &Connection) -> Result<()> {
        // Foreign key constraints are not enforced by default as of SQLite
        // 3.41.2. See <https://sqlite.org/pragma.html#pragma_foreign_keys>.
        connection.pragma_update(None, "foreign_keys", true)?;

        // A record must be durable before the corresponding signature is
        // released. FULL makes the commit fsync before returning.
        // See <https://sqlite.org/pragma.html#pragma_synchronous>.
        connection.pragma_update(None, "synchronous", "FULL")?;

        // Prevent other processes from accessing the database file.
        // See <https://eips.ethereum.org/EIPS/eip-3076#general-recommendations>.
        connection.pragma_update(None, "locking_mode", "EXCLUSIVE")?;

        Ok(())
    }

    fn open_connection_from_path(directory: impl AsRef<Path>, db_path: &str) -> Result<Connection> {
        let path = directory.as_ref().join(db_path);

        if !path.try_exists()? {
            fs_err::create_dir_all(directory)?;
        }

        Connection::open(path).map_err(Into::into)
    }

    pub fn import_interchange_file(
        &mut self,
        interchange_file_path: impl AsRef<Path>,
        genesis_validators_root: H256,
    ) -> Result<ImportReport> {
        let interchange = InterchangeFormat::load_from_file(interchange_file_path)?;

        debug!("loaded interchange file for import: {interchange:?}");

        interchange.validate(genesis_validators_root)?;

        self.import(interchange)
    }

    // https://ethereum-magicians.org/t/eip-3076-validator-client-interchange-format-slashing-protection/4883/3
    // Decision 1: Duplicate Pubkeys - ACCEPT
    // Decision 2: Importing Slashable Data - ACCEPT_PARTIAL
    // Decision 3: Ordering - UNORDERED
    // Decision 4: Signing Roots - OPTIONAL
    pub fn import(&mut self, interchange: InterchangeFormat) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        for interchange_record in interchange.data {
            let transaction = self.transaction()?;
            let pubkey = interchange_record.pubkey;

            let Ok(validator_id) = Self::find_or_store_validator(&transaction, pubkey) else {
                debug!("failed to import validator (pubkey: {pubkey:?})");
                report.validators.failed.push(pubkey);
                continue;
            };

            report.validators.succeeded.push(pubkey);

            for signed_block in interchange_record.signed_blocks {
                let proposal = BlockProposal {
                    slot: signed_block.slot,
                    signing_root: signed_block.signing_root,
                };

                match Self::store_proposal(&transaction, validator_id, &proposal) {
                    Ok(()) => report.blocks.succeeded.push(proposal),
                    Err(error) => {
                        debug!("failed to import block (block: {proposal:?}, error: {error})");
                        report.blocks.failed.push(proposal);
                    }
                }
            }

            for signed_attestation in interchange_record.signed_attestations {
                let attestation = Attestation {
                    source_epoch: signed_attestation.source_epoch,
                    target_epoch: signed_attestation.target_epoch,
                    signing_root: signed_attestation.signing_root,
                };

                match Self::store_attestation(&transaction, validator_id, &attestation) {
                    Ok(()) => report.attestations.succeeded.push(attestation),
                    Err(error) => {
                        debug!(
                            "failed to import attestation \
                             (attestation: {attestation:?}, error: {error})",
                        );
                        report.attestations.failed.push(attestation);
                    }
                }
            }

            transaction.commit()?;
        }

        Ok(report)
    }

    pub fn export_to_interchange_file(
        &mut self,
        interchange_file_path: impl AsRef<Path>,
        genesis_validators_root: H256,
    ) -> Result<InterchangeFormat> {
        let interchange = self.build_interchange_data(genesis_validators_root)?;

        let interchange_file_path = interchange_file_path.as_ref();

        info!("saving validator information to interchange file: {interchange_file_path:?}");

        let file = fs_err::File::create(interchange_file_path)?;
        serde_json::to_writer(file, &interchange)?;

        Ok(interchange)
    }

    pub fn build_interchange_data(
        &mut self,
        genesis_validators_root: H256,
    ) -> Result<InterchangeFormat> {
        let mut builder = InterchangeBuilder::default();

        let transaction = self.transaction()?;

        let mut statement = transaction.prepare(
            "SELECT validator_id, pubkey, slot, signing_root
                FROM block_proposals, validators
                WHERE block_proposals.validator_id = validators.id",
        )?;

        builder.append_blocks_from_rows(statement.query([])?)?;

        let mut statement = transaction.prepare(
            "SELECT validator_id, pubkey, source_epoch, target_epoch, signing_root
                FROM attestation_proposals, validators
                WHERE attestation_proposals.validator_id = validators.id",
        )?;

        builder.append_attestations_from_rows(statement.query([])?)?;

        Ok(builder.build(genesis_validators_root))
    }

    pub fn register_validators(
        &mut self,
        pubkeys: impl IntoIterator<Item = PublicKeyBytes>,
    ) -> Result<()> {
        let transaction = self.transaction()?;

        for pubkey in pubkeys {
            Self::find_or_store_validator(&transaction, pubkey)?;
        }

        transaction.commit()?;

        Ok(())
    }

    fn find_or_store_validator(
        transaction: &Transaction,
        pubkey: PublicKeyBytes,
    ) -> Result<ValidatorId> {
        if let Some(validator_id) = Self::find_validator_record(transaction, pubkey)? {
            return Ok(validator_id);
        }

        debug!("registering validator in the slashing protection store (pubkey: {pubkey:?})");

        transaction.execute(
            "INSERT INTO validators (pubkey) VALUES (?1)",
            [pubkey.as_bytes()],
        )?;

        Self::find_validator_record(transaction, pubkey)?
            .ok_or(DbError { pubkey })
            .map_err(Into::into)
    }

    fn find_validator_record(
        transaction: &Transaction,
        pubkey: PublicKeyBytes,
    ) -> Result<Option<ValidatorId>> {
        transaction
            .query_row(
                "SELECT id FROM validators WHERE pubkey = ?1",
                [pubkey.as_bytes()],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    fn store_attestation(
        transaction: &Transaction,
        validator_id: ValidatorId,
        attestation: &Attestation,
    ) -> Result<()> {
        transaction.execute(
            "INSERT INTO attestation_proposals (
                validator_id, source_epoch, target_epoch, signing_root
            ) VALUES (?1, ?2, ?3, ?4)",
            (
                validator_id,
                attestation.source_epoch,
                attestation.target_epoch,
                attestation.signing_root.as_ref().map(H256::as_bytes),
            ),
        )?;

        Ok(())
    }

    fn store_proposal(
        transaction: &Transaction,
        validator_id: ValidatorId,
        proposal: &BlockProposal,
    ) -> Result<()> {
        transaction.execute(
            "INSERT INTO block_proposals (validator_id, slot, signing_root) VALUES (?1, ?2, ?3)",
            (
                validator_id,
                proposal.slot,
                proposal.signing_root.as_ref().map(H256::as_bytes),
            ),
        )?;

        Ok(())
    }

    fn find_proposal(
        transaction: &Transaction,
        validator_id: ValidatorId,
        proposal: &BlockProposal,
    ) -> Result<Option<BlockProposal>> {
        Ok(transaction
            .query_row(
                "SELECT slot, signing_root
                FROM block_proposals
                WHERE validator_id = ?1
                AND slot = ?2",
                (validator_id, proposal.slot),
                |row| {
                    let (slot, signing_root_bytes) = row.try_into()?;
                    let signing_root = Option::map(signing_root_bytes, H256);
                    Ok(BlockProposal { slot, signing_root })
                },
            )
            .optional()?)
    }

    fn find_min_slot(transaction: &Transaction, validator_id: ValidatorId) -> Result<Option<Slot>> {
        transaction
            .query_row(
                "SELECT MIN(slot)
                FROM block_proposals
                WHERE validator_id = ?1",
                [validator_id],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    pub fn validate_and_store_proposal(
        &mut self,
        proposal: BlockProposal,
        pubkey: PublicKeyBytes,
        current_epoch: Epoch,
    ) -> Result<SlashingValidationOutcome> {
        if let Some(outcome) = self.validate_current_epoch(current_epoch)? {
            return Ok(outcome);
        }

        let transaction = self.transaction()?;
        let validator_id = Self::find_or_store_validator(&transaction, pubkey)?;
        let matching_proposal = Self::find_proposal(&transaction, validator_id, &proposal)?;

        if let Some(matching_proposal) = matching_proposal {
            if matching_proposal.signing_root == proposal.signing_root {
                debug!(
                    "found identical block proposal in the store \
                     (matching proposal: {matching_proposal:?})",
                );
                return Ok(SlashingValidationOutcome::Ignore);
            }

            let error = SlashingValidationError::ConflictingProposal {
                proposal,
                matching_proposal,
            };

            return Ok(SlashingValidationOutcome::Reject(error));
        }

        let min_slot = Self::find_min_slot(&transaction, validator_id)?;

        if let Some(min_slot) = min_slot {
            if proposal.slot < min_slot {
                let error = SlashingValidationError::PastProposal { proposal, min_slot };
                return Ok(SlashingValidationOutcome::Reject(error));
            }
        }

        Self::store_proposal(&transaction, validator_id, &proposal)?;

        transaction.commit()?;

        debug!(
            "stored block proposal (validator_id: {}, slot: {}, signing_root: {:?})",
            validator_id, proposal.slot, proposal.signing_root,
        );

        Ok(SlashingValidationOutcome::Accept)
    }

    /// Gate for the engine's own proposals. `Ignore` continues: the stored
    /// record is bit-identical, so re-signing it reproduces the same message
    /// after a crash.
    pub fn validate_and_store_own_block_proposal(
        &mut self,
        proposal: BlockProposal,
        pubkey: PublicKeyBytes,
        current_epoch: Epoch,
    ) -> Result<ControlFlow<()>> {
        let outcome = self.validate_and_store_proposal(proposal, pubkey, current_epoch)?;

        let control_flow = match outcome {
            SlashingValidationOutcome::Accept => ControlFlow::Continue(()),
            SlashingValidationOutcome::Ignore => {
                warn!("slashing protector saw a replay of an identical beacon block: {proposal:?}");
                ControlFlow::Continue(())
            }
            SlashingValidationOutcome::Reject(error) => {
                warn!(
                    "slashing protector rejected slashable beacon block \
                     (error: {error}, block: {proposal:?})",
                );
                ControlFlow::Break(())
            }
        };

        Ok(control_flow)
    }

    fn validate_and_store_attestations(
        &mut self,
        attestations: impl IntoIterator<Item = (Attestation, PublicKeyBytes)>,
    ) -> Result<Vec<Result<SlashingValidationOutcome>>> {
        let transaction = self.transaction()?;

        let result = attestations
            .into_iter()
            .map(|(attestation, pubkey)| {
                Self::validate_attestation(attestation, pubkey, &transaction)
            })
            .collect_vec();

        transaction.commit()?;

        Ok(result)
    }

    /// Gate for the engine's own attestations. The returned vector has the
    /// same length and order as the input; accepted attestations are `Some`.
    pub fn validate_and_store_own_attestations(
        &mut self,
        current_epoch: Epoch,
        attestations: impl IntoIterator<Item = (Attestation, PublicKeyBytes)> + Clone,
    ) -> Result<Vec<Option<Attestation>>> {
        if self.validate_current_epoch(current_epoch)?.is_some() {
            return Ok(vec![]);
        }

        let outcomes = self.validate_and_store_attestations(attestations.clone())?;

        Ok(attestations
            .into_iter()
            .zip(outcomes)
            .map(|((attestation, _), outcome_result)| match outcome_result {
                Ok(outcome) => match outcome {
                    SlashingValidationOutcome::Accept => Some(attestation),
                    SlashingValidationOutcome::Ignore => {
                        warn!(
                            "slashing protector saw a replay of an identical \
                             attestation: {attestation:?}",
                        );
                        Some(attestation)
                    }
                    SlashingValidationOutcome::Reject(error) => {
                        warn!(
                            "slashing protector rejected slashable attestation \
                             (error: {error}, attestation: {attestation:?})",
                        );
                        None
                    }
                },
                Err(error) => {
                    warn!(
                        "slashing protector returned an error while checking \
                         attestation (error: {error}, attestation: {attestation:?})",
                    );
                    None
                }
            })
            .collect_vec())
    }

    fn validate_attestation(
        attestation: Attestation,
        pubkey: PublicKeyBytes,
        transaction: &Transaction,
    ) -> Result<SlashingValidationOutcome> {
        // A single statement checks for double votes and surround votes in
        // both directions and inserts the record when none apply.
        let rows_changed = transaction.execute(
            "WITH
                validator AS (SELECT id FROM validators WHERE pubkey = ?1),
                matching AS (SELECT signing_root FROM attestation_proposals, validator WHERE validator_id = validator.id AND
                    (target_epoch = ?3
                        OR (source_epoch < ?2 AND target_epoch > ?3)
                        OR (source_epoch > ?2 AND target_epoch < ?3)
                    ))
            INSERT OR REPLACE INTO attestation_proposals(validator_id, source_epoch, target_epoch, signing_root)
                SELECT id, ?2, ?3, ?4 FROM validator
            WHERE (
                SELECT CASE
                    WHEN (SELECT matching.signing_root IS NULL AND ?4 IS NOT NULL from matching) THEN 1
                    WHEN (SELECT matching.signing_root IS NOT NULL AND matching.signing_root != ?4 from matching) THEN 1
                    WHEN ?2 < (SELECT MIN(source_epoch) FROM attestation_proposals, validator WHERE validator_id = validator.id) THEN 2
                    WHEN ?3 < (SELECT MIN(target_epoch) FROM attestation_proposals, validator WHERE validator_id = validator.id) THEN 3
                    ELSE 0
                END) == 0",
            (
                pubkey.as_bytes(),
                attestation.source_epoch,
                attestation.target_epoch,
                attestation.signing_root.as_ref().map(H256::as_bytes),
            ),
        )?;

        if rows_changed == 0 {
            let error = SlashingValidationError::InvalidAttestation { attestation };
            return Ok(SlashingValidationOutcome::Reject(error));
        }

        Ok(SlashingValidationOutcome::Accept)
    }

    fn validate_current_epoch(
        &mut self,
        current_epoch: Epoch,
    ) -> Result<Option<SlashingValidationOutcome>> {
        if let Some(stored_epoch) = self.stored_current_epoch()? {
            if current_epoch < stored_epoch {
                let error = SlashingValidationError::PastEpoch {
                    current_epoch,
                    stored_epoch,
                };

                warn!("slashing protector rejected current_epoch: {error:?}");

                return Ok(Some(SlashingValidationOutcome::Reject(error)));
            }
        }

        Ok(None)
    }

    fn stored_current_epoch(&mut self) -> Result<Option<Epoch>> {
        let transaction = self.transaction()?;

        let bytes: Option<Vec<u8>> = transaction
            .query_row(
                "SELECT value FROM slashing_protection_meta WHERE id = ?1",
                [CURRENT_EPOCH_KEY],
                |row| row.get(0),
            )
            .optional()?;

        bytes
            .map(|bytes| {
                bytes
                    .as_slice()
                    .try_into()
                    .map(Epoch::from_le_bytes)
                    .map_err(Into::into)
            })
            .transpose()
    }

    fn store_current_epoch(&mut self, epoch: Epoch) -> Result<()> {
        let transaction = self.transaction()?;

        transaction.execute(
            "INSERT OR REPLACE INTO slashing_protection_meta (id, value) VALUES (?1, ?2)",
            (CURRENT_EPOCH_KEY, epoch.to_le_bytes().to_vec()),
        )?;

        transaction.commit().map_err(Into::into)
    }

    pub fn prune<P: Preset>(&mut self, current_epoch: Epoch) -> Result<()> {
        match self.stored_current_epoch()? {
            Some(stored_epoch) => {
                if current_epoch > stored_epoch {
                    self.store_current_epoch(current_epoch)?;
                }
            }
            None => self.store_current_epoch(current_epoch)?,
        }

        let Some(prune_up_to_epoch) = current_epoch.checked_sub(self.history_limit) else {
            debug!("skipping slashing protection pruning for epoch: {current_epoch}");
            return Ok(());
        };

        let prune_up_to_slot = misc::compute_start_slot_at_epoch::<P>(prune_up_to_epoch);

        let mut run = || {
            self.prune_attestations(prune_up_to_epoch)?;
            self.prune_blocks(prune_up_to_slot)
        };

        match run() {
            Ok(()) => info!("slashing protection pruning completed for epoch: {current_epoch}"),
            Err(error) => warn!("error while pruning the slashing protection store: {error:?}"),
        }

        Ok(())
    }

    fn prune_attestations(&mut self, epoch: Epoch) -> Result<()> {
        let transaction = self.transaction()?;

        transaction.execute(
            "DELETE FROM attestation_proposals WHERE target_epoch < ?1",
            [epoch],
        )?;

        transaction.commit().map_err(Into::into)
    }

    fn prune_blocks(&mut self, slot: Slot) -> Result<()> {
        let transaction = self.transaction()?;

        transaction.execute("DELETE FROM block_proposals WHERE slot < ?1", [slot])?;

        transaction.commit().map_err(Into::into)
    }

    fn transaction(&mut self) -> Result<Transaction> {
        self.connection
            .transaction_with_behavior(TransactionBehavior::Exclusive)
            .map_err(Into::into)
    }

    #[cfg(test)]
    fn count_attestations_with_target(&mut self, epoch: Epoch) -> Result<usize> {
        self.transaction()?
            .query_row(
                "SELECT count(*) FROM attestation_proposals WHERE target_epoch = ?1",
                [epoch],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }

    #[cfg(test)]
    fn count_blocks_at_slot(&mut self, slot: Slot) -> Result<usize> {
        self.transaction()?
            .query_row(
                "SELECT count(*) FROM block_proposals WHERE slot = ?1",
                [slot],
                |row| row.get(0),
            )
            .map_err(Into::into)
    }
}

#[derive(Default)]
struct InterchangeBuilder {
    map: HashMap<
        ValidatorId,
        (
            PublicKeyBytes,
            Vec<InterchangeBlock>,
            Vec<InterchangeAttestation>,
        ),
    >,
}

impl InterchangeBuilder {
    fn append_blocks_from_rows(&mut self, mut rows: Rows<'_>) -> Result<()> {
        while let Some(row) = rows.next()? {
            let (validator_id, pubkey_bytes, slot, signing_root_bytes) = row.try_into()?;

            let pubkey = PublicKeyBytes(pubkey_bytes);
            let signing_root = Option::map(signing_root_bytes, H256);

            let interchange_block = InterchangeBlock { slot, signing_root };

            self.map
                .entry(validator_id)
                .or_insert_with(|| (pubkey, vec![], vec![]))
                .1
                .push(interchange_block);
        }

        Ok(())
    }

    fn append_attestations_from_rows(&mut self, mut rows: Rows<'_>) -> Result<()> {
        while let Some(row) = rows.next()? {
            let (validator_id, pubkey_bytes, source_epoch, target_epoch, signing_root_bytes) =
                row.try_into()?;

            let pubkey = PublicKeyBytes(pubkey_bytes);
            let signing_root = Option::map(signing_root_bytes, H256);

            let interchange_attestation = InterchangeAttestation {
                source_epoch,
                target_epoch,
                signing_root,
            };

            self.map
                .entry(validator_id)
                .or_insert_with(|| (pubkey, vec![], vec![]))
                .2
                .push(interchange_attestation);
        }

        Ok(())
    }

    fn build(self, genesis_validators_root: H256) -> InterchangeFormat {
        let data = self
            .map
            .into_values()
            .map(
                |(pubkey, signed_blocks, signed_attestations)| InterchangeData {
                    pubkey,
                    signed_blocks,
                    signed_attestations,
                },
            )
            .collect();

        InterchangeFormat::new(genesis_validators_root, data)
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use tempfile::{Builder, TempDir};
    use test_case::test_case;
    use types::preset::Minimal;

    use super::*;

    const PUBKEY: PublicKeyBytes = PublicKeyBytes(hex!(
        "b845089a1457f811bfc000588fbb4e713669be8ce060ea6be3c6ece09afc3794106c91ca73acda5e5457122d58723bed"
    ));

    const BLOCK_SIGNING_ROOT: H256 = H256(hex!(
        "4ff6f743a43f3b4f95350831aeaf0a122a1a392922c45d804280284a69eb850b"
    ));

    const ATTESTATION_SIGNING_ROOT: H256 = H256(hex!(
        "587d6a4f59a58fe24f406e0502413e77fe1babddee641fda30034ed37ecc884d"
    ));

    // Bundle `TempDir` with `SlashingProtector` to prevent the directory from
    // being dropped early. Calls to SQLite fail if the directory containing
    // the database is deleted.
    type ConstructorResult = Result<(SlashingProtector, Option<TempDir>)>;
    type Constructor = fn() -> ConstructorResult;

    const fn attestation(source: Epoch, target: Epoch) -> Attestation {
        Attestation {
            source_epoch: source,
            target_epoch: target,
            signing_root: None,
        }
    }

    fn build_persistent_slashing_protector() -> ConstructorResult {
        let temp_validator_dir = Builder::new()
            .prefix("slashing_protector_validator")
            .rand_bytes(10)
            .tempdir()?;

        let slashing_protector = SlashingProtector::persistent(
            temp_validator_dir.path(),
            DEFAULT_SLASHING_PROTECTION_HISTORY_LIMIT,
        )?;

        Ok((slashing_protector, Some(temp_validator_dir)))
    }

    fn build_in_memory_slashing_protector() -> ConstructorResult {
        Ok((
            SlashingProtector::in_memory(DEFAULT_SLASHING_PROTECTION_HISTORY_LIMIT)?,
            None,
        ))
    }

    fn count_some<T>(options: &[Option<T>]) -> usize {
        options.iter().flatten().count()
    }

    #[test_case(build_persistent_slashing_protector)]
    #[test_case(build_in_memory_slashing_protector)]
    fn slashing_protection_shared_pragma(constructor: Constructor) -> Result<()> {
        let (slashing_protector, _validator_dir) = constructor()?;

        let foreign_keys = slashing_protector.connection.query_row(
            "SELECT foreign_keys FROM pragma_foreign_keys",
            (),
            |row| row.get::<_, bool>(0),
        )?;

        let synchronous = slashing_protector.connection.query_row(
            "SELECT synchronous FROM pragma_synchronous",
            (),
            |row| row.get::<_, i64>(0),
        )?;

        let locking_mode = slashing_protector.connection.query_row(
            "SELECT locking_mode FROM pragma_locking_mode",
            (),
            |row| row.get::<_, String>(0),
        )?;

        assert!(foreign_keys);
        // 2 is FULL.
        assert_eq!(synchronous, 2);
        assert_eq!(locking_mode, "exclusive");

        Ok(())
    }

    #[test_case(build_persistent_slashing_protector)]
    #[test_case(build_in_memory_slashing_protector)]
    fn first_proposal_is_accepted(constructor: Constructor) -> Result<()> {
        let (mut slashing_protector, _validator_dir) = constructor()?;

        let proposal = BlockProposal {
            slot: 81_952,
            signing_root: Some(BLOCK_SIGNING_ROOT),
        };

        let outcome = slashing_protector.validate_and_store_proposal(proposal, PUBKEY, 3007)?;

        assert_eq!(outcome, SlashingValidationOutcome::Accept);

        Ok(())
    }

    #[test_case(build_persistent_slashing_protector)]
    #[test_case(build_in_memory_slashing_protector)]
    fn conflicting_proposal_is_rejected_and_replay_is_ignored(
        constructor: Constructor,
    ) -> Result<()> {
        let (mut slashing_protector, _validator_dir) = constructor()?;

        let proposal = BlockProposal {
            slot: 100,
            signing_root: Some(BLOCK_SIGNING_ROOT),
        };

        assert_eq!(
            slashing_protector.validate_and_store_proposal(proposal, PUBKEY, 10)?,
            SlashingValidationOutcome::Accept,
        );

        // An identical replay is permitted.
        assert_eq!(
            slashing_protector.validate_and_store_proposal(proposal, PUBKEY, 10)?,
            SlashingValidationOutcome::Ignore,
        );

        // A different block in the same slot is slashable.
        let conflicting = BlockProposal {
            slot: 100,
            signing_root: Some(H256::repeat_byte(0xde)),
        };

        assert_eq!(
            slashing_protector.validate_and_store_proposal(conflicting, PUBKEY, 10)?,
            SlashingValidationOutcome::Reject(SlashingValidationError::ConflictingProposal {
                proposal: conflicting,
                matching_proposal: proposal,
            }),
        );

        Ok(())
    }

    #[test_case(build_persistent_slashing_protector)]
    #[test_case(build_in_memory_slashing_protector)]
    fn first_attestation_is_accepted(constructor: Constructor) -> Result<()> {
        let (mut slashing_protector, _validator_dir) = constructor()?;

        slashing_protector.register_validators(core::iter::once(PUBKEY))?;

        let attestation = Attestation {
            source_epoch: 2290,
            target_epoch: 3007,
            signing_root: Some(ATTESTATION_SIGNING_ROOT),
        };

        let outcome = SlashingProtector::validate_attestation(
            attestation,
            PUBKEY,
            &slashing_protector.transaction()?,
        )?;

        assert_eq!(outcome, SlashingValidationOutcome::Accept);

        Ok(())
    }

    #[test_case(build_persistent_slashing_protector)]
    #[test_case(build_in_memory_slashing_protector)]
    fn surround_votes_are_rejected_in_both_directions(constructor: Constructor) -> Result<()> {
        let (mut slashing_protector, _validator_dir) = constructor()?;

        slashing_protector.register_validators(core::iter::once(PUBKEY))?;

        let accepted = slashing_protector.validate_and_store_own_attestations(
            7,
            [(attestation(3, 7), PUBKEY)],
        )?;

        assert_eq!(count_some(&accepted), 1);

        // (2, 8) surrounds the stored (3, 7).
        let surrounding = slashing_protector.validate_and_store_own_attestations(
            8,
            [(attestation(2, 8), PUBKEY)],
        )?;

        assert_eq!(count_some(&surrounding), 0);

        // (4, 6) is surrounded by the stored (3, 7).
        let surrounded = slashing_protector.validate_and_store_own_attestations(
            8,
            [(attestation(4, 6), PUBKEY)],
        )?;

        assert_eq!(count_some(&surrounded), 0);

        Ok(())
    }

    #[test_case(build_persistent_slashing_protector)]
    #[test_case(build_in_memory_slashing_protector)]
    fn double_votes_are_rejected(constructor: Constructor) -> Result<()> {
        let (mut slashing_protector, _validator_dir) = constructor()?;

        slashing_protector.register_validators(core::iter::once(PUBKEY))?;

        let first = Attestation {
            source_epoch: 3,
            target_epoch: 7,
            signing_root: Some(ATTESTATION_SIGNING_ROOT),
        };

        let double = Attestation {
            source_epoch: 3,
            target_epoch: 7,
            signing_root: Some(H256::repeat_byte(0x99)),
        };

        let outcomes = slashing_protector
            .validate_and_store_own_attestations(7, [(first, PUBKEY), (double, PUBKEY)])?;

        assert_eq!(outcomes, vec![Some(first), None]);

        Ok(())
    }

    #[test_case(build_persistent_slashing_protector)]
    #[test_case(build_in_memory_slashing_protector)]
    fn rejection_leaves_other_validators_unaffected(constructor: Constructor) -> Result<()> {
        let (mut slashing_protector, _validator_dir) = constructor()?;

        let other_pubkey = PublicKeyBytes::repeat_byte(0x42);

        slashing_protector.register_validators([PUBKEY, other_pubkey])?;

        let accepted = slashing_protector.validate_and_store_own_attestations(
            7,
            [(attestation(3, 7), PUBKEY)],
        )?;

        assert_eq!(count_some(&accepted), 1);

        let outcomes = slashing_protector.validate_and_store_own_attestations(
            8,
            [
                (attestation(2, 8), PUBKEY),
                (attestation(2, 8), other_pubkey),
            ],
        )?;

        assert_eq!(outcomes[0], None);
        assert_eq!(outcomes[1], Some(attestation(2, 8)));

        Ok(())
    }

    #[test_case(build_persistent_slashing_protector)]
    #[test_case(build_in_memory_slashing_protector)]
    fn current_epoch_low_water_mark_rejects_rollbacks(constructor: Constructor) -> Result<()> {
        let (mut slashing_protector, _validator_dir) = constructor()?;

        assert_eq!(slashing_protector.stored_current_epoch()?, None);
        assert_eq!(slashing_protector.validate_current_epoch(0)?, None);

        slashing_protector.prune::<Minimal>(1024)?;

        assert_eq!(slashing_protector.stored_current_epoch()?, Some(1024));

        slashing_protector.register_validators(core::iter::once(PUBKEY))?;

        let accepted = slashing_protector.validate_and_store_own_attestations(
            32,
            [(attestation(2, 32), PUBKEY)],
        )?;

        assert_eq!(count_some(&accepted), 0);

        let accepted = slashing_protector.validate_and_store_own_attestations(
            1024,
            [(attestation(2, 32), PUBKEY)],
        )?;

        assert_eq!(count_some(&accepted), 1);

        let proposal = BlockProposal {
            slot: 32,
            signing_root: Some(BLOCK_SIGNING_ROOT),
        };

        assert_eq!(
            slashing_protector.validate_and_store_proposal(proposal, PUBKEY, 32)?,
            SlashingValidationOutcome::Reject(SlashingValidationError::PastEpoch {
                current_epoch: 32,
                stored_epoch: 1024,
            }),
        );

        assert_eq!(
            slashing_protector.validate_and_store_proposal(proposal, PUBKEY, 1024)?,
            SlashingValidationOutcome::Accept,
        );

        Ok(())
    }

    #[test_case(build_persistent_slashing_protector)]
    #[test_case(build_in_memory_slashing_protector)]
    fn attestation_pruning_respects_the_history_limit(constructor: Constructor) -> Result<()> {
        let (mut slashing_protector, _validator_dir) = constructor()?;

        slashing_protector.register_validators(core::iter::once(PUBKEY))?;

        let accepted = slashing_protector.validate_and_store_own_attestations(
            3,
            [
                (attestation(2, 32), PUBKEY),
                (attestation(34, 64), PUBKEY),
            ],
        )?;

        assert_eq!(count_some(&accepted), 2);
        assert_eq!(slashing_protector.count_attestations_with_target(32)?, 1);
        assert_eq!(slashing_protector.count_attestations_with_target(64)?, 1);

        slashing_protector.prune::<Minimal>(100)?;

        assert_eq!(slashing_protector.count_attestations_with_target(32)?, 1);
        assert_eq!(slashing_protector.count_attestations_with_target(64)?, 1);

        slashing_protector.prune::<Minimal>(290)?;

        assert_eq!(slashing_protector.count_attestations_with_target(32)?, 0);
        assert_eq!(slashing_protector.count_attestations_with_target(64)?, 1);

        Ok(())
    }

    #[test_case(build_persistent_slashing_protector)]
    #[test_case(build_in_memory_slashing_protector)]
    fn block_proposal_pruning_respects_the_history_limit(constructor: Constructor) -> Result<()> {
        let (mut slashing_protector, _validator_dir) = constructor()?;

        let proposal = BlockProposal {
            slot: 32,
            signing_root: Some(BLOCK_SIGNING_ROOT),
        };

        slashing_protector.validate_and_store_proposal(proposal, PUBKEY, 1)?;

        let proposal = BlockProposal {
            slot: 64,
            signing_root: Some(BLOCK_SIGNING_ROOT),
        };

        slashing_protector.validate_and_store_proposal(proposal, PUBKEY, 2)?;

        assert_eq!(slashing_protector.count_blocks_at_slot(32)?, 1);
        assert_eq!(slashing_protector.count_blocks_at_slot(64)?, 1);

        slashing_protector.prune::<Minimal>(100)?;

        assert_eq!(slashing_protector.count_blocks_at_slot(32)?, 1);
        assert_eq!(slashing_protector.count_blocks_at_slot(64)?, 1);

        // With the minimal preset the cutoff slot for epoch 261 is 40.
        slashing_protector.prune::<Minimal>(261)?;

        assert_eq!(slashing_protector.count_blocks_at_slot(32)?, 0);
        assert_eq!(slashing_protector.count_blocks_at_slot(64)?, 1);

        Ok(())
    }

    #[test_case(build_persistent_slashing_protector)]
    #[test_case(build_in_memory_slashing_protector)]
    fn interchange_data_round_trips(constructor: Constructor) -> Result<()> {
        let (mut slashing_protector, _validator_dir) = constructor()?;

        let genesis_validators_root = H256::repeat_byte(0x11);

        let proposal = BlockProposal {
            slot: 10,
            signing_root: Some(BLOCK_SIGNING_ROOT),
        };

        slashing_protector.validate_and_store_proposal(proposal, PUBKEY, 1)?;

        let accepted = slashing_protector.validate_and_store_own_attestations(
            7,
            [(attestation(3, 7), PUBKEY)],
        )?;

        assert_eq!(count_some(&accepted), 1);

        let exported = slashing_protector.build_interchange_data(genesis_validators_root)?;

        assert!(!exported.is_empty());
        exported.validate(genesis_validators_root)?;

        let (mut fresh_protector, _fresh_dir) = build_in_memory_slashing_protector()?;
        let report = fresh_protector.import(exported)?;

        assert_eq!(report.imported_records(), 3);
        assert_eq!(report.failed_records(), 0);

        // The imported history still gates conflicting messages.
        let conflicting = BlockProposal {
            slot: 10,
            signing_root: Some(H256::repeat_byte(0xaa)),
        };

        assert_eq!(
            fresh_protector.validate_and_store_proposal(conflicting, PUBKEY, 1)?,
            SlashingValidationOutcome::Reject(SlashingValidationError::ConflictingProposal {
                proposal: conflicting,
                matching_proposal: proposal,
            }),
        );

        Ok(())
    }
}

//! Per-table pull and push.
//!
//! Pull copies master rows changed since the local high-water mark into
//! the local store; push copies locally changed rows to the master. Both
//! resolve rows present on both sides with [`resolve`], last writer wins.
//!
//! Each direction applies its writes to one store inside a single
//! transaction, so a table is either fully applied or not at all. Push
//! commits the master first and only then stamps `synced_at` locally: a
//! failure in between leaves the rows pending, and pushing them again is
//! harmless.

use std::collections::HashSet;

use rusqlite::Connection;
use rusqlite::types::Value;
use tracing::{debug, info, warn};

use crate::model::record::display_value;
use crate::model::{Record, TableDescriptor, SYNCED_AT};
use crate::storage::SchemaRegistry;
use crate::storage::tables::{
    column_names, create_table_from_sample, find_by_key, insert_record, mark_synced, max_synced_at,
    rows_pending_push, rows_updated_after, table_exists, update_record,
};
use crate::sync::conflict::{resolve, ConflictRecord, Resolution};
use crate::sync::evolver::add_missing_tracking_columns;
use crate::sync::types::SyncResult;

/// How a missing table was created in the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableBootstrap {
    /// From the schema registry's DDL.
    Registry,
    /// Degraded: untyped columns inferred from a local row.
    Sample,
}

/// Result of pulling one table.
#[derive(Debug, Clone, Default)]
pub struct PullOutcome {
    /// Rows inserted or overwritten locally.
    pub pulled: u64,
    /// Master rows discarded because the local copy was newer.
    pub conflicts: Vec<ConflictRecord>,
    /// Set when the local table had to be created.
    pub bootstrapped: Option<TableBootstrap>,
}

/// Result of pushing one table.
#[derive(Debug, Clone, Default)]
pub struct PushOutcome {
    /// Rows inserted or overwritten on the master.
    pub pushed: u64,
    /// Rows already identical on the master, stamped without a write.
    pub reconciled: u64,
    /// Set when the master table had to be created.
    pub bootstrapped: Option<TableBootstrap>,
}

fn primary_key_of<'r>(row: &'r Record, table: &TableDescriptor) -> Option<&'r Value> {
    match row.get(&table.primary_key) {
        None | Some(Value::Null) => {
            warn!(table = %table.name, key = %table.primary_key, "Row has no primary key; skipping");
            None
        }
        Some(key) => Some(key),
    }
}

/// Pull one table from the master into the local store.
///
/// Only master rows with `updated_at` above the local table's
/// `MAX(synced_at)` are considered. New rows are inserted; rows the master
/// holds a newer copy of are overwritten; rows where the local copy is
/// newer are recorded as conflicts and left untouched (and unstamped, so
/// the next push sends them). Columns the local table lacks are dropped.
///
/// A local table missing from the store is created from the registry when
/// an entry exists; otherwise the table is skipped.
///
/// # Errors
///
/// Returns an error if reading either store or writing the local one fails.
/// The local transaction is rolled back in that case.
pub fn pull_table(
    local: &mut Connection,
    remote: &Connection,
    table: &TableDescriptor,
    registry: &SchemaRegistry,
    now: i64,
) -> SyncResult<PullOutcome> {
    let mut outcome = PullOutcome::default();

    if !table_exists(remote, &table.name)? {
        debug!(table = %table.name, "Not on the master; nothing to pull");
        return Ok(outcome);
    }
    if !table_exists(local, &table.name)? {
        if !registry.create_table(local, table)? {
            debug!(table = %table.name, "Missing locally and unregistered; skipping pull");
            return Ok(outcome);
        }
        add_missing_tracking_columns(local, &table.name)?;
        outcome.bootstrapped = Some(TableBootstrap::Registry);
    }

    let high_water = max_synced_at(local, &table.name)?;
    let incoming = rows_updated_after(remote, &table.name, high_water)?;
    debug!(table = %table.name, high_water, candidates = incoming.len(), "Pulling");
    if incoming.is_empty() {
        return Ok(outcome);
    }

    let local_columns: HashSet<String> = column_names(local, &table.name)?.into_iter().collect();
    let tx = local.transaction()?;

    for remote_row in incoming {
        let Some(key) = primary_key_of(&remote_row, table).cloned() else {
            continue;
        };

        match find_by_key(&tx, &table.name, &table.primary_key, &key)? {
            None => {
                let row = remote_row.retain_columns(|c| local_columns.contains(c));
                insert_record(&tx, &table.name, &row)?;
                mark_synced(&tx, &table.name, &table.primary_key, &key, now)?;
                outcome.pulled += 1;
            }
            Some(local_row) => match resolve(&local_row.last_write(), &remote_row.last_write()) {
                Resolution::RemoteWins => {
                    let row = remote_row.retain_columns(|c| local_columns.contains(c));
                    update_record(&tx, &table.name, &table.primary_key, &row)?;
                    mark_synced(&tx, &table.name, &table.primary_key, &key, now)?;
                    outcome.pulled += 1;
                }
                Resolution::LocalWins => {
                    debug!(
                        table = %table.name,
                        key = %display_value(&key),
                        "Local copy is newer; keeping it"
                    );
                    outcome
                        .conflicts
                        .push(ConflictRecord::new(&table.name, &key, &local_row, &remote_row, now));
                }
                Resolution::Equal => {}
            },
        }
    }

    tx.commit()?;
    if outcome.pulled > 0 || !outcome.conflicts.is_empty() {
        info!(
            table = %table.name,
            pulled = outcome.pulled,
            conflicts = outcome.conflicts.len(),
            "Pulled table"
        );
    }
    Ok(outcome)
}

/// Push one table's pending local rows to the master.
///
/// Pending rows are those with `updated_at > COALESCE(synced_at, 0)`. Rows
/// missing on the master are inserted, rows where the local copy is newer
/// overwrite the master copy, and rows with identical timestamps are only
/// stamped. The master copy carries `synced_at = now`. Rows where the
/// master is newer are left for the next pull.
///
/// A master missing the table gets it from the registry, or in degraded
/// mode from the first pending row.
///
/// # Errors
///
/// Returns an error if reading either store or writing either store fails.
pub fn push_table(
    local: &mut Connection,
    remote: &mut Connection,
    table: &TableDescriptor,
    registry: &SchemaRegistry,
    now: i64,
) -> SyncResult<PushOutcome> {
    let mut outcome = PushOutcome::default();

    if !table_exists(local, &table.name)? {
        debug!(table = %table.name, "Not in the local store; nothing to push");
        return Ok(outcome);
    }

    let pending = rows_pending_push(local, &table.name)?;
    debug!(table = %table.name, pending = pending.len(), "Pushing");
    if pending.is_empty() {
        return Ok(outcome);
    }

    if !table_exists(remote, &table.name)? {
        if registry.create_table(remote, table)? {
            add_missing_tracking_columns(remote, &table.name)?;
            outcome.bootstrapped = Some(TableBootstrap::Registry);
        } else {
            warn!(
                table = %table.name,
                "No registered schema; creating master table from a local row (untyped columns)"
            );
            create_table_from_sample(remote, &table.name, &table.primary_key, &pending[0])?;
            outcome.bootstrapped = Some(TableBootstrap::Sample);
        }
    }

    let remote_columns: HashSet<String> = column_names(remote, &table.name)?.into_iter().collect();
    let mut stamp: Vec<Value> = Vec::with_capacity(pending.len());

    let tx = remote.transaction()?;
    for local_row in pending {
        let Some(key) = primary_key_of(&local_row, table).cloned() else {
            continue;
        };

        let remote_row = find_by_key(&tx, &table.name, &table.primary_key, &key)?;
        let resolution = match &remote_row {
            None => None,
            Some(existing) => Some(resolve(&local_row.last_write(), &existing.last_write())),
        };

        match resolution {
            Some(Resolution::Equal) => {
                outcome.reconciled += 1;
                stamp.push(key);
            }
            Some(Resolution::RemoteWins) => {
                debug!(
                    table = %table.name,
                    key = %display_value(&key),
                    "Master copy is newer; leaving it for the next pull"
                );
            }
            None | Some(Resolution::LocalWins) => {
                let mut row = local_row.retain_columns(|c| remote_columns.contains(c));
                if remote_columns.contains(SYNCED_AT) {
                    row.set(SYNCED_AT, Value::Integer(now));
                }
                if remote_row.is_none() {
                    insert_record(&tx, &table.name, &row)?;
                } else {
                    update_record(&tx, &table.name, &table.primary_key, &row)?;
                }
                outcome.pushed += 1;
                stamp.push(key);
            }
        }
    }
    tx.commit()?;

    let tx = local.transaction()?;
    for key in &stamp {
        mark_synced(&tx, &table.name, &table.primary_key, key, now)?;
    }
    tx.commit()?;

    if outcome.pushed > 0 {
        info!(table = %table.name, pushed = outcome.pushed, "Pushed table");
    }
    Ok(outcome)
}

//! Backend-mode runs: one-shot compare and the batch API flow.
//!
//! Transport failure is fatal to the run as a whole: the batch moves to
//! `failed` and the operator retries the whole run once the backend is
//! reachable. Local partial results are never merged with a failed remote
//! invocation.

use std::collections::HashMap;
use std::path::PathBuf;

use uuid::Uuid;

use veriroute_batch::runner::synthesize_addresses;
use veriroute_batch::store::SessionStore;
use veriroute_client::{
    delete_auth, save_auth, ApiClient, AuthCredentials, CompareItem, FieldUpload, SystemUpload,
};
use veriroute_engine::model::ComparisonResult;
use veriroute_engine::reconcile::reconcile;

use crate::run::{finish_run, open_store, prepare, PreparedRun};
use crate::CliError;

// ---------------------------------------------------------------------------
// run --remote
// ---------------------------------------------------------------------------

pub fn cmd_run_remote(
    config_path: PathBuf,
    json_output: bool,
    store_path: Option<PathBuf>,
    name: Option<String>,
) -> Result<(), CliError> {
    let mut prepared = prepare(&config_path, name)?;
    let (store, _) = open_store(store_path)?;

    let client = ApiClient::from_saved_auth().map_err(CliError::backend)?;

    let run_id = Uuid::new_v4();
    store
        .begin_run(&prepared.batch, run_id)
        .map_err(|e| CliError::runtime(e.to_string()))?;

    let addresses = synthesize_addresses(
        &prepared.system,
        &prepared.system_set,
        &prepared.field_set,
        &prepared.field_columns,
        prepared.mapping.as_ref(),
    );

    let recon = reconcile(&prepared.system, &prepared.field);
    let items: Vec<CompareItem> = recon
        .matched
        .iter()
        .map(|m| CompareItem {
            id: m.system.connote.clone(),
            system_address: addresses
                .get(&m.system.connote)
                .cloned()
                .unwrap_or_default(),
            field_lat: m.field.lat,
            field_lng: m.field.lng,
        })
        .collect();

    eprintln!(
        "run '{}': comparing {} matched record(s) via backend...",
        prepared.batch.name,
        items.len(),
    );

    let outcomes = match client.compare(&items) {
        Ok(outcomes) => outcomes,
        Err(err) => {
            // The run itself failed; nothing partial is kept.
            prepared
                .batch
                .fail()
                .map_err(|e| CliError::runtime(e.to_string()))?;
            store
                .save_batch(&prepared.batch)
                .map_err(|e| CliError::runtime(e.to_string()))?;
            return Err(CliError::backend(err));
        }
    };

    let by_connote: HashMap<&str, &veriroute_client::CompareOutcome> =
        outcomes.iter().map(|o| (o.id.as_str(), o)).collect();

    // Reassemble in system-input order: backend outcomes for matched
    // records, local error rows for join misses.
    for (seq, record) in prepared.system.iter().enumerate() {
        let result = match by_connote.get(record.connote.as_str()) {
            Some(outcome) => outcome.to_comparison_result(&record.recipient_name),
            None => {
                let address = addresses
                    .get(&record.connote)
                    .cloned()
                    .unwrap_or_default();
                ComparisonResult::unmatched(record, address)
            }
        };
        store
            .apply_result(prepared.batch.id, run_id, seq, &result)
            .map_err(|e| CliError::runtime(e.to_string()))?;
    }

    prepared
        .batch
        .complete()
        .map_err(|e| CliError::runtime(e.to_string()))?;
    store
        .save_batch(&prepared.batch)
        .map_err(|e| CliError::runtime(e.to_string()))?;

    finish_run(
        &store,
        &prepared.batch,
        &prepared.config,
        &prepared.base_dir,
        json_output,
    )
}

// ---------------------------------------------------------------------------
// push (batch API flow)
// ---------------------------------------------------------------------------

pub fn cmd_push(
    config_path: PathBuf,
    store_path: Option<PathBuf>,
    name: Option<String>,
) -> Result<(), CliError> {
    let mut prepared = prepare(&config_path, name)?;
    let (store, _) = open_store(store_path)?;

    let client = ApiClient::from_saved_auth().map_err(CliError::backend)?;

    let run_id = Uuid::new_v4();
    store
        .begin_run(&prepared.batch, run_id)
        .map_err(|e| CliError::runtime(e.to_string()))?;

    let addresses = synthesize_addresses(
        &prepared.system,
        &prepared.system_set,
        &prepared.field_set,
        &prepared.field_columns,
        prepared.mapping.as_ref(),
    );

    let result = push_flow(&client, &prepared, &addresses);
    let items = match result {
        Ok(items) => items,
        Err(err) => {
            prepared
                .batch
                .fail()
                .map_err(|e| CliError::runtime(e.to_string()))?;
            store
                .save_batch(&prepared.batch)
                .map_err(|e| CliError::runtime(e.to_string()))?;
            return Err(CliError::backend(err));
        }
    };

    for (seq, item) in items.iter().enumerate() {
        store
            .apply_result(prepared.batch.id, run_id, seq, &item.to_comparison_result())
            .map_err(|e| CliError::runtime(e.to_string()))?;
    }

    prepared
        .batch
        .complete()
        .map_err(|e| CliError::runtime(e.to_string()))?;
    store
        .save_batch(&prepared.batch)
        .map_err(|e| CliError::runtime(e.to_string()))?;

    finish_run(
        &store,
        &prepared.batch,
        &prepared.config,
        &prepared.base_dir,
        false,
    )
}

fn push_flow(
    client: &ApiClient,
    prepared: &PreparedRun,
    addresses: &HashMap<String, String>,
) -> Result<Vec<veriroute_client::BatchItem>, veriroute_client::ApiError> {
    let remote = client.create_batch(&prepared.batch.name)?;
    eprintln!("created backend batch {} ({})", remote.id, remote.status);

    let system_upload: Vec<SystemUpload> = prepared
        .system
        .iter()
        .map(|s| SystemUpload {
            connote: s.connote.clone(),
            recipient_name: s.recipient_name.clone(),
            system_address: addresses.get(&s.connote).cloned().unwrap_or_default(),
        })
        .collect();
    client.upload_system_data(&remote.id, &system_upload)?;

    let field_upload: Vec<FieldUpload> = prepared
        .field
        .iter()
        .map(|f| FieldUpload {
            connote: f.connote.clone(),
            field_lat: f.lat,
            field_lng: f.lng,
        })
        .collect();
    client.upload_field_data(&remote.id, &field_upload)?;

    eprintln!("processing {} record(s) on the backend...", system_upload.len());
    client.process_batch(&remote.id)?;
    client.batch_results(&remote.id)
}

// ---------------------------------------------------------------------------
// login / logout
// ---------------------------------------------------------------------------

pub fn cmd_login(api_base: String, token: String) -> Result<(), CliError> {
    let token = token.trim().to_string();
    if token.is_empty() {
        return Err(CliError::args("token must not be empty")
            .with_hint("pass --token or set VERIROUTE_TOKEN"));
    }

    save_auth(&AuthCredentials::new(token, api_base.clone()))
        .map_err(CliError::runtime)?;
    eprintln!("credentials saved for {api_base}");
    Ok(())
}

pub fn cmd_logout() -> Result<(), CliError> {
    delete_auth().map_err(CliError::runtime)?;
    eprintln!("credentials removed");
    Ok(())
}

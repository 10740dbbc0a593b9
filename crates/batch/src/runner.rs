//! The run pipeline: one worker thread, ordered emission, cooperative
//! cancellation.
//!
//! Normalization, mapping, and joining are synchronous over materialized
//! collections; the geocode calls are the only blocking points. Results come
//! out one per input system record, in input order, so a consumer can render
//! partial progress without reordering. Cancellation stops dispatching
//! further geocode requests; a request already in flight completes but its
//! run's results are refused by the store once the run is superseded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

use uuid::Uuid;

use veriroute_engine::distance::classify;
use veriroute_engine::mapping::{build_address, fallback_address, AddressMapping, FieldColumnMap, MappingSource};
use veriroute_engine::model::{
    normalize_connote, AccuracyCategory, ComparisonResult, FieldRecord, GeocodeStatus,
    SystemRecord,
};
use veriroute_engine::normalize::HeaderMap;
use veriroute_engine::rows::RowSet;
use veriroute_geocode::Orchestrator;

// ---------------------------------------------------------------------------
// Address synthesis
// ---------------------------------------------------------------------------

/// Pre-compute the geocoding query for every system record: the configured
/// mapping over the record's raw row (system- or field-side), or the naive
/// fallback concatenation when no mapping exists.
pub fn synthesize_addresses(
    system: &[SystemRecord],
    system_rows: &RowSet,
    field_rows: &RowSet,
    field_columns: &FieldColumnMap,
    mapping: Option<&AddressMapping>,
) -> HashMap<String, String> {
    let Some(mapping) = mapping else {
        return system
            .iter()
            .map(|s| (s.connote.clone(), fallback_address(s)))
            .collect();
    };

    let empty_row = HashMap::new();

    // Index raw rows by normalized connote so each record finds its own.
    let system_index: HashMap<String, &HashMap<String, String>> = {
        let headers = HeaderMap::resolve(&system_rows.headers);
        system_rows
            .rows
            .iter()
            .filter_map(|row| {
                let connote = headers.connote.as_ref().and_then(|c| row.get(c))?;
                (!connote.trim().is_empty()).then(|| (normalize_connote(connote), row))
            })
            .collect()
    };
    let field_index: HashMap<String, &HashMap<String, String>> = field_rows
        .rows
        .iter()
        .filter_map(|row| {
            let connote = row.get(&field_columns.id)?;
            (!connote.trim().is_empty()).then(|| (normalize_connote(connote), row))
        })
        .collect();

    system
        .iter()
        .map(|record| {
            let row = match mapping.source {
                MappingSource::System => system_index.get(&record.connote),
                MappingSource::Field => field_index.get(&record.connote),
            };
            let address = build_address(mapping, row.copied().unwrap_or(&empty_row));
            (record.connote.clone(), address)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Everything a run needs, materialized up front.
pub struct RunInput {
    pub system: Vec<SystemRecord>,
    pub field: Vec<FieldRecord>,
    /// connote → geocoding query, from [`synthesize_addresses`].
    pub addresses: HashMap<String, String>,
}

/// Consumer's view of an in-flight run.
pub struct RunHandle {
    run_id: Uuid,
    cancel: Arc<AtomicBool>,
    pub results: mpsc::Receiver<ComparisonResult>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Stop dispatching further geocode requests. The worker exits at the
    /// next loop head; the channel closes once it does.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

/// Drives runs against a shared orchestrator.
pub struct Runner {
    orchestrator: Arc<Orchestrator>,
}

impl Runner {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Spawn the worker and hand back the ordered result stream.
    pub fn run(&self, run_id: Uuid, input: RunInput) -> RunHandle {
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();

        let orchestrator = Arc::clone(&self.orchestrator);
        let cancel_flag = Arc::clone(&cancel);

        std::thread::spawn(move || {
            run_worker(run_id, input, orchestrator, cancel_flag, tx);
        });

        RunHandle {
            run_id,
            cancel,
            results: rx,
        }
    }
}

fn run_worker(
    run_id: Uuid,
    input: RunInput,
    orchestrator: Arc<Orchestrator>,
    cancel: Arc<AtomicBool>,
    tx: mpsc::Sender<ComparisonResult>,
) {
    let field_index: HashMap<&str, &FieldRecord> = input
        .field
        .iter()
        .map(|f| (f.connote.as_str(), f))
        .collect();

    for record in &input.system {
        if cancel.load(Ordering::Relaxed) {
            log::info!("run {run_id}: cancelled, discarding remaining records");
            return;
        }

        let address = input
            .addresses
            .get(&record.connote)
            .cloned()
            .unwrap_or_else(|| fallback_address(record));

        let result = match field_index.get(record.connote.as_str()) {
            None => ComparisonResult::unmatched(record, address),
            Some(field) => {
                let mut result = ComparisonResult::pending(record, address.clone(), field);
                result.geocode_status = GeocodeStatus::Loading;

                match orchestrator.resolve(&address) {
                    Ok(Some(resolution)) => {
                        let (distance, category) = classify(
                            Some((resolution.lat, resolution.lng)),
                            Some((field.lat, field.lng)),
                        );
                        result.system_lat = Some(resolution.lat);
                        result.system_lng = Some(resolution.lng);
                        result.distance_meters = distance;
                        result.category = category;
                        result.geocode_status = GeocodeStatus::Done;
                        result.provider = Some(resolution.provider);
                    }
                    Ok(None) => {
                        // Degenerate address, nothing to resolve.
                        result.category = AccuracyCategory::Error;
                        result.geocode_status = GeocodeStatus::Error;
                    }
                    Err(err) => {
                        log::warn!("run {run_id}: {err}");
                        result.category = AccuracyCategory::Error;
                        result.geocode_status = GeocodeStatus::Error;
                    }
                }
                result
            }
        };

        if tx.send(result).is_err() {
            // Consumer went away; stop resolving on its behalf.
            log::info!("run {run_id}: consumer dropped, stopping");
            return;
        }
    }
}

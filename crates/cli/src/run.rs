//! `vroute run` / `validate` / `export` / `history` — the local pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use veriroute_batch::runner::{synthesize_addresses, RunInput, Runner};
use veriroute_batch::session::Batch;
use veriroute_batch::store::{SessionStore, SqliteCache};
use veriroute_engine::config::RunConfig;
use veriroute_engine::mapping::{AddressMapping, FieldColumnMap};
use veriroute_engine::model::{FieldRecord, RunMeta, RunReport, SystemRecord};
use veriroute_engine::normalize::{normalize_field, normalize_system};
use veriroute_engine::rows::{load_rows, RowSet};
use veriroute_geocode::{MemoryCache, GeocodeCache, Orchestrator, RateGate};

use crate::exit_codes::{EXIT_RUN_INVALID_CONFIG, EXIT_RUN_VALIDATION};
use crate::{default_store_path, CliError};

// ---------------------------------------------------------------------------
// Shared preparation
// ---------------------------------------------------------------------------

/// Everything both run modes need before the first network call.
pub(crate) struct PreparedRun {
    pub config: RunConfig,
    pub base_dir: PathBuf,
    pub system_set: RowSet,
    pub field_set: RowSet,
    pub system: Vec<SystemRecord>,
    pub field: Vec<FieldRecord>,
    pub field_columns: FieldColumnMap,
    pub mapping: Option<AddressMapping>,
    pub batch: Batch,
}

pub(crate) fn load_config(config_path: &Path) -> Result<(RunConfig, PathBuf), CliError> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| CliError {
        code: EXIT_RUN_INVALID_CONFIG,
        message: format!("cannot read config: {e}"),
        hint: None,
    })?;
    let config = RunConfig::from_toml(&config_str).map_err(|e| CliError {
        code: EXIT_RUN_INVALID_CONFIG,
        message: e.to_string(),
        hint: None,
    })?;
    let base_dir = config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    Ok((config, base_dir))
}

/// Load both datasets, normalize, resolve the field column mapping, and
/// move a fresh batch into `processing` — or fail with the lifecycle's
/// validation message.
pub(crate) fn prepare(config_path: &Path, name: Option<String>) -> Result<PreparedRun, CliError> {
    let (config, base_dir) = load_config(config_path)?;

    let read_csv = |file: &str| -> Result<RowSet, CliError> {
        let path = base_dir.join(file);
        let data = std::fs::read_to_string(&path)
            .map_err(|e| CliError::runtime(format!("cannot read {}: {e}", path.display())))?;
        load_rows(&data).map_err(|e| CliError::runtime(e.to_string()))
    };

    let system_set = read_csv(&config.system.file)?;
    let field_set = read_csv(&config.field.file)?;

    let system = normalize_system(&system_set);
    let field = normalize_field(&field_set);

    let field_columns = match &config.field.columns {
        Some(columns) => columns.clone(),
        None => FieldColumnMap::infer(&field_set.headers),
    };
    let mapping = config.address.as_ref().map(|a| a.to_mapping());

    let mut batch = Batch::new(name.unwrap_or_else(|| config.name.clone()));
    batch
        .begin_processing(system.len(), field.len(), &field_columns)
        .map_err(|e| CliError {
            code: EXIT_RUN_VALIDATION,
            message: e.to_string(),
            hint: None,
        })?;

    Ok(PreparedRun {
        config,
        base_dir,
        system_set,
        field_set,
        system,
        field,
        field_columns,
        mapping,
        batch,
    })
}

pub(crate) fn open_store(store: Option<PathBuf>) -> Result<(SessionStore, PathBuf), CliError> {
    let path = match store {
        Some(path) => path,
        None => default_store_path()?,
    };
    let store = SessionStore::open(&path).map_err(|e| CliError::runtime(e.to_string()))?;
    Ok((store, path))
}

/// Persist summary + exports and print the closing lines. Shared by the
/// local and remote run paths once all results are in the store.
pub(crate) fn finish_run(
    store: &SessionStore,
    batch: &Batch,
    config: &RunConfig,
    base_dir: &Path,
    json_output: bool,
) -> Result<(), CliError> {
    let results = store
        .results(batch.id)
        .map_err(|e| CliError::runtime(e.to_string()))?;
    let stats = store
        .stats(batch.id)
        .map_err(|e| CliError::runtime(e.to_string()))?;
    store
        .save_summary(batch, &stats)
        .map_err(|e| CliError::runtime(e.to_string()))?;

    let report = RunReport {
        meta: RunMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: batch.updated_at.to_rfc3339(),
        },
        stats: stats.clone(),
        results,
    };

    if let Some(ref csv_file) = config.output.csv {
        let path = base_dir.join(csv_file);
        crate::export::write_csv_file(&report.results, &path)?;
        eprintln!("wrote {}", path.display());
    }

    let json_str = serde_json::to_string_pretty(&report)
        .map_err(|e| CliError::runtime(format!("JSON serialization error: {e}")))?;
    if let Some(ref json_file) = config.output.json {
        let path = base_dir.join(json_file);
        std::fs::write(&path, &json_str)
            .map_err(|e| CliError::runtime(format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }
    if json_output {
        println!("{json_str}");
    }

    eprintln!(
        "run '{}': {} records — {} accurate, {} fairly accurate, {} inaccurate, {} pending, {} errors",
        batch.name,
        stats.total,
        stats.accurate,
        stats.fairly_accurate,
        stats.inaccurate,
        stats.pending,
        stats.error,
    );

    Ok(())
}

// ---------------------------------------------------------------------------
// run (local)
// ---------------------------------------------------------------------------

pub fn cmd_run(
    config_path: PathBuf,
    json_output: bool,
    store_path: Option<PathBuf>,
    name: Option<String>,
) -> Result<(), CliError> {
    let mut prepared = prepare(&config_path, name)?;
    let (store, db_path) = open_store(store_path)?;

    let run_id = Uuid::new_v4();
    store
        .begin_run(&prepared.batch, run_id)
        .map_err(|e| CliError::runtime(e.to_string()))?;

    // Durable cache in the same file; fall back to memory if it cannot open.
    let cache: Arc<dyn GeocodeCache> = match SqliteCache::open(&db_path) {
        Ok(cache) => Arc::new(cache),
        Err(e) => {
            log::warn!("geocode cache unavailable ({e}), continuing in-memory");
            Arc::new(MemoryCache::new())
        }
    };

    let geocode = &prepared.config.geocode;
    let orchestrator = Arc::new(Orchestrator::new(
        Orchestrator::waterfall(
            geocode.resolved_geoapify_key(),
            geocode.resolved_positionstack_key(),
            geocode.resolved_google_maps_key(),
        ),
        Arc::new(RateGate::new(Duration::from_millis(geocode.min_interval_ms))),
        cache,
        geocode.region_hint.clone(),
    ));

    let addresses = synthesize_addresses(
        &prepared.system,
        &prepared.system_set,
        &prepared.field_set,
        &prepared.field_columns,
        prepared.mapping.as_ref(),
    );

    let total = prepared.system.len();
    eprintln!("run '{}': geocoding {} record(s)...", prepared.batch.name, total);

    let handle = Runner::new(orchestrator).run(
        run_id,
        RunInput {
            system: std::mem::take(&mut prepared.system),
            field: std::mem::take(&mut prepared.field),
            addresses,
        },
    );

    for (seq, result) in handle.results.iter().enumerate() {
        eprintln!(
            "  [{}/{}] {} — {}",
            seq + 1,
            total,
            result.connote,
            result.category.label(),
        );
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
// validate
// ---------------------------------------------------------------------------

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let (config, base_dir) = load_config(&config_path)?;

    let tiers = 1
        + config.geocode.resolved_geoapify_key().is_some() as usize
        + config.geocode.resolved_positionstack_key().is_some() as usize
        + config.geocode.resolved_google_maps_key().is_some() as usize;

    eprintln!(
        "valid: run '{}', {} geocoding tier(s), {} address mapping",
        config.name,
        tiers,
        if config.address.is_some() {
            "configured"
        } else {
            "fallback"
        },
    );

    // When the mapped dataset is readable, show what the mapping produces.
    if let Some(ref address) = config.address {
        let mapping = address.to_mapping();
        let file = match mapping.source {
            veriroute_engine::mapping::MappingSource::System => &config.system.file,
            veriroute_engine::mapping::MappingSource::Field => &config.field.file,
        };
        let path = base_dir.join(file);
        if let Ok(data) = std::fs::read_to_string(&path) {
            let set = load_rows(&data).map_err(|e| CliError::runtime(e.to_string()))?;
            for (i, preview) in veriroute_engine::mapping::preview(&mapping, set.sample())
                .iter()
                .enumerate()
            {
                eprintln!("  preview {}: {}", i + 1, preview);
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// export + history
// ---------------------------------------------------------------------------

pub fn cmd_export(output: Option<PathBuf>, store_path: Option<PathBuf>) -> Result<(), CliError> {
    let (store, _) = open_store(store_path)?;

    let batch = store
        .latest_batch()
        .map_err(|e| CliError::runtime(e.to_string()))?
        .ok_or_else(|| CliError::runtime("no stored runs").with_hint("run `vroute run` first"))?;
    let results = store
        .results(batch.id)
        .map_err(|e| CliError::runtime(e.to_string()))?;

    match output {
        Some(path) => {
            crate::export::write_csv_file(&results, &path)?;
            eprintln!("wrote {} result(s) to {}", results.len(), path.display());
        }
        None => crate::export::write_csv_stdout(&results)?,
    }
    Ok(())
}

pub fn cmd_history(store_path: Option<PathBuf>) -> Result<(), CliError> {
    let (store, _) = open_store(store_path)?;
    let history = store
        .history()
        .map_err(|e| CliError::runtime(e.to_string()))?;

    if history.is_empty() {
        eprintln!("no finished runs");
        return Ok(());
    }

    for summary in history {
        println!(
            "{}  {}  total={} accurate={} fairly_accurate={} inaccurate={} pending={} error={}",
            summary.finished_at.to_rfc3339(),
            summary.name,
            summary.stats.total,
            summary.stats.accurate,
            summary.stats.fairly_accurate,
            summary.stats.inaccurate,
            summary.stats.pending,
            summary.stats.error,
        );
    }
    Ok(())
}

// Execution modes of the ETL binary.
//
// `transforming` reads the raw collection, runs the full transformation and
// replaces the transformed collection. `training` and `predicting` are
// placeholders for the modeling stages.

use anyhow::{Context, Result};
use tracing::{info, info_span};

use goalcast_core::config::Config;
use goalcast_core::pipeline::transform_matches;
use goalcast_core::record::{RawMatchRecord, TransformedMatchRecord};

use crate::cli::Mode;
use crate::store::{load_records, to_documents, DocumentStore};

/// What a run did, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Transformed { raw: usize, transformed: usize },
    Training { available: usize },
    Predicting,
}

pub fn run(mode: Mode, config: &Config, store: &dyn DocumentStore) -> Result<RunOutcome> {
    let _span = info_span!("etl", %mode).entered();
    info!("execution mode: {mode}");

    match mode {
        Mode::Transforming => transform(config, store),
        Mode::Training => {
            let available = store.count(&config.database.transformed_collection)?;
            info!(available, "transformed soccer matches available for training");
            Ok(RunOutcome::Training { available })
        }
        Mode::Predicting => Ok(RunOutcome::Predicting),
    }
}

/// Load and validate every raw document.
pub fn load_raw_matches(config: &Config, store: &dyn DocumentStore) -> Result<Vec<RawMatchRecord>> {
    let collection = &config.database.raw_collection;
    let records: Vec<RawMatchRecord> = load_records(store, collection)?;
    for (idx, record) in records.iter().enumerate() {
        record
            .validate()
            .with_context(|| format!("document {idx} of {collection} failed validation"))?;
    }
    Ok(records)
}

fn transform(config: &Config, store: &dyn DocumentStore) -> Result<RunOutcome> {
    info!("loading raw soccer matches");
    let raw = load_raw_matches(config, store)?;
    info!(matches = raw.len(), "loaded raw soccer matches");

    let transformed: Vec<TransformedMatchRecord> =
        transform_matches(&raw, &config.columns, config.moving_average.window)
            .context("failed to transform soccer matches")?;

    let collection = &config.database.transformed_collection;
    info!(matches = transformed.len(), collection = %collection, "inserting transformed matches");
    let documents = to_documents(&transformed)?;
    store
        .replace_collection(collection, &documents)
        .with_context(|| format!("failed to replace {collection}"))?;

    Ok(RunOutcome::Transformed {
        raw: raw.len(),
        transformed: transformed.len(),
    })
}

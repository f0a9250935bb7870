// Full transformation from raw match records to modeling-ready records.
//
// Stages run in a fixed order, each consuming the table produced by the
// previous one:
//   labels -> 4 trailing averages -> feature/target ordering -> column drop
//   -> typed records

use thiserror::Error;
use tracing::{info, info_span};

use crate::config::ColumnRoles;
use crate::labels::derive_labels;
use crate::moving_average::generate_moving_average;
use crate::record::{raw_match_table, RawMatchRecord, RecordError, TransformedMatchRecord};
use crate::reshape::{drop_useless_columns, sort_features_targets};
use crate::table::TableError;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("transformed row {row} failed validation: {source}")]
    Validation { row: usize, source: RecordError },
}

/// Run every transformation stage over `records`.
///
/// Matches without `window` earlier matches for both teams are dropped; every
/// other failure aborts the whole run.
pub fn transform_matches(
    records: &[RawMatchRecord],
    roles: &ColumnRoles,
    window: usize,
) -> Result<Vec<TransformedMatchRecord>, TransformError> {
    let table = raw_match_table(records)?;
    info!(matches = table.len(), "starting to transform the soccer matches data");

    let mut table = {
        let _span = info_span!("labels").entered();
        info!("creating winner, goals, over 2 goals and both teams scored columns");
        derive_labels(table, &roles.scores, &roles.new_targets)?
    };

    for pass in roles.average_passes() {
        let _span = info_span!("moving_average", column = pass.column).entered();
        info!("generating moving average for {}", pass.description);
        table = generate_moving_average(
            table,
            &roles.date,
            pass.group,
            pass.value,
            pass.column,
            window,
        )?;
        info!(remaining = table.len(), "moving average done");
    }

    let table = {
        let _span = info_span!("reshape").entered();
        info!("sorting the columns by features and targets");
        let sorted = sort_features_targets(table, &roles.final_features(), &roles.final_targets())?;
        info!("dropping useless columns after transforming");
        drop_useless_columns(sorted, &roles.useless)?
    };

    let _span = info_span!("model").entered();
    info!(matches = table.len(), "modelling soccer matches");
    table
        .rows()
        .iter()
        .enumerate()
        .map(|(row, cells)| {
            TransformedMatchRecord::from_row(table.columns(), cells)
                .map_err(|source| TransformError::Validation { row, source })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

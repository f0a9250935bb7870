// Leakage-safe trailing averages per team.
//
// For every row, the average covers the `window` most recent earlier rows of
// the same group, where "earlier" means a strictly smaller date. Rows that
// share a date never see each other. A row with fewer than `window` earlier
// rows has no average and is removed from the table.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::table::{Cell, MatchTable, TableError};

/// Number of prior matches averaged, and the minimum required to keep a row.
pub const DEFAULT_WINDOW: usize = 6;

/// Grouping value of a row. Team identifiers are text; integer ids are
/// accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey<'a> {
    Text(&'a str),
    Int(i64),
}

/// Round half to even at two decimal places.
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Trailing mean of `values` for each position, or `None` where fewer than
/// `window` strictly earlier entries of the same group exist.
///
/// Each group is stably sorted by date, so among earlier entries that share
/// a date the input order decides which ones fall inside the window. The
/// three slices must have equal length.
pub fn trailing_means<K>(
    dates: &[NaiveDate],
    groups: &[K],
    values: &[f64],
    window: usize,
) -> Vec<Option<f64>>
where
    K: Eq + std::hash::Hash,
{
    let mut by_group: HashMap<&K, Vec<usize>> = HashMap::new();
    for (idx, key) in groups.iter().enumerate() {
        by_group.entry(key).or_default().push(idx);
    }

    let mut means = vec![None; dates.len()];
    if window == 0 {
        return means;
    }

    for indices in by_group.values_mut() {
        indices.sort_by_key(|&i| dates[i]);

        // indices[..start] all precede the date run starting at `start`.
        let mut start = 0;
        while start < indices.len() {
            let date = dates[indices[start]];
            let end = start
                + indices[start..]
                    .iter()
                    .take_while(|&&i| dates[i] == date)
                    .count();

            if start >= window {
                let sum: f64 = indices[start - window..start]
                    .iter()
                    .map(|&i| values[i])
                    .sum();
                let mean = round_to_cents(sum / window as f64);
                for &i in &indices[start..end] {
                    means[i] = Some(mean);
                }
            }
            start = end;
        }
    }

    means
}

/// Add `new_column` holding the trailing mean of `value_column` over the
/// previous `window` matches of the row's `group_column` value, then remove
/// every row without a full window.
pub fn generate_moving_average(
    table: MatchTable,
    date_column: &str,
    group_column: &str,
    value_column: &str,
    new_column: &str,
    window: usize,
) -> Result<MatchTable, TableError> {
    if window == 0 {
        return Err(TableError::ZeroWindow);
    }

    let dates = table.date_column(date_column)?;
    let values = table.number_column(value_column)?;
    let groups = table
        .column(group_column)?
        .enumerate()
        .map(|(row, cell)| match cell {
            Cell::Text(s) => Ok(GroupKey::Text(s)),
            Cell::Int(v) => Ok(GroupKey::Int(*v)),
            other => Err(TableError::CellType {
                column: group_column.to_string(),
                row,
                expected: "text or integer",
                found: other.kind(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let means = trailing_means(&dates, &groups, &values, window);

    let keep: Vec<bool> = means.iter().map(Option::is_some).collect();
    let kept: Vec<Cell> = means.into_iter().flatten().map(Cell::Float).collect();
    debug!(
        column = new_column,
        rows_in = keep.len(),
        rows_kept = kept.len(),
        "computed trailing average"
    );

    table.retain_rows(&keep)?.with_column(new_column, kept)
}

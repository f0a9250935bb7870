// Column ordering and removal for the final feature/target layout.

use crate::table::{MatchTable, TableError};

/// Order columns as `features ++ targets`, excluding every other column.
/// Fails if a listed column is absent.
pub fn sort_features_targets(
    table: MatchTable,
    features: &[String],
    targets: &[String],
) -> Result<MatchTable, TableError> {
    let ordered: Vec<String> = features.iter().chain(targets).cloned().collect();
    table.select(&ordered)
}

/// Remove columns that were only needed during the transformation (dates,
/// team identifiers). An absent column is an error.
pub fn drop_useless_columns(table: MatchTable, columns: &[String]) -> Result<MatchTable, TableError> {
    table.drop_columns(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;

    fn names(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    fn sample() -> MatchTable {
        let mut table =
            MatchTable::new(names(&["score1", "team1", "spi1", "winner", "avg"])).unwrap();
        table
            .push_row(vec![
                Cell::Int(2),
                Cell::Text("Celtic".into()),
                Cell::Float(72.4),
                Cell::Int(0),
                Cell::Float(1.83),
            ])
            .unwrap();
        table
            .push_row(vec![
                Cell::Int(1),
                Cell::Text("Rangers".into()),
                Cell::Float(70.1),
                Cell::Int(1),
                Cell::Float(2.0),
            ])
            .unwrap();
        table
    }

    #[test]
    fn sorts_features_before_targets() {
        let table = sort_features_targets(
            sample(),
            &names(&["team1", "spi1", "avg"]),
            &names(&["score1", "winner"]),
        )
        .unwrap();
        assert_eq!(
            table.columns(),
            names(&["team1", "spi1", "avg", "score1", "winner"]).as_slice()
        );
    }

    #[test]
    fn sorting_excludes_unlisted_columns() {
        let table =
            sort_features_targets(sample(), &names(&["spi1"]), &names(&["winner"])).unwrap();
        assert_eq!(table.columns(), names(&["spi1", "winner"]).as_slice());
        assert_eq!(table.rows()[1], vec![Cell::Float(70.1), Cell::Int(1)]);
    }

    #[test]
    fn sorting_fails_on_absent_column() {
        let err = sort_features_targets(sample(), &names(&["spi1", "spi2"]), &names(&[]))
            .unwrap_err();
        assert_eq!(err, TableError::MissingColumn("spi2".into()));
    }

    #[test]
    fn reshaping_preserves_values() {
        let original = sample();
        let features = names(&["avg", "spi1", "team1"]);
        let targets = names(&["winner", "score1"]);
        let reshaped = sort_features_targets(original.clone(), &features, &targets).unwrap();

        // Reading each column back by name yields the original values.
        for name in original.columns() {
            let before: Vec<&Cell> = original.column(name).unwrap().collect();
            let after: Vec<&Cell> = reshaped.column(name).unwrap().collect();
            assert_eq!(before, after, "column {name}");
        }
    }

    #[test]
    fn drops_named_columns() {
        let table = drop_useless_columns(sample(), &names(&["team1"])).unwrap();
        assert_eq!(table.columns(), names(&["score1", "spi1", "winner", "avg"]).as_slice());
    }

    #[test]
    fn dropping_absent_column_fails() {
        let table = drop_useless_columns(sample(), &names(&["team1"])).unwrap();
        let err = drop_useless_columns(table, &names(&["team1"])).unwrap_err();
        assert_eq!(err, TableError::MissingColumn("team1".into()));
    }
}

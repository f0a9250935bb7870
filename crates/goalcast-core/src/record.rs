// Typed match records: the raw schema produced by ingestion and the
// transformed schema handed to modeling.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::table::{Cell, MatchTable, TableError};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("missing field `{0}`")]
    MissingField(String),

    #[error("unexpected field `{0}`")]
    UnexpectedField(String),

    #[error("field `{field}` expected {expected}, found {found}")]
    WrongType {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("field `{field}`: {message}")]
    InvalidValue { field: String, message: String },
}

fn invalid(field: &str, message: impl Into<String>) -> RecordError {
    RecordError::InvalidValue {
        field: field.to_string(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// RawMatchRecord
// ---------------------------------------------------------------------------

/// One historical match as ingested from the source CSV. Serialized names
/// follow the source columns (`team1`, `spi1`, `score1`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawMatchRecord {
    pub date: NaiveDate,
    pub season: i32,
    pub league: String,
    #[serde(rename = "team1")]
    pub home_team: String,
    #[serde(rename = "team2")]
    pub away_team: String,
    #[serde(rename = "spi1")]
    pub home_strength_index: f64,
    #[serde(rename = "spi2")]
    pub away_strength_index: f64,
    #[serde(rename = "prob1")]
    pub home_win_prob: f64,
    #[serde(rename = "probtie")]
    pub draw_prob: f64,
    #[serde(rename = "prob2")]
    pub away_win_prob: f64,
    #[serde(rename = "proj_score1")]
    pub projected_home_goals: u32,
    #[serde(rename = "proj_score2")]
    pub projected_away_goals: u32,
    #[serde(rename = "score1")]
    pub home_score: u32,
    #[serde(rename = "score2")]
    pub away_score: u32,
}

impl RawMatchRecord {
    /// Column names of the raw schema, in table order.
    pub const FIELDS: [&'static str; 14] = [
        "date",
        "season",
        "league",
        "team1",
        "team2",
        "spi1",
        "spi2",
        "prob1",
        "probtie",
        "prob2",
        "proj_score1",
        "proj_score2",
        "score1",
        "score2",
    ];

    /// Cell kind of each column in [`RawMatchRecord::FIELDS`], as reported by
    /// [`Cell::kind`].
    pub const FIELD_KINDS: [&'static str; 14] = [
        "date", "integer", "text", "text", "text", "float", "float", "float", "float", "float",
        "integer", "integer", "integer", "integer",
    ];

    /// Cell kind of a raw column, or `None` for a name outside the schema.
    pub fn field_kind(name: &str) -> Option<&'static str> {
        Self::FIELDS
            .iter()
            .position(|f| *f == name)
            .map(|idx| Self::FIELD_KINDS[idx])
    }

    /// The value of one raw column by name.
    pub fn cell(&self, name: &str) -> Option<Cell> {
        let idx = Self::FIELDS.iter().position(|f| *f == name)?;
        self.to_cells().into_iter().nth(idx)
    }

    /// Check the invariants serde cannot express: non-empty identifiers,
    /// finite ratings, probabilities within `[0, 1]`.
    pub fn validate(&self) -> Result<(), RecordError> {
        for (field, value) in [
            ("league", &self.league),
            ("team1", &self.home_team),
            ("team2", &self.away_team),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(field, "must not be empty"));
            }
        }

        for (field, value) in [
            ("spi1", self.home_strength_index),
            ("spi2", self.away_strength_index),
        ] {
            if !value.is_finite() {
                return Err(invalid(field, format!("must be finite, got {value}")));
            }
        }

        for (field, value) in [
            ("prob1", self.home_win_prob),
            ("probtie", self.draw_prob),
            ("prob2", self.away_win_prob),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, format!("must be within [0, 1], got {value}")));
            }
        }

        Ok(())
    }

    /// Cells in [`RawMatchRecord::FIELDS`] order.
    pub fn to_cells(&self) -> Vec<Cell> {
        vec![
            Cell::Date(self.date),
            Cell::Int(i64::from(self.season)),
            Cell::Text(self.league.clone()),
            Cell::Text(self.home_team.clone()),
            Cell::Text(self.away_team.clone()),
            Cell::Float(self.home_strength_index),
            Cell::Float(self.away_strength_index),
            Cell::Float(self.home_win_prob),
            Cell::Float(self.draw_prob),
            Cell::Float(self.away_win_prob),
            Cell::Int(i64::from(self.projected_home_goals)),
            Cell::Int(i64::from(self.projected_away_goals)),
            Cell::Int(i64::from(self.home_score)),
            Cell::Int(i64::from(self.away_score)),
        ]
    }
}

/// Build a table with one row per raw record, preserving input order.
pub fn raw_match_table(records: &[RawMatchRecord]) -> Result<MatchTable, TableError> {
    let columns = RawMatchRecord::FIELDS.iter().map(|f| f.to_string()).collect();
    let mut table = MatchTable::new(columns)?;
    for record in records {
        table.push_row(record.to_cells())?;
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// TransformedMatchRecord
// ---------------------------------------------------------------------------

/// One match ready for modeling: pre-match ratings and projections, four
/// trailing goal averages, the actual score and the four derived labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformedMatchRecord {
    #[serde(rename = "spi1")]
    pub home_strength_index: f64,
    #[serde(rename = "spi2")]
    pub away_strength_index: f64,
    #[serde(rename = "prob1")]
    pub home_win_prob: f64,
    #[serde(rename = "probtie")]
    pub draw_prob: f64,
    #[serde(rename = "prob2")]
    pub away_win_prob: f64,
    #[serde(rename = "proj_score1")]
    pub projected_home_goals: u32,
    #[serde(rename = "proj_score2")]
    pub projected_away_goals: u32,
    #[serde(rename = "team1_score1_mean_last_6")]
    pub home_scored_mean: f64,
    #[serde(rename = "team1_score2_mean_last_6")]
    pub home_conceded_mean: f64,
    #[serde(rename = "team2_score2_mean_last_6")]
    pub away_scored_mean: f64,
    #[serde(rename = "team2_score1_mean_last_6")]
    pub away_conceded_mean: f64,
    #[serde(rename = "score1")]
    pub home_score: u32,
    #[serde(rename = "score2")]
    pub away_score: u32,
    pub winner: u8,
    pub goals: u64,
    pub over2: u8,
    pub btts: u8,
}

impl TransformedMatchRecord {
    /// Column names of the transformed schema: features first, then targets.
    pub const FIELDS: [&'static str; 17] = [
        "spi1",
        "spi2",
        "prob1",
        "probtie",
        "prob2",
        "proj_score1",
        "proj_score2",
        "team1_score1_mean_last_6",
        "team1_score2_mean_last_6",
        "team2_score2_mean_last_6",
        "team2_score1_mean_last_6",
        "score1",
        "score2",
        "winner",
        "goals",
        "over2",
        "btts",
    ];

    /// Construct a record from one table row. Every schema field must be
    /// present with the right cell type, and no other column may appear.
    pub fn from_row(columns: &[String], row: &[Cell]) -> Result<Self, RecordError> {
        if let Some(extra) = columns
            .iter()
            .find(|c| !Self::FIELDS.contains(&c.as_str()))
        {
            return Err(RecordError::UnexpectedField(extra.clone()));
        }

        let view = RowView { columns, row };
        Ok(Self {
            home_strength_index: view.float("spi1")?,
            away_strength_index: view.float("spi2")?,
            home_win_prob: view.float("prob1")?,
            draw_prob: view.float("probtie")?,
            away_win_prob: view.float("prob2")?,
            projected_home_goals: view.count("proj_score1")?,
            projected_away_goals: view.count("proj_score2")?,
            home_scored_mean: view.float("team1_score1_mean_last_6")?,
            home_conceded_mean: view.float("team1_score2_mean_last_6")?,
            away_scored_mean: view.float("team2_score2_mean_last_6")?,
            away_conceded_mean: view.float("team2_score1_mean_last_6")?,
            home_score: view.count("score1")?,
            away_score: view.count("score2")?,
            winner: view.flag("winner")?,
            goals: view.total("goals")?,
            over2: view.flag("over2")?,
            btts: view.flag("btts")?,
        })
    }
}

/// Typed lookups into a single row by column name.
struct RowView<'a> {
    columns: &'a [String],
    row: &'a [Cell],
}

impl RowView<'_> {
    fn cell(&self, field: &str) -> Result<&Cell, RecordError> {
        self.columns
            .iter()
            .position(|c| c == field)
            .and_then(|idx| self.row.get(idx))
            .ok_or_else(|| RecordError::MissingField(field.to_string()))
    }

    fn float(&self, field: &str) -> Result<f64, RecordError> {
        match self.cell(field)? {
            Cell::Float(v) if v.is_finite() => Ok(*v),
            Cell::Float(v) => Err(invalid(field, format!("must be finite, got {v}"))),
            other => Err(RecordError::WrongType {
                field: field.to_string(),
                expected: "float",
                found: other.kind(),
            }),
        }
    }

    fn int(&self, field: &str) -> Result<i64, RecordError> {
        match self.cell(field)? {
            Cell::Int(v) => Ok(*v),
            other => Err(RecordError::WrongType {
                field: field.to_string(),
                expected: "integer",
                found: other.kind(),
            }),
        }
    }

    fn count(&self, field: &str) -> Result<u32, RecordError> {
        let v = self.int(field)?;
        u32::try_from(v).map_err(|_| invalid(field, format!("must be a non-negative count, got {v}")))
    }

    fn total(&self, field: &str) -> Result<u64, RecordError> {
        let v = self.int(field)?;
        u64::try_from(v).map_err(|_| invalid(field, format!("must be a non-negative total, got {v}")))
    }

    fn flag(&self, field: &str) -> Result<u8, RecordError> {
        match self.int(field)? {
            0 => Ok(0),
            1 => Ok(1),
            v => Err(invalid(field, format!("must be 0 or 1, got {v}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raw() -> RawMatchRecord {
        RawMatchRecord {
            date: NaiveDate::from_ymd_opt(2019, 8, 9).unwrap(),
            season: 2019,
            league: "Barclays Premier League".into(),
            home_team: "Liverpool".into(),
            away_team: "Norwich City".into(),
            home_strength_index: 89.67,
            away_strength_index: 60.01,
            home_win_prob: 0.8843,
            draw_prob: 0.0829,
            away_win_prob: 0.0328,
            projected_home_goals: 3,
            projected_away_goals: 0,
            home_score: 4,
            away_score: 1,
        }
    }

    fn transformed_columns() -> Vec<String> {
        TransformedMatchRecord::FIELDS.iter().map(|f| f.to_string()).collect()
    }

    fn transformed_cells() -> Vec<Cell> {
        vec![
            Cell::Float(89.67),
            Cell::Float(60.01),
            Cell::Float(0.8843),
            Cell::Float(0.0829),
            Cell::Float(0.0328),
            Cell::Int(3),
            Cell::Int(0),
            Cell::Float(2.17),
            Cell::Float(0.83),
            Cell::Float(1.0),
            Cell::Float(1.5),
            Cell::Int(4),
            Cell::Int(1),
            Cell::Int(0),
            Cell::Int(5),
            Cell::Int(1),
            Cell::Int(1),
        ]
    }

    #[test]
    fn valid_raw_record_passes() {
        assert!(sample_raw().validate().is_ok());
    }

    #[test]
    fn empty_team_rejected() {
        let record = RawMatchRecord {
            away_team: "  ".into(),
            ..sample_raw()
        };
        let err = record.validate().unwrap_err();
        assert!(matches!(err, RecordError::InvalidValue { ref field, .. } if field == "team2"));
    }

    #[test]
    fn probability_out_of_range_rejected() {
        let record = RawMatchRecord {
            draw_prob: 1.2,
            ..sample_raw()
        };
        let err = record.validate().unwrap_err();
        assert!(matches!(err, RecordError::InvalidValue { ref field, .. } if field == "probtie"));
    }

    #[test]
    fn non_finite_rating_rejected() {
        let record = RawMatchRecord {
            home_strength_index: f64::NAN,
            ..sample_raw()
        };
        assert!(record.validate().is_err());
    }

    #[test]
    fn raw_document_uses_source_column_names() {
        let json = serde_json::to_value(sample_raw()).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), RawMatchRecord::FIELDS.len());
        for field in RawMatchRecord::FIELDS {
            assert!(object.contains_key(field), "missing {field}");
        }
        assert_eq!(object["date"], "2019-08-09");
        assert_eq!(object["team1"], "Liverpool");
    }

    #[test]
    fn raw_document_with_missing_field_rejected() {
        let mut json = serde_json::to_value(sample_raw()).unwrap();
        json.as_object_mut().unwrap().remove("score2");
        assert!(serde_json::from_value::<RawMatchRecord>(json).is_err());
    }

    #[test]
    fn raw_table_has_one_row_per_record() {
        let table = raw_match_table(&[sample_raw(), sample_raw()]).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.columns().len(), RawMatchRecord::FIELDS.len());
        assert_eq!(table.rows()[0][3], Cell::Text("Liverpool".into()));
        assert_eq!(table.rows()[0][12], Cell::Int(4));
    }

    #[test]
    fn transformed_from_complete_row() {
        let record =
            TransformedMatchRecord::from_row(&transformed_columns(), &transformed_cells()).unwrap();
        assert_eq!(record.projected_home_goals, 3);
        assert!((record.home_scored_mean - 2.17).abs() < f64::EPSILON);
        assert_eq!(record.goals, 5);
        assert_eq!(record.winner, 0);
        assert_eq!(record.btts, 1);
    }

    #[test]
    fn raw_field_kinds_match_cells() {
        let cells = sample_raw().to_cells();
        for (idx, field) in RawMatchRecord::FIELDS.iter().enumerate() {
            assert_eq!(RawMatchRecord::field_kind(field), Some(cells[idx].kind()), "{field}");
        }
        assert_eq!(RawMatchRecord::field_kind("xg1"), None);
    }

    #[test]
    fn raw_cell_by_name() {
        let record = sample_raw();
        assert_eq!(record.cell("season"), Some(Cell::Int(2019)));
        assert_eq!(record.cell("team2"), Some(Cell::Text("Norwich City".into())));
        assert_eq!(record.cell("xg1"), None);
    }

    #[test]
    fn transformed_goals_beyond_u32_accepted() {
        let mut cells = transformed_cells();
        cells[14] = Cell::Int(i64::from(u32::MAX) + 1);
        let record = TransformedMatchRecord::from_row(&transformed_columns(), &cells).unwrap();
        assert_eq!(record.goals, u64::from(u32::MAX) + 1);
    }

    #[test]
    fn transformed_from_row_in_any_column_order() {
        let mut columns = transformed_columns();
        let mut cells = transformed_cells();
        columns.reverse();
        cells.reverse();
        let record = TransformedMatchRecord::from_row(&columns, &cells).unwrap();
        assert_eq!(record.home_score, 4);
        assert_eq!(record.away_score, 1);
    }

    #[test]
    fn transformed_missing_field_rejected() {
        let mut columns = transformed_columns();
        let mut cells = transformed_cells();
        columns.pop();
        cells.pop();
        let err = TransformedMatchRecord::from_row(&columns, &cells).unwrap_err();
        assert_eq!(err, RecordError::MissingField("btts".into()));
    }

    #[test]
    fn transformed_extra_field_rejected() {
        let mut columns = transformed_columns();
        let mut cells = transformed_cells();
        columns.push("team1".into());
        cells.push(Cell::Text("Liverpool".into()));
        let err = TransformedMatchRecord::from_row(&columns, &cells).unwrap_err();
        assert_eq!(err, RecordError::UnexpectedField("team1".into()));
    }

    #[test]
    fn transformed_wrong_type_rejected() {
        let mut cells = transformed_cells();
        cells[0] = Cell::Text("89.67".into());
        let err = TransformedMatchRecord::from_row(&transformed_columns(), &cells).unwrap_err();
        assert_eq!(
            err,
            RecordError::WrongType {
                field: "spi1".into(),
                expected: "float",
                found: "text",
            }
        );
    }

    #[test]
    fn transformed_label_outside_binary_rejected() {
        let mut cells = transformed_cells();
        cells[13] = Cell::Int(2);
        let err = TransformedMatchRecord::from_row(&transformed_columns(), &cells).unwrap_err();
        assert!(matches!(err, RecordError::InvalidValue { ref field, .. } if field == "winner"));
    }

    #[test]
    fn transformed_document_field_names_match_schema() {
        let record =
            TransformedMatchRecord::from_row(&transformed_columns(), &transformed_cells()).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), TransformedMatchRecord::FIELDS.len());
        for field in TransformedMatchRecord::FIELDS {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }
}

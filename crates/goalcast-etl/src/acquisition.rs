// Match data acquisition: download the SPI match CSV, parse it into raw
// records, keep the configured seasons and store them in the raw collection.
//
// The source file carries many more columns than the raw schema and lists
// fixtures that have not been played yet (empty scores). Extra columns are
// ignored and incomplete rows are skipped.

use std::io::Read;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info, info_span, Instrument};

use goalcast_core::config::{Config, SeasonFilter};
use goalcast_core::record::{RawMatchRecord, RecordError};

use crate::store::DocumentStore;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("failed to download {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: `{field}` {message}")]
    InvalidValue {
        line: u64,
        field: &'static str,
        message: String,
    },

    #[error("line {line}: {source}")]
    Validation { line: u64, source: RecordError },
}

// ---------------------------------------------------------------------------
// CSV row (private)
// ---------------------------------------------------------------------------

/// One row of the SPI match CSV, restricted to the raw schema columns. Every
/// cell is optional so that unplayed fixtures can be told apart from
/// malformed ones.
#[derive(Debug, Deserialize)]
struct SpiCsvRow {
    date: Option<NaiveDate>,
    season: Option<i32>,
    league: Option<String>,
    team1: Option<String>,
    team2: Option<String>,
    spi1: Option<f64>,
    spi2: Option<f64>,
    prob1: Option<f64>,
    probtie: Option<f64>,
    prob2: Option<f64>,
    proj_score1: Option<f64>,
    proj_score2: Option<f64>,
    score1: Option<f64>,
    score2: Option<f64>,
}

/// Projected goals are decimals in the source; the integer schema truncates
/// them toward zero.
fn projected_goals(line: u64, field: &'static str, value: f64) -> Result<u32, AcquisitionError> {
    if !value.is_finite() || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(AcquisitionError::InvalidValue {
            line,
            field,
            message: format!("must be a non-negative number, got {value}"),
        });
    }
    Ok(value.trunc() as u32)
}

fn actual_goals(line: u64, field: &'static str, value: f64) -> Result<u32, AcquisitionError> {
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(AcquisitionError::InvalidValue {
            line,
            field,
            message: format!("must be a non-negative whole number, got {value}"),
        });
    }
    Ok(value as u32)
}

impl SpiCsvRow {
    /// Convert into a validated record. `Ok(None)` when any selected cell is
    /// empty.
    fn into_record(self, line: u64) -> Result<Option<RawMatchRecord>, AcquisitionError> {
        let (
            Some(date),
            Some(season),
            Some(league),
            Some(home_team),
            Some(away_team),
            Some(spi1),
            Some(spi2),
            Some(prob1),
            Some(probtie),
            Some(prob2),
            Some(proj_score1),
            Some(proj_score2),
            Some(score1),
            Some(score2),
        ) = (
            self.date,
            self.season,
            self.league,
            self.team1,
            self.team2,
            self.spi1,
            self.spi2,
            self.prob1,
            self.probtie,
            self.prob2,
            self.proj_score1,
            self.proj_score2,
            self.score1,
            self.score2,
        )
        else {
            return Ok(None);
        };

        let record = RawMatchRecord {
            date,
            season,
            league,
            home_team,
            away_team,
            home_strength_index: spi1,
            away_strength_index: spi2,
            home_win_prob: prob1,
            draw_prob: probtie,
            away_win_prob: prob2,
            projected_home_goals: projected_goals(line, "proj_score1", proj_score1)?,
            projected_away_goals: projected_goals(line, "proj_score2", proj_score2)?,
            home_score: actual_goals(line, "score1", score1)?,
            away_score: actual_goals(line, "score2", score2)?,
        };
        record
            .validate()
            .map_err(|source| AcquisitionError::Validation { line, source })?;
        Ok(Some(record))
    }
}

// ---------------------------------------------------------------------------
// Parsing and filtering
// ---------------------------------------------------------------------------

/// Records parsed from one CSV, plus the number of incomplete rows skipped.
#[derive(Debug, Default)]
pub struct ParsedMatches {
    pub records: Vec<RawMatchRecord>,
    pub incomplete: usize,
}

/// Parse SPI match CSV data. Rows with an empty selected cell are skipped; a
/// cell that does not parse or a record that fails validation is an error.
pub fn parse_matches_from_reader<R: Read>(reader: R) -> Result<ParsedMatches, AcquisitionError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let mut parsed = ParsedMatches::default();
    for result in rdr.records() {
        let raw = result?;
        let line = raw.position().map_or(0, |p| p.line());
        let row: SpiCsvRow = raw.deserialize(Some(&headers))?;
        match row.into_record(line)? {
            Some(record) => parsed.records.push(record),
            None => parsed.incomplete += 1,
        }
    }
    Ok(parsed)
}

/// Keep records whose `season_column` value lies within the inclusive filter
/// range. Records without an integer value in that column are dropped.
pub fn filter_seasons(
    records: Vec<RawMatchRecord>,
    season_column: &str,
    seasons: &SeasonFilter,
) -> Vec<RawMatchRecord> {
    records
        .into_iter()
        .filter(|r| {
            r.cell(season_column)
                .and_then(|cell| cell.as_int())
                .and_then(|season| i32::try_from(season).ok())
                .is_some_and(|season| seasons.contains(season))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Where the CSV text comes from.
#[async_trait]
pub trait MatchSource: Send + Sync {
    async fn fetch(&self) -> Result<String, AcquisitionError>;
}

/// Downloads the CSV over HTTP.
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl MatchSource for HttpSource {
    async fn fetch(&self) -> Result<String, AcquisitionError> {
        let http = |source| AcquisitionError::Http {
            url: self.url.clone(),
            source,
        };
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(http)?
            .error_for_status()
            .map_err(http)?;
        response.text().await.map_err(http)
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// Counts reported by a collector run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectSummary {
    pub parsed: usize,
    pub incomplete: usize,
    pub stored: usize,
}

/// Fetch, parse and filter the source, then replace the raw collection with
/// one document per record.
pub async fn collect(
    config: &Config,
    source: &dyn MatchSource,
    store: &dyn DocumentStore,
) -> anyhow::Result<CollectSummary> {
    let text = source
        .fetch()
        .instrument(info_span!("download"))
        .await
        .context("failed to download soccer matches data")?;
    debug!(bytes = text.len(), "downloaded match data");

    let _span = info_span!("collect").entered();
    let parsed =
        parse_matches_from_reader(text.as_bytes()).context("failed to parse soccer matches data")?;
    let total = parsed.records.len();
    let records = filter_seasons(parsed.records, &config.columns.season, &config.seasons);
    info!(
        parsed = total,
        incomplete = parsed.incomplete,
        kept = records.len(),
        "filtered seasons {}..={}",
        config.seasons.initial_season,
        config.seasons.final_season
    );

    let collection = &config.database.raw_collection;
    let removed = store.drop_collection(collection)?;
    if removed > 0 {
        info!(removed, "cleared previous raw collection");
    }

    for record in &records {
        let document = serde_json::to_value(record).context("failed to serialize raw match")?;
        store.insert_one(collection, &document)?;
    }
    info!(stored = records.len(), collection = %collection, "inserted raw soccer matches");

    Ok(CollectSummary {
        parsed: total,
        incomplete: parsed.incomplete,
        stored: records.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "season,date,league_id,league,team1,team2,spi1,spi2,prob1,prob2,probtie,proj_score1,proj_score2,importance1,importance2,score1,score2,xg1,xg2,nsxg1,nsxg2,adj_score1,adj_score2";

    fn csv(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    const PLAYED: &str = "2019,2019-08-09,2411,Barclays Premier League,Liverpool,Norwich City,89.67,60.01,0.8843,0.0328,0.0829,3.06,0.58,39.2,29.5,4,1,2.23,1.28,2.39,0.79,3.78,1.05";
    const UNPLAYED: &str = "2021,2021-08-13,2411,Barclays Premier League,Brentford,Arsenal,63.42,75.57,0.3311,0.4074,0.2615,1.19,1.42,,,,,,,,,,";

    #[test]
    fn parses_played_match() {
        let parsed = parse_matches_from_reader(csv(&[PLAYED]).as_bytes()).unwrap();
        assert_eq!(parsed.incomplete, 0);
        assert_eq!(parsed.records.len(), 1);

        let record = &parsed.records[0];
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2019, 8, 9).unwrap());
        assert_eq!(record.season, 2019);
        assert_eq!(record.home_team, "Liverpool");
        assert_eq!(record.away_team, "Norwich City");
        assert_eq!(record.home_win_prob, 0.8843);
        assert_eq!(record.draw_prob, 0.0829);
        assert_eq!(record.away_win_prob, 0.0328);
        assert_eq!(record.home_score, 4);
        assert_eq!(record.away_score, 1);
    }

    #[test]
    fn projected_goals_are_truncated() {
        let parsed = parse_matches_from_reader(csv(&[PLAYED]).as_bytes()).unwrap();
        assert_eq!(parsed.records[0].projected_home_goals, 3);
        assert_eq!(parsed.records[0].projected_away_goals, 0);
    }

    #[test]
    fn unplayed_fixture_is_skipped() {
        let parsed = parse_matches_from_reader(csv(&[PLAYED, UNPLAYED]).as_bytes()).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.incomplete, 1);
    }

    #[test]
    fn unparseable_cell_is_fatal() {
        let bad = PLAYED.replace("89.67", "strong");
        let err = parse_matches_from_reader(csv(&[&bad]).as_bytes()).unwrap_err();
        assert!(matches!(err, AcquisitionError::Csv(_)));
    }

    #[test]
    fn fractional_score_is_fatal() {
        let bad = PLAYED.replace(",4,1,", ",4.5,1,");
        let err = parse_matches_from_reader(csv(&[&bad]).as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            AcquisitionError::InvalidValue { field: "score1", .. }
        ));
    }

    #[test]
    fn invalid_probability_is_fatal() {
        let bad = PLAYED.replace("0.0829", "1.0829");
        let err = parse_matches_from_reader(csv(&[&bad]).as_bytes()).unwrap_err();
        match err {
            AcquisitionError::Validation { line, source } => {
                assert_eq!(line, 2);
                assert!(matches!(source, RecordError::InvalidValue { ref field, .. } if field == "probtie"));
            }
            other => panic!("expected Validation, got: {other}"),
        }
    }

    #[test]
    fn season_filter_is_inclusive() {
        let rows: Vec<String> = (2016..=2021)
            .map(|season| PLAYED.replacen("2019", &season.to_string(), 1))
            .collect();
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        let parsed = parse_matches_from_reader(csv(&refs).as_bytes()).unwrap();

        let filter = SeasonFilter {
            initial_season: 2018,
            final_season: 2020,
        };
        let seasons: Vec<i32> = filter_seasons(parsed.records, "season", &filter)
            .iter()
            .map(|r| r.season)
            .collect();
        assert_eq!(seasons, vec![2018, 2019, 2020]);
    }

    #[test]
    fn season_filter_reads_configured_column() {
        let rows: Vec<String> = (2016..=2021)
            .map(|season| PLAYED.replacen("2019", &season.to_string(), 1))
            .collect();
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        let parsed = parse_matches_from_reader(csv(&refs).as_bytes()).unwrap();
        let filter = SeasonFilter {
            initial_season: 2018,
            final_season: 2020,
        };

        // Every row is a 4-1 home win.
        let by_score = SeasonFilter {
            initial_season: 4,
            final_season: 4,
        };
        assert_eq!(filter_seasons(parsed.records.clone(), "score1", &by_score).len(), 6);
        assert!(filter_seasons(parsed.records.clone(), "score1", &filter).is_empty());
        // Columns outside the raw schema or without integer values match nothing.
        assert!(filter_seasons(parsed.records.clone(), "edition", &filter).is_empty());
        assert!(filter_seasons(parsed.records, "team1", &filter).is_empty());
    }
}

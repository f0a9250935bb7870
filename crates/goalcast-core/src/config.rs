// Configuration loading and validation (goalcast.toml).
//
// The column role registry names every column the transformation touches.
// It is resolved and checked once at startup so that a bad column name fails
// before any data is read.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::moving_average::DEFAULT_WINDOW;
use crate::record::{RawMatchRecord, TransformedMatchRecord};

/// File name of the configuration inside `config/` and `defaults/`.
pub const CONFIG_FILE: &str = "goalcast.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

fn validation(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub seasons: SeasonFilter,
    pub columns: ColumnRoles,
    pub moving_average: MovingAverageConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub url: String,
}

/// Inclusive range of seasons kept by the collector.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SeasonFilter {
    pub initial_season: i32,
    pub final_season: i32,
}

impl SeasonFilter {
    pub fn contains(&self, season: i32) -> bool {
        (self.initial_season..=self.final_season).contains(&season)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovingAverageConfig {
    #[serde(default = "default_window")]
    pub window: usize,
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub raw_collection: String,
    pub transformed_collection: String,
}

// ---------------------------------------------------------------------------
// Column role registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TeamColumns {
    pub home: String,
    pub away: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoreColumns {
    pub home: String,
    pub away: String,
}

/// Names of the four trailing-average feature columns.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFeatureColumns {
    pub home_scored_mean: String,
    pub home_conceded_mean: String,
    pub away_scored_mean: String,
    pub away_conceded_mean: String,
}

impl NewFeatureColumns {
    pub fn names(&self) -> [&str; 4] {
        [
            self.home_scored_mean.as_str(),
            self.home_conceded_mean.as_str(),
            self.away_scored_mean.as_str(),
            self.away_conceded_mean.as_str(),
        ]
    }
}

/// Names of the four derived label columns.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTargetColumns {
    pub match_winner: String,
    pub match_goals: String,
    pub over_2_goals: String,
    pub both_teams_scored: String,
}

impl NewTargetColumns {
    pub fn names(&self) -> [&str; 4] {
        [
            self.match_winner.as_str(),
            self.match_goals.as_str(),
            self.over_2_goals.as_str(),
            self.both_teams_scored.as_str(),
        ]
    }
}

/// One trailing-average pass: average `value` over previous matches of the
/// team in `group`, written to `column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AveragePass<'a> {
    pub description: &'static str,
    pub group: &'a str,
    pub value: &'a str,
    pub column: &'a str,
}

/// Which column plays which role in the transformation.
#[derive(Debug, Clone)]
pub struct ColumnRoles {
    pub date: String,
    pub season: String,
    pub teams: TeamColumns,
    pub scores: ScoreColumns,
    pub raw_features: Vec<String>,
    pub raw_targets: Vec<String>,
    pub new_features: NewFeatureColumns,
    pub new_targets: NewTargetColumns,
    pub useless: Vec<String>,
}

impl ColumnRoles {
    /// Raw features followed by the trailing-average features.
    pub fn final_features(&self) -> Vec<String> {
        let mut out = self.raw_features.clone();
        out.extend(self.new_features.names().map(String::from));
        out
    }

    /// Raw targets followed by the derived labels.
    pub fn final_targets(&self) -> Vec<String> {
        let mut out = self.raw_targets.clone();
        out.extend(self.new_targets.names().map(String::from));
        out
    }

    /// The four trailing-average passes, in the order they run.
    pub fn average_passes(&self) -> [AveragePass<'_>; 4] {
        [
            AveragePass {
                description: "home team scored goals",
                group: &self.teams.home,
                value: &self.scores.home,
                column: &self.new_features.home_scored_mean,
            },
            AveragePass {
                description: "home team conceded goals",
                group: &self.teams.home,
                value: &self.scores.away,
                column: &self.new_features.home_conceded_mean,
            },
            AveragePass {
                description: "away team scored goals",
                group: &self.teams.away,
                value: &self.scores.away,
                column: &self.new_features.away_scored_mean,
            },
            AveragePass {
                description: "away team conceded goals",
                group: &self.teams.away,
                value: &self.scores.home,
                column: &self.new_features.away_conceded_mean,
            },
        ]
    }

    /// Columns left after reshaping and dropping, in output order.
    pub fn output_columns(&self) -> Vec<String> {
        let useless: HashSet<&str> = self.useless.iter().map(String::as_str).collect();
        self.final_features()
            .into_iter()
            .chain(self.final_targets())
            .filter(|c| !useless.contains(c.as_str()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// goalcast.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire goalcast.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    source: SourceConfig,
    season_filter: SeasonFilter,
    columns: ColumnsSection,
    features_targets: FeaturesTargetsSection,
    new_features: NewFeatureColumns,
    new_targets: NewTargetColumns,
    useless_columns: UselessColumnsSection,
    moving_average: MovingAverageConfig,
    database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct ColumnsSection {
    date: String,
    season: String,
    home_team: String,
    away_team: String,
    home_score: String,
    away_score: String,
}

#[derive(Debug, Clone, Deserialize)]
struct FeaturesTargetsSection {
    raw_features: Vec<String>,
    raw_targets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct UselessColumnsSection {
    names: Vec<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/goalcast.toml` relative to `base_dir`.
///
/// This does not copy defaults; prefer [`load_config`] for the binaries.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = std::fs::read_to_string(&path).map_err(|_| ConfigError::FileNotFound {
        path: path.clone(),
    })?;
    parse_config(&text, &path)
}

/// Parse and validate configuration text. `path` is only used in errors.
pub fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let file: ConfigFile = toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let columns = ColumnRoles {
        date: file.columns.date,
        season: file.columns.season,
        teams: TeamColumns {
            home: file.columns.home_team,
            away: file.columns.away_team,
        },
        scores: ScoreColumns {
            home: file.columns.home_score,
            away: file.columns.away_score,
        },
        raw_features: file.features_targets.raw_features,
        raw_targets: file.features_targets.raw_targets,
        new_features: file.new_features,
        new_targets: file.new_targets,
        useless: file.useless_columns.names,
    };

    let config = Config {
        source: file.source,
        seasons: file.season_filter,
        columns,
        moving_average: file.moving_average,
        database: file.database,
    };

    validate(&config)?;
    Ok(config)
}

/// Copy `defaults/goalcast.toml` into `config/` when it is not there yet.
/// Returns the copied path, if any.
pub fn ensure_config_files(base_dir: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let default_path = base_dir.join("defaults").join(CONFIG_FILE);
    let config_dir = base_dir.join("config");
    let target = config_dir.join(CONFIG_FILE);

    if target.exists() {
        return Ok(None);
    }
    if !default_path.exists() {
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "neither defaults/{CONFIG_FILE} nor config/{CONFIG_FILE} found in {}",
                base_dir.display()
            ),
        });
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;
    std::fs::copy(&default_path, &target).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to copy {}: {e}", default_path.display()),
    })?;

    Ok(Some(target))
}

/// Ensure defaults are copied, then load config relative to `base_dir`.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.source.url.trim().is_empty() {
        return Err(validation("source.url", "must not be empty"));
    }

    let seasons = &config.seasons;
    if seasons.initial_season > seasons.final_season {
        return Err(validation(
            "season_filter.initial_season",
            format!(
                "must not be after final_season ({} > {})",
                seasons.initial_season, seasons.final_season
            ),
        ));
    }

    if config.moving_average.window == 0 {
        return Err(validation("moving_average.window", "must be greater than 0"));
    }

    let db = &config.database;
    let db_fields: &[(&str, &str)] = &[
        ("database.path", db.path.as_str()),
        ("database.raw_collection", db.raw_collection.as_str()),
        ("database.transformed_collection", db.transformed_collection.as_str()),
    ];
    for (name, val) in db_fields {
        if val.trim().is_empty() {
            return Err(validation(name, "must not be empty"));
        }
    }
    if db.raw_collection == db.transformed_collection {
        return Err(validation(
            "database.transformed_collection",
            "must differ from raw_collection",
        ));
    }

    validate_columns(&config.columns)
}

fn validate_columns(roles: &ColumnRoles) -> Result<(), ConfigError> {
    let raw: HashSet<&str> = RawMatchRecord::FIELDS.into_iter().collect();

    // Role columns must exist in the raw table and hold the kind of value
    // their role reads.
    let role_fields: &[(&str, &str, &str)] = &[
        ("columns.date", roles.date.as_str(), "date"),
        ("columns.season", roles.season.as_str(), "integer"),
        ("columns.home_team", roles.teams.home.as_str(), "text"),
        ("columns.away_team", roles.teams.away.as_str(), "text"),
        ("columns.home_score", roles.scores.home.as_str(), "integer"),
        ("columns.away_score", roles.scores.away.as_str(), "integer"),
    ];
    for (name, col, expected) in role_fields {
        match RawMatchRecord::field_kind(col) {
            None => {
                return Err(validation(name, format!("`{col}` is not a raw match column")));
            }
            Some(kind) if kind != *expected => {
                return Err(validation(
                    name,
                    format!("`{col}` is a {kind} column, expected {expected}"),
                ));
            }
            Some(_) => {}
        }
    }

    for (name, cols) in [
        ("features_targets.raw_features", &roles.raw_features),
        ("features_targets.raw_targets", &roles.raw_targets),
    ] {
        if let Some(col) = cols.iter().find(|c| !raw.contains(c.as_str())) {
            return Err(validation(name, format!("`{col}` is not a raw match column")));
        }
    }

    // Derived names must not collide with raw columns or each other.
    let derived: Vec<(&str, &str)> = roles
        .new_features
        .names()
        .into_iter()
        .map(|n| ("new_features", n))
        .chain(roles.new_targets.names().into_iter().map(|n| ("new_targets", n)))
        .collect();
    let mut seen = HashSet::new();
    for (section, col) in &derived {
        if col.trim().is_empty() {
            return Err(validation(section, "column names must not be empty"));
        }
        if raw.contains(col) {
            return Err(validation(
                section,
                format!("`{col}` collides with a raw match column"),
            ));
        }
        if !seen.insert(*col) {
            return Err(validation(section, format!("`{col}` is declared twice")));
        }
    }

    let mut ordered = HashSet::new();
    for col in roles.final_features().iter().chain(&roles.final_targets()) {
        if !ordered.insert(col.clone()) {
            return Err(validation(
                "features_targets",
                format!("`{col}` appears more than once among features and targets"),
            ));
        }
    }

    if let Some(col) = roles.useless.iter().find(|c| !ordered.contains(*c)) {
        return Err(validation(
            "useless_columns.names",
            format!("`{col}` is neither a feature nor a target"),
        ));
    }

    // What survives must be exactly the transformed schema.
    let output: HashSet<String> = roles.output_columns().into_iter().collect();
    let expected: HashSet<String> = TransformedMatchRecord::FIELDS
        .iter()
        .map(|f| f.to_string())
        .collect();
    if output != expected {
        let mut missing: Vec<&String> = expected.difference(&output).collect();
        let mut extra: Vec<&String> = output.difference(&expected).collect();
        missing.sort();
        extra.sort();
        return Err(validation(
            "useless_columns.names",
            format!(
                "output columns do not match the transformed schema (missing: {missing:?}, extra: {extra:?})"
            ),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

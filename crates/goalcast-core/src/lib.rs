// Core transformation engine for soccer match data: typed records, the
// column-named match table, label derivation, leakage-safe trailing averages
// and the feature/target reshaper.

pub mod config;
pub mod labels;
pub mod moving_average;
pub mod pipeline;
pub mod record;
pub mod reshape;
pub mod table;

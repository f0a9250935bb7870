// Match labels derived from the final score.

use tracing::debug;

use crate::config::{NewTargetColumns, ScoreColumns};
use crate::table::{Cell, MatchTable, TableError};

/// 0 when the home side wins, 1 otherwise. Draws and away wins share a code:
/// the label answers "did the home team win?".
pub fn match_winner(home_score: u32, away_score: u32) -> u8 {
    if home_score > away_score {
        return 0;
    }
    1
}

/// Total goals, widened so that no pair of scores can overflow.
pub fn match_goals(home_score: u32, away_score: u32) -> u64 {
    u64::from(home_score) + u64::from(away_score)
}

/// 1 when more than two goals were scored in total.
pub fn over_two_goals(home_score: u32, away_score: u32) -> u8 {
    if match_goals(home_score, away_score) <= 2 {
        return 0;
    }
    1
}

/// 1 when each side scored at least once.
pub fn both_teams_scored(home_score: u32, away_score: u32) -> u8 {
    if home_score == 0 || away_score == 0 {
        return 0;
    }
    1
}

/// Append the four label columns computed from the home and away score
/// columns.
pub fn derive_labels(
    table: MatchTable,
    scores: &ScoreColumns,
    targets: &NewTargetColumns,
) -> Result<MatchTable, TableError> {
    let home = table.count_column(&scores.home)?;
    let away = table.count_column(&scores.away)?;
    debug!(rows = home.len(), "deriving match labels");

    let label = |f: fn(u32, u32) -> i64| -> Vec<Cell> {
        home.iter()
            .zip(&away)
            .map(|(&h, &a)| Cell::Int(f(h, a)))
            .collect()
    };

    let winners = label(|h, a| i64::from(match_winner(h, a)));
    // At most 2 * u32::MAX, which fits in i64.
    let goals = label(|h, a| match_goals(h, a) as i64);
    let over2 = label(|h, a| i64::from(over_two_goals(h, a)));
    let btts = label(|h, a| i64::from(both_teams_scored(h, a)));

    table
        .with_column(&targets.match_winner, winners)?
        .with_column(&targets.match_goals, goals)?
        .with_column(&targets.over_2_goals, over2)?
        .with_column(&targets.both_teams_scored, btts)
}

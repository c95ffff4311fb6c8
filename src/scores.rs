use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ScoreError;

pub const RANKING_LIMIT: usize = 10;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSubmission {
    pub display_name: String,
    pub total_lines: u32,
    pub level: u32,
    pub session_id: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub display_name: String,
    pub level: u32,
    pub total_lines: u32,
}

/// Remote leaderboard: one write per finished game, one read for the table.
pub trait ScoreEndpoint {
    fn submit(&self, score: &ScoreSubmission) -> Result<(), ScoreError>;
    fn rankings(&self) -> Result<Vec<RankingEntry>, ScoreError>;
}

/// In-memory leaderboard. Ranks by lines then level, one row per display name.
#[derive(Clone, Default)]
pub struct Leaderboard {
    scores: Arc<Mutex<Vec<ScoreSubmission>>>,
}

impl Leaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submissions(&self) -> Vec<ScoreSubmission> {
        self.scores.lock().clone()
    }
}

impl ScoreEndpoint for Leaderboard {
    fn submit(&self, score: &ScoreSubmission) -> Result<(), ScoreError> {
        if score.display_name.trim().is_empty() {
            return Err(ScoreError::Rejected("display name is empty".into()));
        }
        self.scores.lock().push(score.clone());
        Ok(())
    }

    fn rankings(&self) -> Result<Vec<RankingEntry>, ScoreError> {
        let mut all = self.scores.lock().clone();
        // stable: earlier submissions win ties
        all.sort_by(|a, b| {
            b.total_lines
                .cmp(&a.total_lines)
                .then(b.level.cmp(&a.level))
        });
        let mut seen = HashSet::new();
        Ok(all
            .into_iter()
            .filter(|s| seen.insert(s.display_name.clone()))
            .take(RANKING_LIMIT)
            .map(|s| RankingEntry {
                display_name: s.display_name,
                level: s.level,
                total_lines: s.total_lines,
            })
            .collect())
    }
}

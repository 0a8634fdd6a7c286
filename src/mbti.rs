//! Personality quiz results: one row per user, plus a type histogram.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::db::models::MbtiResult;

/// The eight trait scores a quiz submission carries. Missing scores are 0.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct Scores {
    pub introversion_score: i64,
    pub extroversion_score: i64,
    pub intuition_score: i64,
    pub sensing_score: i64,
    pub thinking_score: i64,
    pub feeling_score: i64,
    pub judging_score: i64,
    pub perceiving_score: i64,
}

impl Scores {
    /// Four-letter type, one letter per axis. Ties go to the first letter.
    pub fn personality_type(&self) -> String {
        let pick = |a: i64, b: i64, first: char, second: char| if a >= b { first } else { second };
        [
            pick(self.introversion_score, self.extroversion_score, 'I', 'E'),
            pick(self.intuition_score, self.sensing_score, 'N', 'S'),
            pick(self.thinking_score, self.feeling_score, 'T', 'F'),
            pick(self.judging_score, self.perceiving_score, 'J', 'P'),
        ]
        .iter()
        .collect()
    }
}

/// Temperament group for a four-letter type, or `None` if it isn't one.
pub fn category_for(personality_type: &str) -> Option<&'static str> {
    let letters: Vec<char> = personality_type.to_ascii_uppercase().chars().collect();
    if letters.len() != 4 {
        return None;
    }
    match (letters[1], letters[2], letters[3]) {
        ('N', 'T', _) => Some("Analysts"),
        ('N', 'F', _) => Some("Diplomats"),
        ('S', _, 'J') => Some("Sentinels"),
        ('S', _, 'P') => Some("Explorers"),
        _ => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    pub personality_type: Option<String>,
    pub personality_category: Option<String>,
    #[serde(flatten)]
    pub scores: Scores,
}

impl Submission {
    /// Type and category as submitted, or derived from the scores.
    fn labels(&self) -> (String, String) {
        let personality_type = self
            .personality_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.scores.personality_type());
        let personality_category = self
            .personality_category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .or_else(|| category_for(&personality_type).map(str::to_string))
            .unwrap_or_default();
        (personality_type, personality_category)
    }
}

/// Insert or replace the user's result.
pub fn save(conn: &Connection, user_id: &str, submission: &Submission) -> rusqlite::Result<MbtiResult> {
    let (personality_type, personality_category) = submission.labels();
    let s = &submission.scores;
    conn.execute(
        "INSERT INTO mbti_results (
            id, user_id, personality_type, personality_category,
            introversion_score, extroversion_score, intuition_score, sensing_score,
            thinking_score, feeling_score, judging_score, perceiving_score)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(user_id) DO UPDATE SET
            personality_type = excluded.personality_type,
            personality_category = excluded.personality_category,
            introversion_score = excluded.introversion_score,
            extroversion_score = excluded.extroversion_score,
            intuition_score = excluded.intuition_score,
            sensing_score = excluded.sensing_score,
            thinking_score = excluded.thinking_score,
            feeling_score = excluded.feeling_score,
            judging_score = excluded.judging_score,
            perceiving_score = excluded.perceiving_score,
            updated_at = datetime('now')",
        params![
            uuid::Uuid::now_v7().to_string(),
            user_id,
            personality_type,
            personality_category,
            s.introversion_score,
            s.extroversion_score,
            s.intuition_score,
            s.sensing_score,
            s.thinking_score,
            s.feeling_score,
            s.judging_score,
            s.perceiving_score,
        ],
    )?;
    MbtiResult::for_user(conn, user_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub personality_type: String,
    pub count: i64,
}

/// How many users have each type, ordered by type.
pub fn statistics(conn: &Connection) -> rusqlite::Result<Vec<TypeCount>> {
    let mut stmt = conn.prepare(
        "SELECT personality_type, COUNT(*) FROM mbti_results
         GROUP BY personality_type ORDER BY personality_type",
    )?;
    let stats = stmt
        .query_map([], |row| {
            Ok(TypeCount {
                personality_type: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(stats)
}

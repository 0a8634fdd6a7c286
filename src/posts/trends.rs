//! Hashtag trends, recomputed from public post bodies.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use rusqlite::{params, Connection};

use crate::db::models::Trend;

pub const TOP_TRENDS: usize = 20;

static HASHTAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([\p{L}\p{N}_]+)").expect("Invalid hashtag regex"));

/// Every hashtag occurrence in `body`, lower-cased and without the `#`.
pub fn extract_hashtags(body: &str) -> Vec<String> {
    HASHTAG_REGEX
        .captures_iter(body)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Count hashtag occurrences, most frequent first, ties by name.
pub fn rank<'a>(bodies: impl IntoIterator<Item = &'a str>) -> Vec<Trend> {
    let mut counts: HashMap<String, i64> = HashMap::new();
    for body in bodies {
        for tag in extract_hashtags(body) {
            *counts.entry(tag).or_insert(0) += 1;
        }
    }

    let mut trends: Vec<Trend> = counts
        .into_iter()
        .map(|(hashtag, occurences)| Trend {
            hashtag,
            occurences,
        })
        .collect();
    trends.sort_by(|a, b| {
        b.occurences
            .cmp(&a.occurences)
            .then_with(|| a.hashtag.cmp(&b.hashtag))
    });
    trends
}

/// Rebuild the `trends` table from every public post.
pub fn refresh(conn: &Connection) -> rusqlite::Result<usize> {
    let bodies: Vec<String> = {
        let mut stmt = conn.prepare("SELECT body FROM posts WHERE is_private = 0")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };
    let trends = rank(bodies.iter().map(String::as_str));

    conn.execute("DELETE FROM trends", [])?;
    let mut insert = conn.prepare("INSERT INTO trends (hashtag, occurences) VALUES (?1, ?2)")?;
    for trend in &trends {
        insert.execute(params![trend.hashtag, trend.occurences])?;
    }
    tracing::debug!(count = trends.len(), "Trends refreshed");
    Ok(trends.len())
}

pub fn top(conn: &Connection, limit: usize) -> rusqlite::Result<Vec<Trend>> {
    let mut stmt = conn.prepare(
        "SELECT hashtag, occurences FROM trends
         ORDER BY occurences DESC, hashtag ASC LIMIT ?1",
    )?;
    let trends = stmt
        .query_map(params![limit as i64], |row| {
            Ok(Trend {
                hashtag: row.get(0)?,
                occurences: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(trends)
}

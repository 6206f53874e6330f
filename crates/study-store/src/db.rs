//! Database operations for word study.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use study_core::{ReviewRecord, StudySession, StudyStats, Word, WordId};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Connection lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> DbResult<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn init(&self) -> DbResult<()> {
        self.conn()?.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS words (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                term TEXT NOT NULL,
                definition TEXT NOT NULL,
                meanings TEXT NOT NULL DEFAULT '[]',
                examples TEXT NOT NULL DEFAULT '[]',
                word_root TEXT,
                similar_words TEXT NOT NULL DEFAULT '[]',
                exam_tag TEXT,
                familiarity INTEGER NOT NULL DEFAULT 0,
                next_review_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS review_records (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                word_id TEXT NOT NULL REFERENCES words(id) ON DELETE CASCADE,
                correct INTEGER NOT NULL,
                reviewed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS study_sessions (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                started_at TEXT NOT NULL,
                duration_seconds INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS study_stats (
                owner TEXT PRIMARY KEY,
                total_days INTEGER NOT NULL,
                streak_days INTEGER NOT NULL,
                last_study_date TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_words_owner ON words(owner, updated_at);
            CREATE INDEX IF NOT EXISTS idx_words_due ON words(owner, next_review_at);
            CREATE INDEX IF NOT EXISTS idx_reviews_owner ON review_records(owner, reviewed_at);
            CREATE INDEX IF NOT EXISTS idx_sessions_owner ON study_sessions(owner, started_at);
            "#,
        )?;
        Ok(())
    }

    // Word operations

    pub fn insert_word(&self, word: &Word) -> DbResult<()> {
        let conn = self.conn()?;
        insert_word_row(&conn, word)
    }

    /// Insert a batch in one transaction.
    pub fn insert_words(&self, words: &[Word]) -> DbResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for word in words {
            insert_word_row(&tx, word)?;
        }
        tx.commit()?;
        debug!(count = words.len(), "words inserted");
        Ok(())
    }

    pub fn update_word(&self, word: &Word) -> DbResult<()> {
        let conn = self.conn()?;
        update_word_row(&conn, word)
    }

    /// Save a reviewed word and log the review in one transaction.
    pub fn apply_review(&self, word: &Word, review: &ReviewRecord) -> DbResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        update_word_row(&tx, word)?;
        insert_review_row(&tx, review)?;
        tx.commit()?;
        Ok(())
    }

    pub fn delete_word(&self, owner: &str, id: WordId) -> DbResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM review_records WHERE word_id = ?1 AND owner = ?2",
            params![id.to_string(), owner],
        )?;
        let changed = tx.execute(
            "DELETE FROM words WHERE id = ?1 AND owner = ?2",
            params![id.to_string(), owner],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound(format!("word {id}")));
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_word(&self, owner: &str, id: WordId) -> DbResult<Option<Word>> {
        let conn = self.conn()?;
        let word = conn
            .query_row(
                "SELECT * FROM words WHERE id = ?1 AND owner = ?2",
                params![id.to_string(), owner],
                parse_word_row,
            )
            .optional()?;
        Ok(word)
    }

    /// Most recently updated first; `query` matches terms case-insensitively.
    pub fn list_words(&self, owner: &str, query: Option<&str>) -> DbResult<Vec<Word>> {
        let pattern = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(&q.to_lowercase())));

        let conn = self.conn()?;
        let words = match pattern {
            Some(pattern) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM words WHERE owner = ?1 AND lower(term) LIKE ?2 ESCAPE '\\'
                     ORDER BY updated_at DESC, id",
                )?;
                let rows = stmt.query_map(params![owner, pattern], parse_word_row)?;
                rows.collect::<SqlResult<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM words WHERE owner = ?1 ORDER BY updated_at DESC, id",
                )?;
                let rows = stmt.query_map(params![owner], parse_word_row)?;
                rows.collect::<SqlResult<Vec<_>>>()?
            }
        };
        Ok(words)
    }

    pub fn get_due_words(&self, owner: &str, now: DateTime<Utc>) -> DbResult<Vec<Word>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM words
             WHERE owner = ?1 AND next_review_at IS NOT NULL AND next_review_at <= ?2
             ORDER BY next_review_at, id",
        )?;
        let words = stmt
            .query_map(params![owner, to_text(now)], parse_word_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(words)
    }

    pub fn count_words(&self, owner: &str) -> DbResult<usize> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM words WHERE owner = ?1",
            params![owner],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn count_due(&self, owner: &str, now: DateTime<Utc>) -> DbResult<usize> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM words
             WHERE owner = ?1 AND next_review_at IS NOT NULL AND next_review_at <= ?2",
            params![owner, to_text(now)],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    // Review operations

    pub fn insert_review(&self, review: &ReviewRecord) -> DbResult<()> {
        let conn = self.conn()?;
        insert_review_row(&conn, review)
    }

    pub fn count_reviews(
        &self,
        owner: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<usize> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM review_records
             WHERE owner = ?1 AND reviewed_at >= ?2 AND reviewed_at < ?3",
            params![owner, to_text(start), to_text(end)],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Distinct words with a wrong answer, latest mistake first.
    pub fn get_incorrect_word_ids(&self, owner: &str) -> DbResult<Vec<WordId>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT word_id, MAX(reviewed_at) AS last_wrong FROM review_records
             WHERE owner = ?1 AND correct = 0
             GROUP BY word_id
             ORDER BY last_wrong DESC, word_id",
        )?;
        let ids = stmt
            .query_map(params![owner], |row| parse_uuid(row, 0))?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(ids)
    }

    // Session operations

    pub fn insert_session(&self, session: &StudySession) -> DbResult<()> {
        self.conn()?.execute(
            "INSERT INTO study_sessions (id, owner, started_at, duration_seconds)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session.id.to_string(),
                session.owner,
                to_text(session.started_at),
                session.duration_seconds,
            ],
        )?;
        Ok(())
    }

    /// Sessions started in `(now - 7 days, now]`, newest first.
    pub fn get_recent_sessions(&self, owner: &str, now: DateTime<Utc>) -> DbResult<Vec<StudySession>> {
        let since = now - Duration::days(7);
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM study_sessions
             WHERE owner = ?1 AND started_at > ?2 AND started_at <= ?3
             ORDER BY started_at DESC",
        )?;
        let sessions = stmt
            .query_map(params![owner, to_text(since), to_text(now)], parse_session_row)?
            .collect::<SqlResult<Vec<_>>>()?;
        Ok(sessions)
    }

    // Statistics

    pub fn get_stats(&self, owner: &str) -> DbResult<Option<StudyStats>> {
        let conn = self.conn()?;
        let stats = conn
            .query_row(
                "SELECT total_days, streak_days, last_study_date FROM study_stats WHERE owner = ?1",
                params![owner],
                |row| {
                    let last: Option<String> = row.get(2)?;
                    let last_study_date = last
                        .map(|s| {
                            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                                .map_err(|e| corrupt(2, e))
                        })
                        .transpose()?;
                    Ok(StudyStats {
                        total_days: row.get(0)?,
                        streak_days: row.get(1)?,
                        last_study_date,
                        today_count: 0,
                    })
                },
            )
            .optional()?;
        Ok(stats)
    }

    pub fn upsert_stats(&self, owner: &str, stats: &StudyStats) -> DbResult<()> {
        self.conn()?.execute(
            "INSERT INTO study_stats (owner, total_days, streak_days, last_study_date)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(owner) DO UPDATE SET
                total_days = excluded.total_days, streak_days = excluded.streak_days,
                last_study_date = excluded.last_study_date",
            params![
                owner,
                stats.total_days,
                stats.streak_days,
                stats.last_study_date.map(|d| d.format("%Y-%m-%d").to_string()),
            ],
        )?;
        Ok(())
    }
}

fn update_word_row(conn: &Connection, word: &Word) -> DbResult<()> {
    let changed = conn.execute(
        "UPDATE words SET term = ?3, definition = ?4, meanings = ?5, examples = ?6,
            word_root = ?7, similar_words = ?8, exam_tag = ?9, familiarity = ?10,
            next_review_at = ?11, updated_at = ?12
         WHERE id = ?1 AND owner = ?2",
        params![
            word.id.to_string(),
            word.owner,
            word.term,
            word.definition,
            serde_json::to_string(&word.meanings)?,
            serde_json::to_string(&word.examples)?,
            word.word_root,
            serde_json::to_string(&word.similar_words)?,
            word.exam_tag,
            word.familiarity,
            word.next_review_at.map(to_text),
            to_text(word.updated_at),
        ],
    )?;
    if changed == 0 {
        return Err(DbError::NotFound(format!("word {}", word.id)));
    }
    Ok(())
}

fn insert_review_row(conn: &Connection, review: &ReviewRecord) -> DbResult<()> {
    conn.execute(
        "INSERT INTO review_records (id, owner, word_id, correct, reviewed_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            review.id.to_string(),
            review.owner,
            review.word_id.to_string(),
            review.correct,
            to_text(review.reviewed_at),
        ],
    )?;
    Ok(())
}

fn insert_word_row(conn: &Connection, word: &Word) -> DbResult<()> {
    conn.execute(
        "INSERT INTO words (id, owner, term, definition, meanings, examples, word_root,
            similar_words, exam_tag, familiarity, next_review_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            word.id.to_string(),
            word.owner,
            word.term,
            word.definition,
            serde_json::to_string(&word.meanings)?,
            serde_json::to_string(&word.examples)?,
            word.word_root,
            serde_json::to_string(&word.similar_words)?,
            word.exam_tag,
            word.familiarity,
            word.next_review_at.map(to_text),
            to_text(word.created_at),
            to_text(word.updated_at),
        ],
    )?;
    Ok(())
}

/// Fixed-width UTC text, so string order matches time order in SQL.
fn to_text(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn corrupt<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn column_index(row: &Row, name: &str) -> SqlResult<usize> {
    row.as_ref().column_index(name)
}

fn parse_uuid(row: &Row, idx: usize) -> SqlResult<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| corrupt(idx, e))
}

fn parse_time(row: &Row, name: &str) -> SqlResult<DateTime<Utc>> {
    let idx = column_index(row, name)?;
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(idx, e))
}

fn parse_list(row: &Row, name: &str) -> SqlResult<Vec<String>> {
    let idx = column_index(row, name)?;
    let s: String = row.get(idx)?;
    serde_json::from_str(&s).map_err(|e| corrupt(idx, e))
}

fn parse_word_row(row: &Row) -> SqlResult<Word> {
    let next_review_at = match row.get::<_, Option<String>>("next_review_at")? {
        Some(_) => Some(parse_time(row, "next_review_at")?),
        None => None,
    };
    let familiarity: i64 = row.get("familiarity")?;

    Ok(Word {
        id: parse_uuid(row, column_index(row, "id")?)?,
        owner: row.get("owner")?,
        term: row.get("term")?,
        definition: row.get("definition")?,
        meanings: parse_list(row, "meanings")?,
        examples: parse_list(row, "examples")?,
        word_root: row.get("word_root")?,
        similar_words: parse_list(row, "similar_words")?,
        exam_tag: row.get("exam_tag")?,
        familiarity: familiarity.clamp(0, i64::from(study_core::MAX_FAMILIARITY)) as u8,
        next_review_at,
        created_at: parse_time(row, "created_at")?,
        updated_at: parse_time(row, "updated_at")?,
    })
}

fn parse_session_row(row: &Row) -> SqlResult<StudySession> {
    Ok(StudySession {
        id: parse_uuid(row, column_index(row, "id")?)?,
        owner: row.get("owner")?,
        started_at: parse_time(row, "started_at")?,
        duration_seconds: row.get("duration_seconds")?,
    })
}

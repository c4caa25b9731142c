//! SQLite storage layer for Cyclewise.
//!
//! # Privacy Guarantees
//!
//! Rows are keyed by the opaque `user_id` handed to us by the authentication
//! layer. The schema has no columns for email addresses, names, or IP
//! addresses. Timestamps are stored as Unix milliseconds (UTC).
//!
//! Computed cycle status and symptom analyses are never written here.

use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};

use crate::model::{
    CycleProfile, CycleRegularity, HealthBackground, LoggedSymptom, SymptomCategory,
    SymptomObservation, UserProfile, WellnessPreferences,
};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:cyclewise.db" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Every connection to ":memory:" opens its own private database, so
        // in-memory stores are pinned to a single long-lived connection.
        let in_memory = database_url.contains(":memory:");
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = options.connect(database_url).await?;

        let storage = Self { pool };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    /// Create the database schema if it doesn't exist.
    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                age INTEGER,
                last_period_ts INTEGER,
                cycle_length INTEGER,
                cycle_regularity TEXT NOT NULL,
                period_length INTEGER,
                allergies TEXT NOT NULL,
                preferences TEXT NOT NULL,
                health TEXT NOT NULL,
                created_ts INTEGER NOT NULL,
                updated_ts INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS symptoms (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                ts INTEGER NOT NULL,
                category TEXT NOT NULL,
                symptom_type TEXT NOT NULL,
                severity INTEGER NOT NULL,
                notes TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Index for efficient time-range queries per user
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_symptoms_user_ts
            ON symptoms(user_id, ts)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Create or replace a user's profile.
    ///
    /// The original `created_at` survives updates. Returns the profile as
    /// stored.
    pub async fn upsert_profile(&self, profile: &UserProfile) -> anyhow::Result<UserProfile> {
        let allergies = serde_json::to_string(&profile.allergies)?;
        let preferences = serde_json::to_string(&profile.preferences)?;
        let health = serde_json::to_string(&profile.health)?;

        sqlx::query(
            r#"
            INSERT INTO users (
                user_id, age, last_period_ts, cycle_length, cycle_regularity,
                period_length, allergies, preferences, health, created_ts, updated_ts
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                age = excluded.age,
                last_period_ts = excluded.last_period_ts,
                cycle_length = excluded.cycle_length,
                cycle_regularity = excluded.cycle_regularity,
                period_length = excluded.period_length,
                allergies = excluded.allergies,
                preferences = excluded.preferences,
                health = excluded.health,
                updated_ts = excluded.updated_ts
            "#,
        )
        .bind(&profile.user_id)
        .bind(profile.age.map(i64::from))
        .bind(profile.cycle.last_period_date.map(|d| d.timestamp_millis()))
        .bind(profile.cycle.cycle_length.map(i64::from))
        .bind(profile.cycle.cycle_regularity.as_str())
        .bind(profile.period_length.map(i64::from))
        .bind(allergies)
        .bind(preferences)
        .bind(health)
        .bind(profile.created_at.timestamp_millis())
        .bind(profile.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        self.get_profile(&profile.user_id)
            .await?
            .context("profile missing after upsert")
    }

    /// Fetch a user's profile, or None if the user has never saved one.
    pub async fn get_profile(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, age, last_period_ts, cycle_length, cycle_regularity,
                   period_length, allergies, preferences, health, created_ts, updated_ts
            FROM users
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| profile_from_row(&r)).transpose()
    }

    /// Append a symptom to a user's log.
    pub async fn insert_symptom(
        &self,
        user_id: &str,
        observation: &SymptomObservation,
        notes: &str,
    ) -> anyhow::Result<LoggedSymptom> {
        let result = sqlx::query(
            r#"
            INSERT INTO symptoms (user_id, ts, category, symptom_type, severity, notes)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(observation.date.timestamp_millis())
        .bind(observation.category.as_str())
        .bind(&observation.symptom_type)
        .bind(i64::from(observation.severity))
        .bind(notes)
        .execute(&self.pool)
        .await?;

        Ok(LoggedSymptom {
            id: result.last_insert_rowid(),
            observation: observation.clone(),
            notes: notes.to_string(),
        })
    }

    /// Symptoms logged at or after `since`, newest first.
    ///
    /// # Arguments
    ///
    /// * `user_id` - The user whose log to read
    /// * `since` - Inclusive lower bound on the symptom date
    pub async fn recent_symptoms(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<LoggedSymptom>> {
        let rows = sqlx::query(
            r#"
            SELECT id, ts, category, symptom_type, severity, notes
            FROM symptoms
            WHERE user_id = ? AND ts >= ?
            ORDER BY ts DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(since.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(symptom_from_row).collect()
    }

    /// The `limit` most recent symptoms, newest first.
    pub async fn latest_symptoms(
        &self,
        user_id: &str,
        limit: u32,
    ) -> anyhow::Result<Vec<LoggedSymptom>> {
        let rows = sqlx::query(
            r#"
            SELECT id, ts, category, symptom_type, severity, notes
            FROM symptoms
            WHERE user_id = ?
            ORDER BY ts DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(symptom_from_row).collect()
    }
}

fn timestamp_from_millis(ms: i64) -> anyhow::Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .with_context(|| format!("stored timestamp {ms} is out of range"))
}

fn profile_from_row(row: &SqliteRow) -> anyhow::Result<UserProfile> {
    let last_period_ts: Option<i64> = row.try_get("last_period_ts")?;
    let regularity: String = row.try_get("cycle_regularity")?;
    let age: Option<i64> = row.try_get("age")?;
    let cycle_length: Option<i64> = row.try_get("cycle_length")?;
    let period_length: Option<i64> = row.try_get("period_length")?;
    let allergies: String = row.try_get("allergies")?;
    let preferences: String = row.try_get("preferences")?;
    let health: String = row.try_get("health")?;

    Ok(UserProfile {
        user_id: row.try_get("user_id")?,
        age: age.and_then(|a| u32::try_from(a).ok()),
        cycle: CycleProfile {
            last_period_date: last_period_ts.map(timestamp_from_millis).transpose()?,
            cycle_length: cycle_length.and_then(|l| i32::try_from(l).ok()),
            cycle_regularity: regularity.parse::<CycleRegularity>()?,
        },
        period_length: period_length.and_then(|l| i32::try_from(l).ok()),
        allergies: serde_json::from_str::<Vec<String>>(&allergies)?,
        preferences: serde_json::from_str::<WellnessPreferences>(&preferences)?,
        health: serde_json::from_str::<HealthBackground>(&health)?,
        created_at: timestamp_from_millis(row.try_get("created_ts")?)?,
        updated_at: timestamp_from_millis(row.try_get("updated_ts")?)?,
    })
}

fn symptom_from_row(row: &SqliteRow) -> anyhow::Result<LoggedSymptom> {
    let category: String = row.try_get("category")?;
    let severity: i64 = row.try_get("severity")?;

    Ok(LoggedSymptom {
        id: row.try_get("id")?,
        observation: SymptomObservation {
            symptom_type: row.try_get("symptom_type")?,
            // Rows outside the closed category set fail here rather than
            // reaching the aggregator
            category: category.parse::<SymptomCategory>()?,
            severity: u8::try_from(severity)
                .with_context(|| format!("stored severity {severity} is out of range"))?,
            date: timestamp_from_millis(row.try_get("ts")?)?,
        },
        notes: row.try_get("notes")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelError, ProfileRequest};
    use chrono::TimeDelta;

    fn observation(symptom_type: &str, date: DateTime<Utc>) -> SymptomObservation {
        SymptomObservation {
            symptom_type: symptom_type.to_string(),
            category: SymptomCategory::Physical,
            severity: 2,
            date,
        }
    }

    // Millisecond precision is what the store keeps
    fn now_ms() -> DateTime<Utc> {
        timestamp_from_millis(Utc::now().timestamp_millis()).unwrap()
    }

    #[tokio::test]
    async fn test_profile_round_trip() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let now = now_ms();

        assert!(storage.get_profile("user-a").await.unwrap().is_none());

        let mut request = ProfileRequest::default();
        request.cycle.last_period_date = Some(now - TimeDelta::days(3));
        request.cycle.cycle_length = Some(30);
        request.cycle.cycle_regularity = CycleRegularity::Irregular;
        request.allergies = vec!["peanuts".to_string()];
        request.preferences.exercise = vec!["yoga".to_string()];

        let profile = UserProfile::from_request("user-a", request, now);
        let stored = storage.upsert_profile(&profile).await.unwrap();

        assert_eq!(stored, profile);
    }

    #[tokio::test]
    async fn test_upsert_keeps_created_at() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let first = now_ms();
        let later = first + TimeDelta::hours(5);

        let profile = UserProfile::from_request("user-a", ProfileRequest::default(), first);
        storage.upsert_profile(&profile).await.unwrap();

        let mut request = ProfileRequest::default();
        request.cycle.cycle_length = Some(26);
        let updated = UserProfile::from_request("user-a", request, later);
        let stored = storage.upsert_profile(&updated).await.unwrap();

        assert_eq!(stored.created_at, first);
        assert_eq!(stored.updated_at, later);
        assert_eq!(stored.cycle.cycle_length, Some(26));
    }

    #[tokio::test]
    async fn test_recent_symptoms_newest_first() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let now = now_ms();

        for (label, days_ago) in [("Old", 9), ("Mid", 3), ("New", 1)] {
            storage
                .insert_symptom("user-a", &observation(label, now - TimeDelta::days(days_ago)), "")
                .await
                .unwrap();
        }
        storage
            .insert_symptom("user-b", &observation("Other user", now), "")
            .await
            .unwrap();

        let recent = storage
            .recent_symptoms("user-a", now - TimeDelta::days(7))
            .await
            .unwrap();

        let labels: Vec<&str> = recent
            .iter()
            .map(|s| s.observation.symptom_type.as_str())
            .collect();
        assert_eq!(labels, vec!["New", "Mid"]);
    }

    #[tokio::test]
    async fn test_latest_symptoms_limit() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let now = now_ms();

        for i in 0..10 {
            storage
                .insert_symptom("user-a", &observation("Cramps", now - TimeDelta::days(i)), "note")
                .await
                .unwrap();
        }

        let latest = storage.latest_symptoms("user-a", 7).await.unwrap();

        assert_eq!(latest.len(), 7);
        assert_eq!(latest[0].observation.date, now);
        assert_eq!(latest[0].notes, "note");
    }

    #[tokio::test]
    async fn test_unknown_stored_category_fails() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let now = now_ms();

        sqlx::query(
            "INSERT INTO symptoms (user_id, ts, category, symptom_type, severity, notes) \
             VALUES ('user-a', ?, 'spiritual', 'Malaise', 2, '')",
        )
        .bind(now.timestamp_millis())
        .execute(&storage.pool)
        .await
        .unwrap();

        let err = storage
            .recent_symptoms("user-a", now - TimeDelta::days(1))
            .await
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<ModelError>(),
            Some(&ModelError::InvalidCategory("spiritual".to_string()))
        );
    }
}

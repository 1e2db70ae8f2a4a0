use std::{
    fmt::Debug,
    path::Path,
    sync::{Mutex, MutexGuard},
};

use l2scope_common::types::{ComplexityProfile, SequencerPerformanceTest};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::api::StoreEngine;
use crate::error::StoreError;

/// Records are stored as JSON bodies; the extra columns only serve ordering and lookups.
const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS profiles (
        id TEXT PRIMARY KEY,
        network TEXT NOT NULL,
        contract_name TEXT NOT NULL,
        function_name TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        body TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS sequencer_tests (
        id TEXT PRIMARY KEY,
        network TEXT NOT NULL,
        status TEXT NOT NULL,
        started_at INTEGER NOT NULL,
        body TEXT NOT NULL
    );
";

pub struct SQLStore {
    connection: Mutex<Connection>,
}

impl SQLStore {
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let connection = Connection::open(path)?;
        connection.execute_batch(SCHEMA)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::Custom("Failed to lock the sqlite connection".to_string()))
    }

    fn query_one<T: DeserializeOwned>(
        &self,
        sql: &str,
        id: Uuid,
    ) -> Result<Option<T>, StoreError> {
        let body: Option<String> = self
            .connection()?
            .query_row(sql, params![id.to_string()], |row| row.get(0))
            .optional()?;
        body.map(|body| serde_json::from_str(&body))
            .transpose()
            .map_err(StoreError::from)
    }

    fn query_all<T: DeserializeOwned>(&self, sql: &str) -> Result<Vec<T>, StoreError> {
        let connection = self.connection()?;
        let mut statement = connection.prepare(sql)?;
        let rows = statement.query_map([], |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(serde_json::from_str(&row?)?);
        }
        Ok(records)
    }
}

#[async_trait::async_trait]
impl StoreEngine for SQLStore {
    async fn insert_profile(&self, profile: ComplexityProfile) -> Result<(), StoreError> {
        let body = serde_json::to_string(&profile)?;
        let inserted = self.connection()?.execute(
            "INSERT INTO profiles (id, network, contract_name, function_name, created_at, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                profile.id.to_string(),
                profile.network.to_string(),
                profile.contract_name,
                profile.function_name,
                profile.created_at as i64,
                body,
            ],
        );
        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::AlreadyExists(profile.id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn get_profile(&self, id: Uuid) -> Result<Option<ComplexityProfile>, StoreError> {
        self.query_one("SELECT body FROM profiles WHERE id = ?1", id)
    }

    async fn list_profiles(&self) -> Result<Vec<ComplexityProfile>, StoreError> {
        self.query_all("SELECT body FROM profiles ORDER BY created_at ASC, rowid ASC")
    }

    async fn put_sequencer_test(&self, test: SequencerPerformanceTest) -> Result<(), StoreError> {
        let body = serde_json::to_string(&test)?;
        // Upsert keeps the rowid, so listing order follows the first insert.
        self.connection()?.execute(
            "INSERT INTO sequencer_tests (id, network, status, started_at, body)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET status = excluded.status, body = excluded.body",
            params![
                test.id.to_string(),
                test.network.to_string(),
                test.status.to_string(),
                test.started_at as i64,
                body,
            ],
        )?;
        Ok(())
    }

    async fn get_sequencer_test(
        &self,
        id: Uuid,
    ) -> Result<Option<SequencerPerformanceTest>, StoreError> {
        self.query_one("SELECT body FROM sequencer_tests WHERE id = ?1", id)
    }

    async fn list_sequencer_tests(&self) -> Result<Vec<SequencerPerformanceTest>, StoreError> {
        self.query_all("SELECT body FROM sequencer_tests ORDER BY started_at ASC, rowid ASC")
    }
}

impl Debug for SQLStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SQLStore").finish()
    }
}

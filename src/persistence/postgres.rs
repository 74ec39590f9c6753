//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::RaceStore;
use crate::config::RelayConfig;
use crate::domain::{Baton, BatonId, Beacon, BeaconId, Detection, Lap, LapSourceId, Team, TeamId};
use crate::error::RelayError;

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool from the configuration and applies the
    /// bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`RelayError::PersistenceError`] if the database is
    /// unreachable or a migration fails.
    pub async fn connect(config: &RelayConfig) -> Result<Self, RelayError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| RelayError::PersistenceError(e.to_string()))?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl RaceStore for PostgresStore {
    async fn insert_detection(&self, detection: &Detection) -> Result<(), RelayError> {
        sqlx::query("INSERT INTO detection (baton_id, beacon_id, detected_at) VALUES ($1, $2, $3)")
            .bind(detection.baton_id.get())
            .bind(detection.beacon_id.get())
            .bind(detection.timestamp)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_lap(&self, lap: &Lap) -> Result<(), RelayError> {
        sqlx::query("INSERT INTO lap (baton_id, lap_source_id, completed_at) VALUES ($1, $2, $3)")
            .bind(lap.baton_id.get())
            .bind(lap.lap_source_id.get())
            .bind(lap.timestamp)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn lap_source_id(&self, name: &str) -> Result<LapSourceId, RelayError> {
        let id = sqlx::query_scalar::<_, i32>(
            "INSERT INTO lap_source (name) VALUES ($1) \
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING id",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(LapSourceId::new(id))
    }

    async fn batons(&self) -> Result<Vec<Baton>, RelayError> {
        let rows = sqlx::query_as::<_, (i32, String, String)>(
            "SELECT id, name, mac FROM baton ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, address)| Baton {
                id: BatonId::new(id),
                name,
                address,
            })
            .collect())
    }

    async fn beacons(&self) -> Result<Vec<Beacon>, RelayError> {
        let rows = sqlx::query_as::<_, (i32, String, String, i64)>(
            "SELECT id, name, mac, position FROM beacon ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, address, position)| Beacon {
                id: BeaconId::new(id),
                name,
                address,
                position,
            })
            .collect())
    }

    async fn teams(&self) -> Result<Vec<Team>, RelayError> {
        let rows = sqlx::query_as::<_, (i32, String, Option<i32>)>(
            "SELECT id, name, baton_id FROM team ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, baton_id)| Team {
                id: TeamId::new(id),
                name,
                baton_id: baton_id.map(BatonId::new),
            })
            .collect())
    }
}

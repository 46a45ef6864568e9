use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, info, instrument};

use super::is_valid_identifier;
use super::store::{PredictionLog, PriceStore};
use crate::config::DatabaseConfig;
use crate::domain::{PredictionRecord, PricePoint, Timestamp};
use crate::error::{A3cError, Result};

/// PostgreSQL price series and prediction log
#[derive(Clone)]
pub struct PgMarketStore {
    pool: PgPool,
    price_table: String,
    prediction_table: String,
}

impl PgMarketStore {
    /// Connect using the database section of the app config
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await?;

        info!("Connected to PostgreSQL");
        Self::from_pool(pool, &config.price_table, &config.prediction_table)
    }

    /// Reuse an existing pool
    pub fn from_pool(pool: PgPool, price_table: &str, prediction_table: &str) -> Result<Self> {
        for table in [price_table, prediction_table] {
            if !is_valid_identifier(table) {
                return Err(A3cError::Config(config::ConfigError::Message(format!(
                    "invalid table identifier {table:?}"
                ))));
            }
        }

        Ok(Self {
            pool,
            price_table: price_table.to_string(),
            prediction_table: prediction_table.to_string(),
        })
    }

    /// Create the two tables if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                ts_millis  BIGINT           NOT NULL,
                instrument TEXT             NOT NULL,
                value      DOUBLE PRECISION NOT NULL
            )
            "#,
            self.price_table
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                model_id             TEXT   NOT NULL,
                ts_millis            BIGINT NOT NULL,
                action_probabilities REAL[] NOT NULL,
                value_prediction     REAL   NOT NULL,
                PRIMARY KEY (model_id, ts_millis)
            )
            "#,
            self.prediction_table
        ))
        .execute(&self.pool)
        .await?;

        info!(
            "Schema ready: {} / {}",
            self.price_table, self.prediction_table
        );
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PriceStore for PgMarketStore {
    #[instrument(skip(self))]
    async fn price_points(
        &self,
        instrument: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<PricePoint>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT ts_millis, instrument, value
            FROM {}
            WHERE instrument = $1 AND ts_millis >= $2 AND ts_millis <= $3
            "#,
            self.price_table
        ))
        .bind(instrument)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let points: Vec<PricePoint> = rows
            .iter()
            .map(|r| PricePoint {
                timestamp: r.get("ts_millis"),
                instrument: r.get("instrument"),
                value: r.get("value"),
            })
            .collect();

        debug!("Fetched {} price points for {}", points.len(), instrument);
        Ok(points)
    }
}

#[async_trait]
impl PredictionLog for PgMarketStore {
    async fn record(&self, prediction: &PredictionRecord) -> Result<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (model_id, ts_millis, action_probabilities, value_prediction)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (model_id, ts_millis) DO UPDATE SET
                action_probabilities = EXCLUDED.action_probabilities,
                value_prediction = EXCLUDED.value_prediction
            "#,
            self.prediction_table
        ))
        .bind(&prediction.model_id)
        .bind(prediction.timestamp)
        .bind(&prediction.action_probabilities)
        .bind(prediction.value_prediction)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn predictions(
        &self,
        model_id: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<PredictionRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT model_id, ts_millis, action_probabilities, value_prediction
            FROM {}
            WHERE model_id = $1 AND ts_millis >= $2 AND ts_millis <= $3
            ORDER BY ts_millis
            "#,
            self.prediction_table
        ))
        .bind(model_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| PredictionRecord {
                model_id: r.get("model_id"),
                timestamp: r.get("ts_millis"),
                action_probabilities: r.get("action_probabilities"),
                value_prediction: r.get("value_prediction"),
            })
            .collect())
    }
}

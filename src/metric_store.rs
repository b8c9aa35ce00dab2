use crate::metric_record::{MetricRecord, StoredMetric};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

/// Persistence collaborator for metric records.
///
/// `create_metric` is atomic: either the row is written with its references
/// resolved, or nothing is written and the error describes why.
#[async_trait]
pub trait MetricStore: Send + Sync {
    async fn create_metric(&self, record: MetricRecord) -> Result<StoredMetric>;
}

#[derive(Clone)]
pub struct PgMetricStore {
    pool: PgPool,
}

impl PgMetricStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("failed to connect to metrics database")?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

type MetricRow = (
    String,
    DateTime<Utc>,
    String,
    i64,
    String,
    Option<String>,
);

/// A row a new metric points at and which must already exist.
#[derive(Debug, Clone, Copy)]
enum Reference {
    Trace,
    Observation,
}

impl Reference {
    fn exists_sql(self) -> &'static str {
        match self {
            Reference::Trace => "SELECT EXISTS (SELECT 1 FROM traces WHERE id = $1)",
            Reference::Observation => "SELECT EXISTS (SELECT 1 FROM observations WHERE id = $1)",
        }
    }

    fn entity(self) -> &'static str {
        match self {
            Reference::Trace => "trace",
            Reference::Observation => "observation",
        }
    }
}

const INSERT_METRIC_SQL: &str =
    "INSERT INTO metrics (id, timestamp, name, value, trace_id, observation_id) \
     VALUES ($1, $2, $3, $4, $5, $6) \
     RETURNING id, timestamp, name, value, trace_id, observation_id";

#[async_trait]
impl MetricStore for PgMetricStore {
    async fn create_metric(&self, record: MetricRecord) -> Result<StoredMetric> {
        let mut tx = self.pool.begin().await?;

        ensure_exists(&mut tx, Reference::Trace, record.trace_id()).await?;
        if let Some(observation_id) = record.observation_id() {
            ensure_exists(&mut tx, Reference::Observation, observation_id).await?;
        }

        let (id, timestamp, name, value, trace_id, observation_id): MetricRow =
            sqlx::query_as(INSERT_METRIC_SQL)
                .bind(Uuid::new_v4().to_string())
                .bind(record.timestamp)
                .bind(&record.name)
                .bind(record.value)
                .bind(record.trace_id())
                .bind(record.observation_id())
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(StoredMetric {
            id,
            timestamp,
            name,
            value,
            trace_id,
            observation_id,
        })
    }
}

// Dropping `tx` on the error path rolls the transaction back.
async fn ensure_exists(
    tx: &mut Transaction<'_, Postgres>,
    reference: Reference,
    id: &str,
) -> Result<()> {
    let (exists,): (bool,) = sqlx::query_as(reference.exists_sql())
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;

    if !exists {
        bail!("No {} record found for id '{id}'", reference.entity());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric_submission::MetricSubmission;
    use sqlx::postgres::PgConnectOptions;
    use std::env;

    // Not DATABASE_URL: the config tests set and clear that variable.
    const TEST_DATABASE_URL_ENV: &str = "TEST_DATABASE_URL";

    const CREATE_TABLES: [&str; 3] = [
        "CREATE TABLE traces (id TEXT PRIMARY KEY)",
        "CREATE TABLE observations (id TEXT PRIMARY KEY)",
        "CREATE TABLE metrics (\
            id TEXT PRIMARY KEY, \
            timestamp TIMESTAMPTZ NOT NULL, \
            name TEXT NOT NULL, \
            value BIGINT NOT NULL, \
            trace_id TEXT NOT NULL REFERENCES traces (id), \
            observation_id TEXT REFERENCES observations (id))",
    ];

    /// A throwaway schema holding one trace (`trace-1`) and one observation (`obs-1`).
    struct TestDatabase {
        admin: PgPool,
        pool: PgPool,
        schema: String,
    }

    impl TestDatabase {
        async fn create() -> Self {
            let url = env::var(TEST_DATABASE_URL_ENV)
                .unwrap_or_else(|_| panic!("{TEST_DATABASE_URL_ENV} must point at Postgres"));
            let admin = PgPool::connect(&url).await.expect("connect to test database");

            let schema = format!("metric_ingest_test_{}", Uuid::new_v4().simple());
            sqlx::query(&format!("CREATE SCHEMA {schema}"))
                .execute(&admin)
                .await
                .expect("create test schema");

            let options = url
                .parse::<PgConnectOptions>()
                .expect("test database url")
                .options([("search_path", schema.as_str())]);
            let pool = PgPoolOptions::new()
                .max_connections(2)
                .connect_with(options)
                .await
                .expect("connect to test schema");

            for statement in CREATE_TABLES {
                sqlx::query(statement)
                    .execute(&pool)
                    .await
                    .expect("create table");
            }
            sqlx::query("INSERT INTO traces (id) VALUES ('trace-1')")
                .execute(&pool)
                .await
                .expect("seed trace");
            sqlx::query("INSERT INTO observations (id) VALUES ('obs-1')")
                .execute(&pool)
                .await
                .expect("seed observation");

            Self {
                admin,
                pool,
                schema,
            }
        }

        fn store(&self) -> PgMetricStore {
            PgMetricStore::from_pool(self.pool.clone())
        }

        async fn metric_count(&self) -> i64 {
            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM metrics")
                .fetch_one(&self.pool)
                .await
                .expect("count metrics");
            count
        }

        async fn teardown(self) {
            self.pool.close().await;
            sqlx::query(&format!("DROP SCHEMA {} CASCADE", self.schema))
                .execute(&self.admin)
                .await
                .expect("drop test schema");
        }
    }

    fn record(trace_id: &str, observation_id: Option<&str>) -> MetricRecord {
        MetricRecord::from_submission(MetricSubmission {
            name: "latency_ms".to_string(),
            value: 120,
            trace_id: trace_id.to_string(),
            observation_id: observation_id.map(str::to_owned),
        })
    }

    #[test]
    fn reference_lookups_use_fixed_tables() {
        assert_eq!(
            Reference::Trace.exists_sql(),
            "SELECT EXISTS (SELECT 1 FROM traces WHERE id = $1)"
        );
        assert_eq!(
            Reference::Observation.exists_sql(),
            "SELECT EXISTS (SELECT 1 FROM observations WHERE id = $1)"
        );
        assert_eq!(Reference::Observation.entity(), "observation");
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL pointing at Postgres"]
    async fn creates_metric_with_generated_id() {
        let db = TestDatabase::create().await;

        let stored = db
            .store()
            .create_metric(record("trace-1", None))
            .await
            .expect("metric should be created");

        assert!(Uuid::parse_str(&stored.id).is_ok(), "id is not a uuid: {}", stored.id);
        assert_eq!(stored.name, "latency_ms");
        assert_eq!(stored.value, 120);
        assert_eq!(stored.trace_id, "trace-1");
        assert_eq!(stored.observation_id, None);
        assert_eq!(db.metric_count().await, 1);

        db.teardown().await;
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL pointing at Postgres"]
    async fn links_existing_observation() {
        let db = TestDatabase::create().await;

        let stored = db
            .store()
            .create_metric(record("trace-1", Some("obs-1")))
            .await
            .expect("metric should be created");

        assert_eq!(stored.observation_id.as_deref(), Some("obs-1"));

        db.teardown().await;
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL pointing at Postgres"]
    async fn missing_trace_writes_nothing() {
        let db = TestDatabase::create().await;

        let error = db
            .store()
            .create_metric(record("missing-trace", None))
            .await
            .expect_err("unknown trace should fail");

        assert_eq!(error.to_string(), "No trace record found for id 'missing-trace'");
        assert_eq!(db.metric_count().await, 0);

        db.teardown().await;
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL pointing at Postgres"]
    async fn missing_observation_rolls_back() {
        let db = TestDatabase::create().await;

        let error = db
            .store()
            .create_metric(record("trace-1", Some("obs-404")))
            .await
            .expect_err("unknown observation should fail");

        assert_eq!(
            error.to_string(),
            "No observation record found for id 'obs-404'"
        );
        assert_eq!(db.metric_count().await, 0);

        db.teardown().await;
    }
}

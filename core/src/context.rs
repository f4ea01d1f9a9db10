//! The local engine session.

use crate::dataframe::LocalDataFrame;
use crate::dataset::Record;
use crate::traits::{EngineSession, SessionProvider};
use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::execution::context::SessionContext;
use datafusion::execution::runtime_env::RuntimeEnvBuilder;
use datafusion::prelude::SessionConfig;
use engine_verify_common::{EngineConfig, ErrorContext, MemorySize, VerifyError, VerifyResult};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Builder for [`LocalSession`], configured the way a Spark session builder is.
///
/// Invalid settings do not fail immediately; the first one is reported by
/// [`SessionBuilder::get_or_create`].
#[derive(Debug, Default)]
pub struct SessionBuilder {
    config: EngineConfig,
    error: Option<VerifyError>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already resolved configuration.
    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            config,
            error: None,
        }
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.config.app_name = name.into();
        self
    }

    /// Set the master, e.g. `local[*]`.
    pub fn master(mut self, master: &str) -> Self {
        match master.parse() {
            Ok(mode) => self.config.master = mode,
            Err(err) => self.record(err),
        }
        self
    }

    /// Set a single option. Known keys are `driver.memory`, `executor.memory`
    /// and `batch.size`.
    pub fn config(mut self, key: &str, value: &str) -> Self {
        let applied = match key {
            "driver.memory" => value
                .parse::<MemorySize>()
                .map(|size| self.config.driver_memory = size),
            "executor.memory" => value
                .parse::<MemorySize>()
                .map(|size| self.config.executor_memory = size),
            "batch.size" => value
                .parse::<usize>()
                .with_config_context(|| format!("Invalid batch size '{}'", value))
                .map(|size| self.config.batch_size = size),
            other => Err(VerifyError::configuration_error(format!(
                "Unknown session option '{}'",
                other
            ))),
        };
        if let Err(err) = applied {
            self.record(err);
        }
        self
    }

    fn record(&mut self, err: VerifyError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    /// Start a new session with the accumulated configuration.
    pub fn get_or_create(self) -> VerifyResult<LocalSession> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let config = self.config;
        config.validate()?;

        let memory_limit = usize::try_from(config.driver_memory.bytes()).with_config_context(
            || format!("Driver memory {} exceeds addressable memory", config.driver_memory),
        )?;
        let runtime = RuntimeEnvBuilder::new()
            .with_memory_limit(memory_limit, 1.0)
            .build_arc()
            .with_startup_context(|| "Failed to build DataFusion runtime".to_string())?;

        let session_config = SessionConfig::new()
            .with_target_partitions(config.master.parallelism())
            .with_batch_size(config.batch_size);
        let ctx = SessionContext::new_with_config_rt(session_config, runtime);

        let rendered = serde_json::to_string(&config)
            .with_config_context(|| "Failed to render session configuration".to_string())?;
        info!(
            "Started session '{}' ({}) with configuration {}",
            config.app_name,
            ctx.session_id(),
            rendered
        );
        debug!(
            "Executor memory hint {} is not applied in local mode",
            config.executor_memory
        );

        Ok(LocalSession {
            config,
            ctx: Mutex::new(Some(ctx)),
        })
    }
}

/// `LocalSession` is the handle to a running engine instance.
///
/// It wraps DataFusion's `SessionContext`. Stopping the session drops the
/// context; any later operation fails with a stopped-session error.
pub struct LocalSession {
    config: EngineConfig,
    ctx: Mutex<Option<SessionContext>>,
}

impl fmt::Debug for LocalSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSession")
            .field("config", &self.config)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl LocalSession {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub fn app_name(&self) -> &str {
        &self.config.app_name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Version of the DataFusion engine this binary was built against.
    pub fn version(&self) -> &'static str {
        datafusion::DATAFUSION_VERSION
    }

    pub fn session_id(&self) -> VerifyResult<String> {
        Ok(self.context()?.session_id())
    }

    pub fn is_stopped(&self) -> bool {
        self.ctx.lock().map(|ctx| ctx.is_none()).unwrap_or(true)
    }

    /// Returns a clone of the underlying DataFusion `SessionContext`.
    pub fn context(&self) -> VerifyResult<SessionContext> {
        let guard = self
            .ctx
            .lock()
            .map_err(|_| VerifyError::execution_error("Session state lock poisoned"))?;
        guard
            .clone()
            .ok_or_else(|| VerifyError::session_stopped(&self.config.app_name))
    }

    /// Build an in-memory table from literal records.
    ///
    /// `columns` names the id and name fields, in that order.
    pub fn create_dataframe(
        &self,
        records: &[Record],
        columns: &[&str],
    ) -> VerifyResult<LocalDataFrame> {
        let [id_column, name_column] = columns else {
            return Err(VerifyError::schema_error(format!(
                "Records have 2 fields but {} column names were given",
                columns.len()
            )));
        };

        let schema = Arc::new(Schema::new(vec![
            Field::new(*id_column, DataType::Int64, false),
            Field::new(*name_column, DataType::Utf8, false),
        ]));
        let ids: Int64Array = records.iter().map(|r| Some(r.id)).collect();
        let names: StringArray = records.iter().map(|r| Some(r.name.as_str())).collect();
        let batch = RecordBatch::try_new(
            schema,
            vec![Arc::new(ids) as ArrayRef, Arc::new(names) as ArrayRef],
        )?;

        let df = self.context()?.read_batch(batch)?;
        Ok(LocalDataFrame::new(df))
    }

    /// Stop the session. Stopping twice is a no-op.
    ///
    /// Memory still reserved in the pool at shutdown is reported as a
    /// teardown error after the session has been released.
    pub fn stop(&self) -> VerifyResult<()> {
        let ctx = self
            .ctx
            .lock()
            .map_err(|_| VerifyError::teardown_error("Session state lock poisoned"))?
            .take();

        let Some(ctx) = ctx else {
            debug!("Session '{}' already stopped", self.config.app_name);
            return Ok(());
        };

        let reserved = ctx.runtime_env().memory_pool.reserved();
        drop(ctx);
        info!("Stopped session '{}'", self.config.app_name);

        if reserved > 0 {
            return Err(VerifyError::teardown_error(format!(
                "{} bytes were still reserved in the memory pool",
                reserved
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl EngineSession for LocalSession {
    type Table = LocalDataFrame;

    fn version(&self) -> String {
        LocalSession::version(self).to_string()
    }

    async fn create_table(
        &self,
        records: &[Record],
        columns: &[&str],
    ) -> VerifyResult<LocalDataFrame> {
        self.create_dataframe(records, columns)
    }

    async fn stop(&self) -> VerifyResult<()> {
        LocalSession::stop(self)
    }
}

/// Starts DataFusion-backed [`LocalSession`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DataFusionProvider;

#[async_trait]
impl SessionProvider for DataFusionProvider {
    type Session = LocalSession;

    async fn acquire(&self, config: &EngineConfig) -> VerifyResult<LocalSession> {
        SessionBuilder::from_config(config.clone()).get_or_create()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{COLUMNS, sample_records};
    use datafusion::execution::memory_pool::MemoryConsumer;
    use engine_verify_common::ExecutionMode;

    #[test]
    fn test_builder_applies_settings() {
        let session = LocalSession::builder()
            .app_name("builder-test")
            .master("local[2]")
            .config("driver.memory", "512m")
            .config("executor.memory", "1g")
            .config("batch.size", "1024")
            .get_or_create()
            .unwrap();

        assert_eq!(session.app_name(), "builder-test");
        assert_eq!(session.config().master, ExecutionMode::LocalThreads(2));
        assert_eq!(session.config().driver_memory.to_string(), "512m");
        assert_eq!(session.config().batch_size, 1024);

        let ctx = session.context().unwrap();
        assert_eq!(ctx.state().config().target_partitions(), 2);
        assert_eq!(ctx.state().config().batch_size(), 1024);
    }

    #[test]
    fn test_builder_reports_first_error() {
        let result = LocalSession::builder()
            .master("spark://cluster:7077")
            .config("driver.memory", "lots")
            .get_or_create();

        match result {
            Err(VerifyError::ConfigurationError { message, .. }) => {
                assert!(message.contains("spark://cluster:7077"));
            }
            other => panic!("Expected ConfigurationError, got {:?}", other),
        }
    }

    #[test]
    fn test_builder_rejects_unknown_option() {
        let result = LocalSession::builder()
            .config("spark.sql.shuffle.partitions", "8")
            .get_or_create();
        assert!(matches!(result, Err(VerifyError::ConfigurationError { .. })));
    }

    #[test]
    fn test_version_is_reported() {
        let session = SessionBuilder::new().get_or_create().unwrap();
        assert!(!session.version().is_empty());
        assert_eq!(session.version(), datafusion::DATAFUSION_VERSION);
    }

    #[test]
    fn test_create_dataframe_checks_column_count() {
        let session = SessionBuilder::new().get_or_create().unwrap();
        let result = session.create_dataframe(&sample_records(), &["ID"]);
        assert!(matches!(result, Err(VerifyError::SchemaError { .. })));
    }

    #[tokio::test]
    async fn test_create_dataframe_and_count() {
        let session = SessionBuilder::new().get_or_create().unwrap();
        let df = session.create_dataframe(&sample_records(), &COLUMNS).unwrap();

        assert_eq!(df.columns(), vec!["ID".to_string(), "Name".to_string()]);
        assert_eq!(df.count().await.unwrap(), 3);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let session = SessionBuilder::new().get_or_create().unwrap();
        assert!(!session.is_stopped());

        session.stop().unwrap();
        assert!(session.is_stopped());
        session.stop().unwrap();

        let result = session.create_dataframe(&sample_records(), &COLUMNS);
        assert!(matches!(
            result,
            Err(VerifyError::SessionStoppedError { .. })
        ));
        assert!(session.session_id().is_err());
    }

    #[test]
    fn test_stop_reports_memory_still_reserved() {
        let session = SessionBuilder::new().get_or_create().unwrap();
        let pool = session.context().unwrap().runtime_env().memory_pool.clone();
        let mut reservation = MemoryConsumer::new("pending-scan").register(&pool);
        reservation.grow(1024);

        let result = session.stop();
        assert!(matches!(result, Err(VerifyError::TeardownError { .. })));
        assert!(result.unwrap_err().to_string().contains("1024 bytes"));
        assert!(session.is_stopped());
        assert!(session.stop().is_ok());

        drop(reservation);
        assert_eq!(pool.reserved(), 0);
    }
}

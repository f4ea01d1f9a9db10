//! Core traits for engine-verify
//!
//! These traits are the seam between the verifier and the processing engine.
//! Production code plugs in the DataFusion-backed session; tests plug in
//! scripted engines that misbehave on purpose.

use crate::dataset::Record;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use engine_verify_common::{EngineConfig, VerifyResult};

/// Something that can start an engine session from a configuration.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Session: EngineSession;

    /// Start a session. Every error here is reported as an engine error.
    async fn acquire(&self, config: &EngineConfig) -> VerifyResult<Self::Session>;
}

/// A running engine instance owned by a single verifier run.
#[async_trait]
pub trait EngineSession: Send + Sync {
    type Table: EngineTable;

    /// Version string of the underlying engine
    fn version(&self) -> String;

    /// Build a table from literal records, naming columns in record field order.
    async fn create_table(
        &self,
        records: &[Record],
        columns: &[&str],
    ) -> VerifyResult<Self::Table>;

    /// Release the session. Calling this more than once must be harmless.
    async fn stop(&self) -> VerifyResult<()>;
}

/// A table living inside an engine session.
#[async_trait]
pub trait EngineTable: Send + Sync {
    /// Number of rows in the table
    async fn count(&self) -> VerifyResult<usize>;

    /// Human readable rendering of the full table
    async fn render(&self) -> VerifyResult<String>;

    /// Project the given columns and materialize the result locally
    async fn select_collect(&self, columns: &[&str]) -> VerifyResult<Vec<RecordBatch>>;
}

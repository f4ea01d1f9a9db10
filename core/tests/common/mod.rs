//! Common test utilities: a scripted engine whose failures are chosen per test

use anyhow::anyhow;
use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use engine_verify_common::{EngineConfig, VerifyError, VerifyResult};
use engine_verify_core::{EngineSession, EngineTable, Record, SessionProvider};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Describes how the scripted engine should behave.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    pub fail_acquire: bool,
    pub fail_count: bool,
    /// Panic inside `count` instead of returning an error
    pub fail_count_panics: bool,
    pub fail_stop: bool,
    /// Row count reported regardless of the actual rows
    pub forced_count: Option<usize>,
    /// Rows returned by projection instead of the loaded records
    pub forced_rows: Option<Vec<(String, i64)>>,
    pub acquire_calls: Arc<AtomicUsize>,
    pub stop_calls: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire_calls(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for ScriptedEngine {
    type Session = ScriptedSession;

    async fn acquire(&self, _config: &EngineConfig) -> VerifyResult<ScriptedSession> {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_acquire {
            return Err(VerifyError::startup_error_with_source(
                "engine refused to start",
                anyhow!("port 4040 already in use"),
            ));
        }
        Ok(ScriptedSession {
            script: self.clone(),
        })
    }
}

pub struct ScriptedSession {
    script: ScriptedEngine,
}

#[async_trait]
impl EngineSession for ScriptedSession {
    type Table = ScriptedTable;

    fn version(&self) -> String {
        "0.0.0-scripted".to_string()
    }

    async fn create_table(
        &self,
        records: &[Record],
        _columns: &[&str],
    ) -> VerifyResult<ScriptedTable> {
        let rows = match &self.script.forced_rows {
            Some(rows) => rows.clone(),
            None => records.iter().map(|r| (r.name.clone(), r.id)).collect(),
        };
        Ok(ScriptedTable {
            rows,
            script: self.script.clone(),
        })
    }

    async fn stop(&self) -> VerifyResult<()> {
        self.script.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.script.fail_stop {
            return Err(VerifyError::teardown_error("executor did not shut down"));
        }
        Ok(())
    }
}

pub struct ScriptedTable {
    rows: Vec<(String, i64)>,
    script: ScriptedEngine,
}

#[async_trait]
impl EngineTable for ScriptedTable {
    async fn count(&self) -> VerifyResult<usize> {
        if self.script.fail_count_panics {
            panic!("executor thread crashed while counting");
        }
        if self.script.fail_count {
            return Err(VerifyError::execution_error("task lost while counting"));
        }
        Ok(self.script.forced_count.unwrap_or(self.rows.len()))
    }

    async fn render(&self) -> VerifyResult<String> {
        Ok(self
            .rows
            .iter()
            .map(|(name, id)| format!("{} {}", id, name))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn select_collect(&self, columns: &[&str]) -> VerifyResult<Vec<RecordBatch>> {
        let mut fields = Vec::new();
        let mut arrays: Vec<ArrayRef> = Vec::new();
        for column in columns {
            match *column {
                "ID" => {
                    fields.push(Field::new("ID", DataType::Int64, false));
                    let ids: Int64Array = self.rows.iter().map(|(_, id)| Some(*id)).collect();
                    arrays.push(Arc::new(ids));
                }
                "Name" => {
                    fields.push(Field::new("Name", DataType::Utf8, false));
                    let names: StringArray =
                        self.rows.iter().map(|(name, _)| Some(name.as_str())).collect();
                    arrays.push(Arc::new(names));
                }
                other => {
                    return Err(VerifyError::schema_error(format!("No column '{}'", other)));
                }
            }
        }
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Ok(vec![batch])
    }
}

/// Rows as `(name, id)` pairs
pub fn rows(items: &[(&str, i64)]) -> Vec<(String, i64)> {
    items.iter().map(|(n, i)| (n.to_string(), *i)).collect()
}

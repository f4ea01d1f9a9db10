//! Installation verifier.
//!
//! Starts a session, loads the sample table, checks its row count and its
//! `(Name, ID)` contents, and always attempts to stop the session before the
//! verdict is handed back. Errors raised while stopping are swallowed so they
//! can never change an already decided outcome.

use crate::context::DataFusionProvider;
use crate::dataset::{COLUMNS, ID_COLUMN, NAME_COLUMN, NameId, expected_pairs, sample_records};
use crate::outcome::Outcome;
use crate::traits::{EngineSession, EngineTable, SessionProvider};
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Int64Type};
use arrow::record_batch::RecordBatch;
use engine_verify_common::{EngineConfig, ErrorContext, VerifyError, VerifyResult};
use futures::FutureExt;
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::BTreeSet;
use std::fmt::Display;
use std::io::Write;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, info, warn};

/// Rows the sample table must hold.
pub const EXPECTED_ROWS: usize = 3;

pub struct Verifier<P> {
    provider: P,
    config: EngineConfig,
}

impl<P: SessionProvider> Verifier<P> {
    pub fn new(provider: P, config: EngineConfig) -> Self {
        Self { provider, config }
    }

    /// Run the full check, writing the report to `out`.
    ///
    /// The session is released on every path once it has been acquired,
    /// including when the engine panics mid-run.
    pub async fn run<W: Write>(&self, out: &mut W) -> Outcome {
        info!("Starting session...");
        let session = match self.provider.acquire(&self.config).await {
            Ok(session) => session,
            Err(err) => return conclude(err.into(), out),
        };

        let outcome = match AssertUnwindSafe(verify(&session, out)).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => Outcome::EngineError(err),
            Err(payload) => Outcome::EngineError(VerifyError::execution_error(format!(
                "Engine panicked: {}",
                panic_message(payload.as_ref())
            ))),
        };
        let outcome = conclude(outcome, out);

        release(&session).await;
        outcome
    }
}

/// Resolve the configuration from the environment and check a DataFusion session.
///
/// A configuration that cannot be resolved is reported like any other
/// engine error.
pub async fn run_installation_check<W: Write>(out: &mut W) -> Outcome {
    match EngineConfig::from_env() {
        Ok(config) => Verifier::new(DataFusionProvider, config).run(out).await,
        Err(err) => {
            info!("Starting session...");
            conclude(err.into(), out)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

async fn verify<S, W>(session: &S, out: &mut W) -> VerifyResult<Outcome>
where
    S: EngineSession,
    W: Write,
{
    emit(out, format!("Engine Version: {}", session.version()))?;

    let table = session.create_table(&sample_records(), &COLUMNS).await?;

    emit(out, "Displaying DataFrame:")?;
    emit(out, table.render().await?)?;

    let actual_rows = table.count().await?;
    if actual_rows != EXPECTED_ROWS {
        return Ok(Outcome::RowCountMismatch {
            expected: EXPECTED_ROWS,
            actual: actual_rows,
        });
    }

    let batches = table.select_collect(&[NAME_COLUMN, ID_COLUMN]).await?;
    let actual = collect_pairs(&batches)?;
    let expected = expected_pairs();
    if actual != expected {
        return Ok(Outcome::ContentMismatch { expected, actual });
    }

    Ok(Outcome::Passed)
}

/// Collect `(Name, ID)` pairs from materialized batches into a set.
pub fn collect_pairs(batches: &[RecordBatch]) -> VerifyResult<BTreeSet<NameId>> {
    let mut pairs = BTreeSet::new();
    for batch in batches {
        let names = column_as(batch, NAME_COLUMN, &DataType::Utf8)?;
        let ids = column_as(batch, ID_COLUMN, &DataType::Int64)?;
        let names = names.as_string_opt::<i32>().ok_or_else(|| {
            VerifyError::schema_error(format!("Column '{}' is not a string column", NAME_COLUMN))
        })?;
        let ids = ids.as_primitive_opt::<Int64Type>().ok_or_else(|| {
            VerifyError::schema_error(format!("Column '{}' is not an integer column", ID_COLUMN))
        })?;

        for row in 0..batch.num_rows() {
            if names.is_null(row) || ids.is_null(row) {
                return Err(VerifyError::schema_error(format!(
                    "Row {} holds a null name or id",
                    row
                )));
            }
            pairs.insert((names.value(row).to_string(), ids.value(row)));
        }
    }
    Ok(pairs)
}

fn column_as(batch: &RecordBatch, name: &str, data_type: &DataType) -> VerifyResult<ArrayRef> {
    let column = batch.column_by_name(name).ok_or_else(|| {
        VerifyError::schema_error(format!("Collected rows have no '{}' column", name))
    })?;
    Ok(cast(column.as_ref(), data_type)?)
}

fn emit<W: Write>(out: &mut W, line: impl Display) -> VerifyResult<()> {
    writeln!(out, "{}", line).with_execution_context(|| "Failed to write report".to_string())
}

/// Log an engine error, print the verdict and hand the outcome back.
///
/// The logged backtrace is the one taken where the underlying error was
/// wrapped, or one taken here when the error has no source. Both honor
/// `RUST_BACKTRACE`.
fn conclude<W: Write>(outcome: Outcome, out: &mut W) -> Outcome {
    if let Outcome::EngineError(err) = &outcome {
        let causes: Vec<String> = anyhow::Chain::new(err)
            .skip(1)
            .map(|cause| cause.to_string())
            .collect();
        let backtrace = match err.backtrace() {
            Some(backtrace) => backtrace.to_string(),
            None => {
                let here = Backtrace::capture();
                match here.status() {
                    BacktraceStatus::Captured => here.to_string(),
                    _ => "disabled (set RUST_BACKTRACE=1)".to_string(),
                }
            }
        };
        error!(
            category = ?err.category(),
            caused_by = ?causes,
            backtrace = %backtrace,
            "An error occurred during engine verification: {}",
            err
        );
    }
    if let Err(err) = writeln!(out, "{}", outcome) {
        warn!("Failed to write verdict: {}", err);
    }
    outcome
}

async fn release<S: EngineSession>(session: &S) {
    info!("Stopping session...");
    if let Err(err) = session.stop().await {
        debug!("Ignoring error raised while stopping session: {}", err);
    }
}

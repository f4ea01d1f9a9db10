//! DataFrame wrapper over DataFusion's `DataFrame`.
//!
//! DataFusion data frames are consumed by every action, so each action here
//! works on a clone of the logical plan and the wrapper stays reusable.

use crate::traits::EngineTable;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use async_trait::async_trait;
use datafusion::prelude::DataFrame;
use engine_verify_common::VerifyResult;

#[derive(Debug, Clone)]
pub struct LocalDataFrame {
    dataframe: DataFrame,
}

impl LocalDataFrame {
    pub fn new(dataframe: DataFrame) -> Self {
        Self { dataframe }
    }

    /// Column names, in schema order
    pub fn columns(&self) -> Vec<String> {
        self.dataframe
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect()
    }

    /// Select specific columns by name
    pub fn select(&self, columns: &[&str]) -> VerifyResult<Self> {
        let dataframe = self.dataframe.clone().select_columns(columns)?;
        Ok(Self::new(dataframe))
    }

    /// Count the number of rows
    pub async fn count(&self) -> VerifyResult<usize> {
        Ok(self.dataframe.clone().count().await?)
    }

    /// Materialize all rows locally
    pub async fn collect(&self) -> VerifyResult<Vec<RecordBatch>> {
        Ok(self.dataframe.clone().collect().await?)
    }

    /// Render the rows as an ASCII table
    pub async fn render(&self) -> VerifyResult<String> {
        let batches = self.collect().await?;
        Ok(pretty_format_batches(&batches)?.to_string())
    }
}

#[async_trait]
impl EngineTable for LocalDataFrame {
    async fn count(&self) -> VerifyResult<usize> {
        LocalDataFrame::count(self).await
    }

    async fn render(&self) -> VerifyResult<String> {
        LocalDataFrame::render(self).await
    }

    async fn select_collect(&self, columns: &[&str]) -> VerifyResult<Vec<RecordBatch>> {
        self.select(columns)?.collect().await
    }
}

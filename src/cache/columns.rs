// src/cache/columns.rs

use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{Array, ArrayRef, StringArray},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::sync::Arc;

use crate::table::CommuneTable;

/// Every column is stored as non-null Utf8, so a table survives the cache
/// cell for cell.
pub fn table_schema(headers: &[String]) -> Arc<Schema> {
    let fields: Vec<Field> = headers
        .iter()
        .map(|name| Field::new(name, DataType::Utf8, false))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Column-major copy of the table as a single RecordBatch.
pub fn table_to_batch(table: &CommuneTable) -> Result<RecordBatch> {
    let schema = table_schema(table.headers());
    let columns: Vec<ArrayRef> = (0..table.headers().len())
        .map(|col| {
            let values = table.rows().iter().map(|row| Some(row[col].as_str()));
            Arc::new(StringArray::from_iter(values)) as ArrayRef
        })
        .collect();
    RecordBatch::try_new(schema, columns).context("building cache record batch")
}

/// Append the rows of `batch` to `rows`, row-major.
pub fn append_batch_rows(batch: &RecordBatch, rows: &mut Vec<Vec<String>>) -> Result<()> {
    let columns: Vec<&StringArray> = batch
        .columns()
        .iter()
        .enumerate()
        .map(|(i, col)| {
            col.as_any().downcast_ref::<StringArray>().ok_or_else(|| {
                anyhow!(
                    "cache column {} should be Utf8, found {:?}",
                    i,
                    col.data_type()
                )
            })
        })
        .collect::<Result<_>>()?;

    rows.reserve(batch.num_rows());
    for row in 0..batch.num_rows() {
        rows.push(
            columns
                .iter()
                .map(|col| {
                    if col.is_null(row) {
                        String::new()
                    } else {
                        col.value(row).to_string()
                    }
                })
                .collect(),
        );
    }
    Ok(())
}

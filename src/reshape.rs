// src/reshape.rs
//! Wide ⇄ long reshaping of Arrow record batches.
//!
//! `melt` turns one column per measure into (id, measure, value) rows;
//! `pivot` undoes it. Value types pass through untouched, so a string table
//! melts into string values and a numeric one into numeric values.

use anyhow::{anyhow, bail, Context, Result};
use arrow::{
    array::{new_empty_array, Array, ArrayRef, Float64Builder, StringArray, UInt32Array},
    compute::{cast, interleave, take},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
    row::{OwnedRow, RowConverter, SortField},
    util::display::array_value_to_string,
};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, instrument};

/// What `pivot` does when an (id, measure) pair shows up more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    #[default]
    Reject,
    /// Keep the value that appears last in the input.
    LastWins,
}

/// Wide → long.
///
/// Every column except `id_column` becomes a measure. Output rows run
/// through the input row by row, and within a row through the value columns
/// in their original order.
#[instrument(level = "debug", skip(batch), fields(rows = batch.num_rows()))]
pub fn melt(
    batch: &RecordBatch,
    id_column: &str,
    measure_name: &str,
    value_name: &str,
) -> Result<RecordBatch> {
    let schema = batch.schema();
    let id_idx = schema
        .index_of(id_column)
        .with_context(|| format!("id column `{}` not found", id_column))?;
    if measure_name == value_name || measure_name == id_column || value_name == id_column {
        bail!(
            "output column names must differ: id `{}`, measure `{}`, value `{}`",
            id_column,
            measure_name,
            value_name
        );
    }

    let value_idx: Vec<usize> = (0..batch.num_columns()).filter(|&i| i != id_idx).collect();
    let Some(&first) = value_idx.first() else {
        bail!("table has no value columns besides `{}`", id_column);
    };
    let value_type = schema.field(first).data_type().clone();
    if let Some(&odd) = value_idx
        .iter()
        .find(|&&i| schema.field(i).data_type() != &value_type)
    {
        bail!(
            "value columns must share one type: `{}` is {} but `{}` is {}",
            schema.field(first).name(),
            value_type,
            schema.field(odd).name(),
            schema.field(odd).data_type()
        );
    }

    let rows = batch.num_rows();
    let width = value_idx.len();
    let total = rows
        .checked_mul(width)
        .filter(|&n| n <= u32::MAX as usize)
        .ok_or_else(|| anyhow!("melted table too large: {} rows x {} columns", rows, width))?;

    let id_take: Vec<u32> = (0..rows as u32)
        .flat_map(|r| std::iter::repeat(r).take(width))
        .collect();
    let id_take = UInt32Array::from(id_take);
    let ids = take(batch.column(id_idx).as_ref(), &id_take, None).context("repeating ids")?;

    let names: Vec<&str> = value_idx.iter().map(|&i| schema.field(i).name().as_str()).collect();
    let measures: Vec<&str> = (0..rows).flat_map(|_| names.iter().copied()).collect();
    let measures: ArrayRef = Arc::new(StringArray::from(measures));

    let sources: Vec<&dyn Array> = value_idx.iter().map(|&i| batch.column(i).as_ref()).collect();
    let picks: Vec<(usize, usize)> = (0..rows)
        .flat_map(|r| (0..width).map(move |c| (c, r)))
        .collect();
    let values = if picks.is_empty() {
        new_empty_array(&value_type)
    } else {
        interleave(&sources, &picks).context("gathering values")?
    };

    let out_schema = Schema::new(vec![
        schema.field(id_idx).clone(),
        Field::new(measure_name, DataType::Utf8, false),
        Field::new(value_name, value_type, true),
    ]);
    debug!(rows_out = total, measures = width, "melted");
    RecordBatch::try_new(Arc::new(out_schema), vec![ids, measures, values])
        .context("building long batch")
}

/// Long → wide.
///
/// One output row per distinct id and one column per distinct measure, both
/// in order of first appearance. A missing (id, measure) pair leaves a null
/// cell; a repeated one is handled per `policy`.
#[instrument(level = "debug", skip(batch), fields(rows = batch.num_rows()))]
pub fn pivot(
    batch: &RecordBatch,
    id_column: &str,
    measure_column: &str,
    value_column: &str,
    policy: DuplicatePolicy,
) -> Result<RecordBatch> {
    let schema = batch.schema();
    let idx = |name: &str| {
        schema
            .index_of(name)
            .with_context(|| format!("column `{}` not found", name))
    };
    let (id_idx, measure_idx, value_idx) = (idx(id_column)?, idx(measure_column)?, idx(value_column)?);

    let id_col = batch.column(id_idx);
    let value_col = batch.column(value_idx);
    let measure_col = cast(batch.column(measure_idx), &DataType::Utf8)
        .with_context(|| format!("measure column `{}` must be text", measure_column))?;
    let measure_col = measure_col
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow!("measure column `{}` is not utf8", measure_column))?;

    let converter = RowConverter::new(vec![SortField::new(id_col.data_type().clone())])
        .context("creating id row converter")?;
    let id_rows = converter
        .convert_columns(&[id_col.clone()])
        .context("encoding id column")?;

    let mut id_slot: HashMap<OwnedRow, usize> = HashMap::new();
    let mut id_first_row: Vec<u32> = Vec::new();
    let mut measure_slot: HashMap<&str, usize> = HashMap::new();
    let mut measure_names: Vec<&str> = Vec::new();
    let mut cells: HashMap<(usize, usize), u32> = HashMap::with_capacity(batch.num_rows());

    for row in 0..batch.num_rows() {
        if measure_col.is_null(row) {
            bail!("row {}: measure `{}` is null", row + 1, measure_column);
        }
        let measure = measure_col.value(row);
        if measure == id_column {
            bail!("measure `{}` collides with the id column", measure);
        }
        let m = *measure_slot.entry(measure).or_insert_with(|| {
            measure_names.push(measure);
            measure_names.len() - 1
        });
        let next_id = id_first_row.len();
        let i = *id_slot.entry(id_rows.row(row).owned()).or_insert(next_id);
        if i == next_id {
            id_first_row.push(row as u32);
        }

        if let Some(prev) = cells.insert((i, m), row as u32) {
            match policy {
                DuplicatePolicy::LastWins => {
                    debug!(measure, prev_row = prev + 1, row = row + 1, "duplicate cell; keeping last");
                }
                DuplicatePolicy::Reject => {
                    let id_text = array_value_to_string(id_col, row).unwrap_or_default();
                    bail!(
                        "duplicate value for id `{}` and measure `{}` (rows {} and {})",
                        id_text,
                        measure,
                        prev + 1,
                        row + 1
                    );
                }
            }
        }
    }

    let mut fields = vec![schema.field(id_idx).clone()];
    let mut columns: Vec<ArrayRef> = vec![take(
        id_col.as_ref(),
        &UInt32Array::from(id_first_row.clone()),
        None,
    )
    .context("collecting ids")?];

    for (m, name) in measure_names.iter().enumerate() {
        let picks: UInt32Array = (0..id_first_row.len())
            .map(|i| cells.get(&(i, m)).copied())
            .collect();
        columns.push(take(value_col.as_ref(), &picks, None).context("placing values")?);
        fields.push(Field::new(*name, value_col.data_type().clone(), true));
    }

    debug!(ids = id_first_row.len(), measures = measure_names.len(), "pivoted");
    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).context("building wide batch")
}

/// Trim whitespace and one pair of wrapping quotes.
fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

/// Names of the string columns (other than `skip`) whose every non-null,
/// non-empty cell parses as a number.
pub fn numeric_columns(batch: &RecordBatch, skip: &str) -> Vec<String> {
    let schema = batch.schema();
    schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.name() != skip)
        .filter_map(|(i, f)| {
            let arr = batch.column(i).as_any().downcast_ref::<StringArray>()?;
            let numeric = arr
                .iter()
                .flatten()
                .map(clean_str)
                .filter(|s| !s.is_empty())
                .all(|s| s.parse::<f64>().is_ok());
            numeric.then(|| f.name().clone())
        })
        .collect()
}

/// Convert the named string columns to `Float64`. Cells that do not parse
/// become null; other columns are left alone.
pub fn coerce_numeric(batch: &RecordBatch, columns: &[String]) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields = Vec::with_capacity(batch.num_columns());
    let mut out: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns());

    for (i, field) in schema.fields().iter().enumerate() {
        let arr = batch.column(i);
        if columns.contains(field.name()) {
            let sarr = arr
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| anyhow!("column `{}` is not a string column", field.name()))?;
            let mut b = Float64Builder::with_capacity(sarr.len());
            for opt in sarr.iter() {
                b.append_option(opt.and_then(|s| clean_str(s).parse().ok()));
            }
            out.push(Arc::new(b.finish()));
            fields.push(Field::new(field.name(), DataType::Float64, true));
        } else {
            out.push(arr.clone());
            fields.push(field.as_ref().clone());
        }
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), out).context("building numeric batch")
}

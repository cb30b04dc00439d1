//! LanceDB connection helpers and the `passages` / `meta` table codecs.
//!
//! One topic cache is one LanceDB directory holding both tables. Readers pull
//! the whole `passages` table back into memory; nothing here mutates a table
//! after it was created.
use anyhow::{anyhow, Result};
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use wikirag_core::types::Passage;

use crate::schema::{build_meta_schema, build_passages_schema, META_TABLE, PASSAGES_TABLE};

pub async fn open_db(path: &Path) -> Result<Connection> {
    Ok(connect(path.to_string_lossy().as_ref()).execute().await?)
}

pub async fn has_table(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

pub async fn write_passages(conn: &Connection, passages: &[Passage], vectors: &[Vec<f32>], dim: usize) -> Result<()> {
    if passages.len() != vectors.len() {
        return Err(anyhow!("{} passages but {} vectors", passages.len(), vectors.len()));
    }
    let dim = i32::try_from(dim).map_err(|_| anyhow!("dimension {dim} does not fit the table schema"))?;
    let schema = build_passages_schema(dim);
    let mut ords = Vec::with_capacity(passages.len());
    let mut sources = Vec::with_capacity(passages.len());
    let mut texts = Vec::with_capacity(passages.len());
    for p in passages {
        ords.push(to_i32(p.order)?);
        sources.push(to_i32(p.source)?);
        texts.push(p.text.as_str());
    }
    let rows = vectors.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
    let rb = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int32Array::from(ords)),
            Arc::new(Int32Array::from(sources)),
            Arc::new(StringArray::from(texts)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(rows, dim)),
        ],
    )?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), schema));
    conn.create_table(PASSAGES_TABLE, reader).execute().await?;
    Ok(())
}

/// Read every passage row back, sorted by `ord`.
pub async fn read_passages(conn: &Connection) -> Result<Vec<(Passage, Vec<f32>)>> {
    let t = conn.open_table(PASSAGES_TABLE).execute().await?;
    let mut stream = t.query().execute().await?;
    let mut rows = Vec::new();
    while let Some(batch) = stream.try_next().await? {
        let ord_col = int_column(&batch, "ord")?;
        let source_col = int_column(&batch, "source")?;
        let text_col = batch
            .column_by_name("text")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| anyhow!("passages.text column missing"))?;
        let vec_col = batch
            .column_by_name("vector")
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| anyhow!("passages.vector column missing"))?;
        for i in 0..batch.num_rows() {
            let list = vec_col.value(i);
            let vector = list.as_primitive::<Float32Type>().values().iter().copied().collect::<Vec<f32>>();
            let passage = Passage {
                text: text_col.value(i).to_string(),
                order: usize::try_from(ord_col.value(i))?,
                source: usize::try_from(source_col.value(i))?,
            };
            rows.push((passage, vector));
        }
    }
    rows.sort_by_key(|(p, _)| p.order);
    Ok(rows)
}

pub async fn write_meta(conn: &Connection, entries: &[(&str, String)]) -> Result<()> {
    let schema = build_meta_schema();
    let now = Utc::now().timestamp_millis();
    let rb = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(entries.iter().map(|(k, _)| *k).collect::<Vec<_>>())),
            Arc::new(StringArray::from(entries.iter().map(|(_, v)| v.as_str()).collect::<Vec<_>>())),
            Arc::new(TimestampMillisecondArray::from(vec![now; entries.len()])),
        ],
    )?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), schema));
    conn.create_table(META_TABLE, reader).execute().await?;
    Ok(())
}

pub async fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    if !has_table(conn, META_TABLE).await? { return Ok(None); }
    let t = conn.open_table(META_TABLE).execute().await?;
    let mut stream = t.query().only_if(format!("key = '{}'", key.replace('\'', "''"))).execute().await?;
    while let Some(batch) = stream.try_next().await? {
        if batch.num_rows() == 0 { continue; }
        let val = batch
            .column_by_name("value")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| anyhow!("meta.value column missing"))?;
        return Ok(Some(val.value(0).to_string()));
    }
    Ok(None)
}

/// All meta rows as a map; later rows win on duplicate keys.
pub async fn read_meta(conn: &Connection) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    if !has_table(conn, META_TABLE).await? { return Ok(out); }
    let t = conn.open_table(META_TABLE).execute().await?;
    let mut stream = t.query().execute().await?;
    while let Some(batch) = stream.try_next().await? {
        let key_col = batch.column_by_name("key").and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let val_col = batch.column_by_name("value").and_then(|c| c.as_any().downcast_ref::<StringArray>());
        let (Some(keys), Some(vals)) = (key_col, val_col) else { return Err(anyhow!("meta table has unexpected columns")) };
        for i in 0..batch.num_rows() {
            out.insert(keys.value(i).to_string(), vals.value(i).to_string());
        }
    }
    Ok(out)
}

fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| anyhow!("passages.{name} column missing"))
}

fn to_i32(v: usize) -> Result<i32> {
    i32::try_from(v).map_err(|_| anyhow!("value {v} does not fit Int32"))
}

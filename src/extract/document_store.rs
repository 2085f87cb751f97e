//! MongoDB extract and load

use std::path::Path;

use mongodb::bson::{doc, Bson, Document};
use mongodb::sync::Client;
use polars::prelude::*;
use tracing::{error, info};

use crate::constants::{ID_COLUMN, INSERT_BATCH_SIZE, MISSING_TOKEN};
use crate::error::{NetsecError, Result};
use crate::utils::DataLoader;

/// Client for pushing records to and reading them from the document store
pub struct NetworkDataExtract {
    client: Client,
}

impl NetworkDataExtract {
    /// Build a client from a connection string. Does not contact the server.
    pub fn connect(url: &str) -> Result<Self> {
        let client = Client::with_uri_str(url).map_err(store_error)?;
        Ok(Self { client })
    }

    /// Round-trip a `ping` to fail fast on an unreachable server
    pub fn ping(&self, database: &str) -> Result<()> {
        self.client
            .database(database)
            .run_command(doc! { "ping": 1 }, None)
            .map_err(store_error)?;
        Ok(())
    }

    /// Read a CSV file into one document per row
    pub fn csv_to_records(path: impl AsRef<Path>) -> Result<Vec<Document>> {
        let df = DataLoader::new().load_csv(path)?;
        frame_to_documents(&df)
    }

    /// Insert `records` in batches; returns the number inserted
    pub fn insert_records(
        &self,
        records: &[Document],
        database: &str,
        collection: &str,
    ) -> Result<usize> {
        self.ping(database)?;
        let coll = self.client.database(database).collection::<Document>(collection);

        let mut inserted = 0;
        for batch in insert_batches(records) {
            let result = coll.insert_many(batch, None).map_err(store_error)?;
            inserted += result.inserted_ids.len();
        }
        info!(inserted, database, collection, "Inserted records");
        Ok(inserted)
    }

    /// Every document of a collection as a frame
    pub fn fetch_collection(&self, database: &str, collection: &str) -> Result<DataFrame> {
        let coll = self.client.database(database).collection::<Document>(collection);
        let cursor = coll.find(None, None).map_err(store_error)?;
        let documents = cursor
            .collect::<std::result::Result<Vec<Document>, _>>()
            .map_err(store_error)?;
        documents_to_frame(&documents)
    }
}

/// `insert_many` batches of at most `INSERT_BATCH_SIZE` records
fn insert_batches(records: &[Document]) -> std::slice::Chunks<'_, Document> {
    records.chunks(INSERT_BATCH_SIZE)
}

fn store_error(err: mongodb::error::Error) -> NetsecError {
    let err = NetsecError::from(err);
    if let NetsecError::DocumentStoreTimeout(msg) = &err {
        error!(error = %msg, "Document store server selection timed out");
    }
    err
}

/// Convert rows to documents; nulls become BSON null
pub fn frame_to_documents(df: &DataFrame) -> Result<Vec<Document>> {
    let columns = df.get_columns();
    let mut documents = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let mut document = Document::new();
        for column in columns {
            document.insert(column.name().to_string(), any_value_to_bson(column.get(row)?));
        }
        documents.push(document);
    }
    Ok(documents)
}

fn any_value_to_bson(value: AnyValue<'_>) -> Bson {
    match value {
        AnyValue::Null => Bson::Null,
        AnyValue::Boolean(b) => Bson::Boolean(b),
        AnyValue::Int32(v) => Bson::Int32(v),
        AnyValue::Int64(v) => Bson::Int64(v),
        AnyValue::UInt32(v) => Bson::Int64(v as i64),
        AnyValue::Float32(v) => Bson::Double(v as f64),
        AnyValue::Float64(v) => Bson::Double(v),
        AnyValue::String(s) => Bson::String(s.to_string()),
        other => Bson::String(other.to_string()),
    }
}

/// Convert documents to a frame.
///
/// Column order follows the first document. `_id` becomes a string column;
/// every other field becomes `Float64`, with the missing token, absent
/// fields and unparseable strings as null.
pub fn documents_to_frame(documents: &[Document]) -> Result<DataFrame> {
    let Some(first) = documents.first() else {
        return Ok(DataFrame::empty());
    };

    let mut columns = Vec::with_capacity(first.len());
    for key in first.keys() {
        let column = if key == ID_COLUMN {
            let values: Vec<Option<String>> = documents
                .iter()
                .map(|d| d.get(key).map(bson_to_id))
                .collect();
            Column::new(key.as_str().into(), values)
        } else {
            let values: Vec<Option<f64>> = documents
                .iter()
                .map(|d| d.get(key).and_then(bson_to_f64))
                .collect();
            Column::new(key.as_str().into(), values)
        };
        columns.push(column);
    }
    Ok(DataFrame::new(columns)?)
}

fn bson_to_id(value: &Bson) -> String {
    match value {
        Bson::ObjectId(oid) => oid.to_hex(),
        Bson::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn bson_to_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(v) => Some(*v).filter(|v| !v.is_nan()),
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        Bson::String(s) if s.trim() == MISSING_TOKEN => None,
        Bson::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

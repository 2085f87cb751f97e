//! Data sources feeding the ingestion stage

mod document_store;

pub use document_store::{documents_to_frame, frame_to_documents, NetworkDataExtract};

use std::path::PathBuf;

use polars::prelude::DataFrame;
use tracing::info;

use crate::error::Result;
use crate::utils::DataLoader;

/// Where the raw records come from
#[derive(Debug, Clone)]
pub enum DataSource {
    /// Headered CSV file
    Csv(PathBuf),
    /// MongoDB collection
    DocumentStore {
        url: String,
        database: String,
        collection: String,
    },
}

impl DataSource {
    /// Read the whole source into memory
    pub fn load(&self) -> Result<DataFrame> {
        let df = match self {
            DataSource::Csv(path) => {
                info!(path = %path.display(), "Reading records from CSV");
                DataLoader::new().load_csv(path)?
            }
            DataSource::DocumentStore {
                url,
                database,
                collection,
            } => {
                info!(database = %database, collection = %collection, "Reading records from document store");
                NetworkDataExtract::connect(url)?.fetch_collection(database, collection)?
            }
        };
        info!(rows = df.height(), columns = df.width(), "Loaded records");
        Ok(df)
    }

    pub fn describe(&self) -> String {
        match self {
            DataSource::Csv(path) => path.display().to_string(),
            DataSource::DocumentStore {
                database,
                collection,
                ..
            } => format!("{}.{}", database, collection),
        }
    }
}

//! Import entry points
//!
//! Every entry point comes in an eager form that returns all records or the
//! first error, and a streaming form that yields one [`RowResult`] per row.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use crate::catalog::{Record, Schema};
use crate::config::ImportConfig;
use crate::error::{MappingError, SchemaError};
use crate::materialize::RowMaterializer;
use crate::remote::fetch_remote;
use crate::table::{self, TableSource, WorkbookSource};
use crate::traverse::{self, RowResult, RowStream};

/// Imports tables into records of type `R`
///
/// Cheap to clone; clones share the schema and config.
pub struct Importer<R> {
    materializer: Arc<RowMaterializer<R>>,
}

impl<R> Clone for Importer<R> {
    fn clone(&self) -> Self {
        Importer {
            materializer: self.materializer.clone(),
        }
    }
}

impl<R: Record> Importer<R> {
    pub fn new(config: ImportConfig<R>) -> Result<Self, SchemaError> {
        Self::with_schema(Arc::new(R::schema()?), config)
    }
}

impl<R: Default + Send + 'static> Importer<R> {
    /// Build an importer from an already constructed schema
    pub fn with_schema(schema: Arc<Schema<R>>, config: ImportConfig<R>) -> Result<Self, SchemaError> {
        let materializer = RowMaterializer::new(schema, config)?;
        Ok(Importer {
            materializer: Arc::new(materializer),
        })
    }

    pub fn materializer(&self) -> &RowMaterializer<R> {
        &self.materializer
    }

    pub fn import_source<S: TableSource + ?Sized>(&self, source: &mut S) -> Result<Vec<R>, MappingError> {
        traverse::import_all(&*self.materializer, source)
    }

    /// Import a spreadsheet read from `reader`
    pub fn import<Rd: Read>(&self, mut reader: Rd) -> Result<Vec<R>, MappingError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .context("Failed to read spreadsheet data")
            .map_err(unreadable)?;
        self.import_bytes(bytes)
    }

    /// Import a local file; `.csv` files are read as CSV, anything else as a spreadsheet
    pub fn import_local(&self, path: impl AsRef<Path>) -> Result<Vec<R>, MappingError> {
        let path = path.as_ref();
        log::info!("Importing {}", path.display());
        let mut source = table::open_path(path).map_err(unreadable)?;
        self.import_source(&mut source)
    }

    /// Import an in-memory spreadsheet
    pub fn import_bytes(&self, bytes: Vec<u8>) -> Result<Vec<R>, MappingError> {
        let mut source = WorkbookSource::from_bytes(bytes).map_err(unreadable)?;
        self.import_source(&mut source)
    }

    /// Download and import a remote file
    pub async fn import_url(&self, url: &str) -> Result<Vec<R>, MappingError> {
        let file = fetch_remote(url).await?;
        let importer = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut source = table::open_bytes(file.bytes, &file.file_name).map_err(unreadable)?;
            importer.import_source(&mut source)
        })
        .await
        .map_err(|e| MappingError::Structural(format!("import task failed: {}", e)))?
    }

    /// Stream rows from an open source
    ///
    /// Must be called from within a Tokio runtime, as must the other `import_stream_*` methods.
    pub fn import_stream<S: TableSource + 'static>(&self, source: S) -> RowStream<R> {
        traverse::spawn_stream(self.materializer.clone(), source)
    }

    pub fn import_stream_local(&self, path: impl Into<PathBuf>) -> RowStream<R> {
        let path = path.into();
        self.spawn_opened(move || table::open_path(&path))
    }

    pub fn import_stream_bytes(&self, bytes: Vec<u8>) -> RowStream<R> {
        self.spawn_opened(move || {
            let source: Box<dyn TableSource> = Box::new(WorkbookSource::from_bytes(bytes)?);
            Ok(source)
        })
    }

    /// Download a remote file and stream its rows
    ///
    /// A failed download is reported as the only result.
    pub fn import_stream_url(&self, url: impl Into<String>) -> RowStream<R> {
        let url = url.into();
        let materializer = self.materializer.clone();
        let (tx, stream) = traverse::channel();

        tokio::spawn(async move {
            let file = match fetch_remote(&url).await {
                Ok(file) => file,
                Err(e) => {
                    log::warn!("Streaming import of {} failed: {}", url, e);
                    let _ = tx.send(RowResult::failed(0, e)).await;
                    return;
                }
            };
            tokio::task::spawn_blocking(move || {
                match table::open_bytes(file.bytes, &file.file_name) {
                    Ok(mut source) => traverse::produce(&*materializer, &mut source, &tx),
                    Err(e) => {
                        let _ = tx.blocking_send(RowResult::failed(0, unreadable(e)));
                    }
                }
            });
        });

        stream
    }

    /// Open the source on the producer thread, then stream it
    fn spawn_opened<F>(&self, open: F) -> RowStream<R>
    where
        F: FnOnce() -> anyhow::Result<Box<dyn TableSource>> + Send + 'static,
    {
        let materializer = self.materializer.clone();
        let (tx, stream) = traverse::channel();
        tokio::task::spawn_blocking(move || match open() {
            Ok(mut source) => traverse::produce(&*materializer, &mut source, &tx),
            Err(e) => {
                let _ = tx.blocking_send(RowResult::failed(0, unreadable(e)));
            }
        });
        stream
    }
}

fn unreadable(e: anyhow::Error) -> MappingError {
    MappingError::Structural(format!("{:#}", e))
}

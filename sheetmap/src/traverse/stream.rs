//! Streaming import over a bounded channel
//!
//! The producer runs on a blocking thread and owns the source. Each data row
//! becomes one [`RowResult`]; the channel holds a single result, so the
//! producer never reads more than one row ahead of the consumer.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::materialize::RowMaterializer;
use crate::table::TableSource;

use super::{RowResult, read_header};

/// Receiving end of a streaming import
///
/// Dropping the stream stops the producer at its next row.
pub struct RowStream<R> {
    rx: mpsc::Receiver<RowResult<R>>,
}

impl<R> RowStream<R> {
    /// Next row result, or `None` once the import has ended
    pub async fn next(&mut self) -> Option<RowResult<R>> {
        self.rx.recv().await
    }

    /// Blocking variant of [`RowStream::next`] for synchronous callers
    ///
    /// Panics when called from within an async context.
    pub fn blocking_next(&mut self) -> Option<RowResult<R>> {
        self.rx.blocking_recv()
    }
}

impl<R> Stream for RowStream<R> {
    type Item = RowResult<R>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

pub(crate) fn channel<R>() -> (mpsc::Sender<RowResult<R>>, RowStream<R>) {
    let (tx, rx) = mpsc::channel(1);
    (tx, RowStream { rx })
}

/// Start a streaming import of `source` on a blocking thread
///
/// Must be called from within a Tokio runtime.
pub fn spawn_stream<R, S>(materializer: Arc<RowMaterializer<R>>, mut source: S) -> RowStream<R>
where
    R: Default + Send + 'static,
    S: TableSource + 'static,
{
    let (tx, stream) = channel();
    tokio::task::spawn_blocking(move || produce(&*materializer, &mut source, &tx));
    stream
}

/// Drive one import, sending every outcome to `tx`
///
/// Returns early when the receiver has gone away.
pub(crate) fn produce<R: Default, S: TableSource + ?Sized>(
    materializer: &RowMaterializer<R>,
    source: &mut S,
    tx: &mpsc::Sender<RowResult<R>>,
) {
    // Reading header
    let header_row = materializer.options().header_row;
    let (index, mut rows) = match read_header(materializer, source) {
        Ok(positioned) => positioned,
        Err(e) => {
            log::warn!("Streaming import failed before the first row: {}", e);
            let _ = tx.blocking_send(RowResult::failed(header_row, e));
            return;
        }
    };

    // Reading rows
    let mut sent = 0usize;
    while let Some(item) = rows.next() {
        let result = match item {
            Ok((number, cells)) => match materializer.materialize(&cells, &index) {
                Ok(record) => RowResult::ok(number, record),
                Err(e) => RowResult::failed(number, e.at_row(number)),
            },
            Err(e) => {
                log::warn!("Streaming import stopped at row {}: {}", rows.position(), e);
                let _ = tx.blocking_send(RowResult::failed(rows.position(), e));
                return;
            }
        };
        if tx.blocking_send(result).is_err() {
            log::debug!("Row stream closed by consumer after {} rows", sent);
            return;
        }
        sent += 1;
    }

    log::debug!("Streamed {} rows", sent);
}

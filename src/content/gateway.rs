//! Authorization-gated access to a content store.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, Stream};
use tokio_stream::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::auth::Authorization;
use crate::error::{ContentErrorKind, GateError, GateResult};
use crate::identity::Address;
use crate::validation::{Area, FileName};

use super::{ContentDescriptor, ContentStore};

/// Default read size for streamed content.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Chunks of a fetched item.
///
/// Yields at most one error, after which the stream ends. A consumer that
/// sees an error must treat the whole transfer as failed.
pub type ChunkStream = Pin<Box<dyn Stream<Item = GateResult<Bytes>> + Send>>;

/// A fetched item being streamed to the visitor.
pub struct ContentStream {
    pub descriptor: ContentDescriptor,
    pub length: Option<u64>,
    pub chunks: ChunkStream,
}

impl fmt::Debug for ContentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentStream")
            .field("descriptor", &self.descriptor)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Serves content only to holders of a matching [`Authorization`].
pub struct ContentGateway {
    store: Arc<dyn ContentStore>,
    chunk_size: usize,
    idle_timeout: Duration,
}

impl ContentGateway {
    pub fn new(store: Arc<dyn ContentStore>, chunk_size: usize, idle_timeout: Duration) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
            idle_timeout,
        }
    }

    /// List `area` of `owner`.
    pub async fn list(
        &self,
        authorization: Authorization,
        owner: &Address,
        area: &Area,
    ) -> GateResult<Vec<ContentDescriptor>> {
        check_scope(&authorization, owner, area)?;
        let items = self.store.list(owner, area).await?;
        debug!(
            visitor = %authorization.visitor(),
            owner = %owner,
            area = %area,
            count = items.len(),
            "Listed content"
        );
        Ok(items)
    }

    /// Open `file_name` in `area` of `owner` for streaming.
    pub async fn fetch(
        &self,
        authorization: Authorization,
        owner: &Address,
        area: &Area,
        file_name: &FileName,
    ) -> GateResult<ContentStream> {
        check_scope(&authorization, owner, area)?;
        let content = self.store.read(owner, area, file_name).await?;
        debug!(
            visitor = %authorization.visitor(),
            owner = %owner,
            area = %area,
            file = %file_name,
            length = ?content.length,
            "Opened content for streaming"
        );

        let file = file_name.to_string();
        let chunks = ReaderStream::with_capacity(content.reader, self.chunk_size)
            .timeout(self.idle_timeout)
            .map(move |item| match item {
                Ok(Ok(chunk)) => Ok(chunk),
                Ok(Err(e)) => {
                    warn!(file = %file, error = %e, "Read failed mid-stream");
                    Err(GateError::Transport {
                        message: format!("read failed: {}", e),
                    })
                }
                Err(_) => {
                    warn!(file = %file, "Stream stalled, aborting");
                    Err(GateError::Transport {
                        message: "idle timeout while streaming".to_string(),
                    })
                }
            });

        Ok(ContentStream {
            descriptor: content.descriptor,
            length: content.length,
            chunks: Box::pin(stop_after_error(chunks)),
        })
    }
}

fn check_scope(authorization: &Authorization, owner: &Address, area: &Area) -> GateResult<()> {
    if authorization.owner() == owner && authorization.area() == area {
        return Ok(());
    }
    Err(GateError::Content {
        kind: ContentErrorKind::ScopeMismatch {
            owner: owner.to_string(),
            area: area.to_string(),
        },
    })
}

fn stop_after_error<S>(chunks: S) -> impl Stream<Item = GateResult<Bytes>> + Send
where
    S: Stream<Item = GateResult<Bytes>> + Send + 'static,
{
    // The source is dropped with the first error, never polled again.
    stream::unfold(Some(Box::pin(chunks)), |state| async move {
        let mut chunks = state?;
        let item = chunks.next().await?;
        let rest = if item.is_ok() { Some(chunks) } else { None };
        Some((item, rest))
    })
}

//! Size-bounded materialization of object bodies.

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use imgflow_core::PipelineError;

use crate::traits::ByteStream;

/// Turns a chunked body into one contiguous buffer of at most `max_bytes`.
///
/// Reading stops at the first chunk that would push the total past the limit, so an
/// oversized object is never held in memory beyond `max_bytes` plus one chunk.
#[derive(Debug, Clone, Copy)]
pub struct StreamBuffer {
    max_bytes: u64,
}

impl StreamBuffer {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Read `stream` to completion.
    ///
    /// A failing stream yields `StorageRead`, never a truncated buffer.
    pub async fn materialize(&self, mut stream: ByteStream) -> Result<Bytes, PipelineError> {
        let mut buffer = BytesMut::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| PipelineError::StorageRead(e.to_string()))?;
            let total = buffer.len() as u64 + chunk.len() as u64;
            if total > self.max_bytes {
                tracing::warn!(
                    limit_bytes = self.max_bytes,
                    read_bytes = total,
                    "Object exceeds size limit, aborting read"
                );
                return Err(PipelineError::SizeExceeded {
                    limit: self.max_bytes,
                });
            }
            buffer.extend_from_slice(&chunk);
        }

        Ok(buffer.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn stream_of(chunks: Vec<Result<&'static [u8], StorageError>>) -> ByteStream {
        Box::pin(futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| c.map(Bytes::from_static))
                .collect::<Vec<_>>(),
        ))
    }

    #[tokio::test]
    async fn test_materialize_concatenates_chunks() {
        let buffer = StreamBuffer::new(16)
            .materialize(stream_of(vec![Ok(b"abc"), Ok(b"def")]))
            .await
            .unwrap();
        assert_eq!(&buffer[..], b"abcdef");
    }

    #[tokio::test]
    async fn test_exact_limit_is_allowed() {
        let buffer = StreamBuffer::new(6)
            .materialize(stream_of(vec![Ok(b"abc"), Ok(b"def")]))
            .await
            .unwrap();
        assert_eq!(buffer.len(), 6);
    }

    #[tokio::test]
    async fn test_aborts_as_soon_as_limit_exceeded() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = pulled.clone();
        let stream: ByteStream = Box::pin(
            futures::stream::iter(vec![b"abcd", b"efgh", b"ijkl", b"mnop"]).map(move |c| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, StorageError>(Bytes::from_static(c))
            }),
        );

        let err = StreamBuffer::new(6).materialize(stream).await.unwrap_err();
        assert_eq!(err, PipelineError::SizeExceeded { limit: 6 });
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stream_error_is_storage_read() {
        let err = StreamBuffer::new(64)
            .materialize(stream_of(vec![
                Ok(b"abc"),
                Err(StorageError::DownloadFailed("connection reset".to_string())),
            ]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "StorageReadError");
        assert!(err.to_string().contains("connection reset"));
    }
}

//! Streaming serialization with bounded memory and cancellation.

use async_trait::async_trait;
use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::record::FocusCostRecord;
use super::serializer::{SerializeError, Serializer};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const MAX_POOLED_BUFFER_CAPACITY: usize = 64 * 1024;

/// A lazy, finite source of records. The stream serializer pulls one record
/// at a time so the producer can feed it from another task concurrently.
#[async_trait]
pub trait RecordSource: Send {
    async fn next(&mut self) -> Option<FocusCostRecord>;
}

/// Adapts an in-memory `Vec` into a [`RecordSource`], for [`serialize_batch`]
/// and [`serialize_slice`].
pub struct VecSource {
    records: std::vec::IntoIter<FocusCostRecord>,
}

impl VecSource {
    pub fn new(records: Vec<FocusCostRecord>) -> Self {
        Self { records: records.into_iter() }
    }
}

#[async_trait]
impl RecordSource for VecSource {
    async fn next(&mut self) -> Option<FocusCostRecord> {
        self.records.next()
    }
}

#[derive(Debug, Error)]
pub enum StreamErrorKind {
    #[error("serialization failed: {0}")]
    Serialize(#[from] SerializeError),
    #[error("record is {size} bytes, exceeding the {limit}-byte limit")]
    RecordTooLarge { size: usize, limit: usize },
    #[error("write failed: {0}")]
    Write(String),
}

/// A single record's failure within a stream; processing continues past it
/// (per-record failures are accounted, not fatal).
#[derive(Debug, Error)]
#[error("record {index}: {kind}")]
pub struct StreamError {
    pub index: usize,
    pub kind: StreamErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStopReason {
    MaxRecordsExceeded,
    Cancelled,
}

#[derive(Debug, Default)]
pub struct StreamResult {
    pub records_written: usize,
    pub errors: Vec<StreamError>,
    pub corrupted_on_cancel: bool,
    pub stopped_early: Option<StreamStopReason>,
}

/// Consumes `source` and writes a JSON array to `writer`. Only a failure to
/// write the opening/closing bracket is returned as an error; per-record
/// failures land in [`StreamResult::errors`] and processing continues.
pub async fn serialize_stream<S, W>(
    serializer: &Serializer,
    cancellation: &CancellationToken,
    mut source: S,
    mut writer: W,
) -> std::io::Result<StreamResult>
where
    S: RecordSource,
    W: AsyncWrite + Unpin,
{
    let mut result = StreamResult::default();
    let limits = serializer.options().stream_limits;
    let mut buf = BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY);
    let mut index = 0usize;

    writer.write_all(b"[\n").await?;

    loop {
        if cancellation.is_cancelled() {
            result.corrupted_on_cancel = result.records_written > 0;
            result.stopped_early = Some(StreamStopReason::Cancelled);
            break;
        }
        if let Some(max) = limits.max_records {
            if result.records_written >= max {
                result.stopped_early = Some(StreamStopReason::MaxRecordsExceeded);
                break;
            }
        }

        let record = tokio::select! {
            biased;
            _ = cancellation.cancelled() => {
                result.corrupted_on_cancel = result.records_written > 0;
                result.stopped_early = Some(StreamStopReason::Cancelled);
                break;
            }
            item = source.next() => item,
        };
        let Some(record) = record else { break };

        match serializer.serialize_record(Some(&record)) {
            Ok(doc) => {
                let rendered = serializer
                    .to_json_string(&doc)
                    .expect("a hand-built Value tree of finite numbers always serializes");
                if let Some(max_size) = limits.max_record_size {
                    if rendered.len() > max_size {
                        result.errors.push(StreamError {
                            index,
                            kind: StreamErrorKind::RecordTooLarge { size: rendered.len(), limit: max_size },
                        });
                        index += 1;
                        continue;
                    }
                }

                buf.clear();
                if result.records_written > 0 {
                    buf.extend_from_slice(b",\n");
                }
                buf.extend_from_slice(rendered.as_bytes());

                match writer.write_all(&buf).await {
                    Ok(()) => result.records_written += 1,
                    Err(e) => result.errors.push(StreamError { index, kind: StreamErrorKind::Write(e.to_string()) }),
                }

                if buf.capacity() > MAX_POOLED_BUFFER_CAPACITY {
                    buf = BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY);
                }
            }
            Err(e) => {
                result.errors.push(StreamError { index, kind: StreamErrorKind::Serialize(e) });
            }
        }
        index += 1;
    }

    writer.write_all(b"\n]").await?;
    writer.flush().await?;
    Ok(result)
}

/// Buffers the full output in memory.
pub async fn serialize_batch(
    serializer: &Serializer,
    cancellation: &CancellationToken,
    records: Vec<FocusCostRecord>,
) -> std::io::Result<(Vec<u8>, StreamResult)> {
    let mut out = Vec::new();
    let result = serialize_stream(serializer, cancellation, VecSource::new(records), &mut out).await?;
    Ok((out, result))
}

/// Bridges a slice of records into the streaming path.
pub async fn serialize_slice<W>(
    serializer: &Serializer,
    cancellation: &CancellationToken,
    records: &[FocusCostRecord],
    writer: W,
) -> std::io::Result<StreamResult>
where
    W: AsyncWrite + Unpin,
{
    serialize_stream(serializer, cancellation, VecSource::new(records.to_vec()), writer).await
}

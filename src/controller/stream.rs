use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::error::{AppError, ErrorEnvelope};
use crate::model::{HistoryWindow, MatchSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Fresh,
    Open { written: usize },
    Closed,
}

/// Incremental writer for `{"days": N, "matches": [...]}`.
///
/// Every chunk it returns can be concatenated with the earlier ones, and once a close method has
/// run the result is one well-formed JSON document. The error close differs from the success close
/// only by a trailing `"error"` field.
#[derive(Debug)]
pub struct MatchDocumentWriter {
    days: i64,
    state: WriterState,
}

impl MatchDocumentWriter {
    #[must_use]
    pub fn new(window: HistoryWindow) -> Self {
        Self {
            days: window.days(),
            state: WriterState::Fresh,
        }
    }

    /// Number of match entries written so far.
    #[must_use]
    pub fn written(&self) -> usize {
        match self.state {
            WriterState::Open { written } => written,
            WriterState::Fresh | WriterState::Closed => 0,
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state == WriterState::Closed
    }

    fn put_prefix(&mut self, buf: &mut BytesMut) {
        if self.state == WriterState::Fresh {
            buf.put_slice(format!("{{\"days\":{},\"matches\":[", self.days).as_bytes());
            self.state = WriterState::Open { written: 0 };
        }
    }

    pub fn open(&mut self) -> Bytes {
        let mut buf = BytesMut::new();
        self.put_prefix(&mut buf);
        buf.freeze()
    }

    /// Returns `None` for an empty batch or a closed document.
    ///
    /// # Errors
    ///
    /// Will return `Err` if a summary fails to serialize
    pub fn batch(&mut self, batch: &[MatchSummary]) -> Result<Option<Bytes>, AppError> {
        if batch.is_empty() || self.is_closed() {
            return Ok(None);
        }
        let mut buf = BytesMut::new();
        self.put_prefix(&mut buf);
        let mut written = self.written();
        for summary in batch {
            if written > 0 {
                buf.put_u8(b',');
            }
            buf.put_slice(&serde_json::to_vec(summary)?);
            written += 1;
        }
        self.state = WriterState::Open { written };
        Ok(Some(buf.freeze()))
    }

    pub fn close_ok(&mut self) -> Bytes {
        if self.is_closed() {
            return Bytes::new();
        }
        let mut buf = BytesMut::new();
        self.put_prefix(&mut buf);
        buf.put_slice(b"]}");
        self.state = WriterState::Closed;
        buf.freeze()
    }

    pub fn close_with_error(&mut self, err: &AppError) -> Bytes {
        if self.is_closed() {
            return Bytes::new();
        }
        let mut buf = BytesMut::new();
        self.put_prefix(&mut buf);
        buf.put_slice(b"],\"error\":");
        buf.put_slice(&error_object(err));
        buf.put_u8(b'}');
        self.state = WriterState::Closed;
        buf.freeze()
    }
}

fn error_object(err: &AppError) -> Vec<u8> {
    let body = err.body();
    serde_json::to_vec(&body).unwrap_or_else(|_| {
        format!("{{\"message\":\"internal error\",\"code\":{}}}", body.code).into_bytes()
    })
}

/// Whole-response error document, used when nothing was streamed yet.
#[must_use]
pub fn error_document(err: &AppError) -> Bytes {
    match serde_json::to_vec(&ErrorEnvelope::from(err)) {
        Ok(doc) => Bytes::from(doc),
        Err(_) => {
            let mut buf = BytesMut::new();
            buf.put_slice(b"{\"error\":");
            buf.put_slice(&error_object(err));
            buf.put_u8(b'}');
            buf.freeze()
        }
    }
}

/// Whole success document in one chunk, used when replaying a cached aggregate.
///
/// # Errors
///
/// Will return `Err` if a summary fails to serialize
pub fn render_document(window: HistoryWindow, matches: &[MatchSummary]) -> Result<Bytes, AppError> {
    let mut writer = MatchDocumentWriter::new(window);
    let mut buf = BytesMut::new();
    buf.put(writer.open());
    if let Some(chunk) = writer.batch(matches)? {
        buf.put(chunk);
    }
    buf.put(writer.close_ok());
    Ok(buf.freeze())
}

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("client disconnected")]
    ClientGone,
    #[error(transparent)]
    Encode(#[from] AppError),
}

/// Writes document chunks to the response body as soon as they are produced.
pub struct StreamingResponder {
    writer: MatchDocumentWriter,
    tx: mpsc::Sender<Bytes>,
}

impl StreamingResponder {
    /// Responder plus the receiving end the HTTP body drains.
    #[must_use]
    pub fn channel(window: HistoryWindow, buffer: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                writer: MatchDocumentWriter::new(window),
                tx,
            },
            rx,
        )
    }

    #[must_use]
    pub fn written(&self) -> usize {
        self.writer.written()
    }

    async fn send(&self, chunk: Bytes) -> Result<(), StreamError> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.tx.send(chunk).await.map_err(|_| StreamError::ClientGone)
    }

    /// # Errors
    ///
    /// Will return `Err` if the client went away
    pub async fn open(&mut self) -> Result<(), StreamError> {
        let chunk = self.writer.open();
        self.send(chunk).await
    }

    /// # Errors
    ///
    /// Will return `Err` if the client went away or a summary fails to serialize
    pub async fn write_batch(&mut self, batch: &[MatchSummary]) -> Result<(), StreamError> {
        match self.writer.batch(batch)? {
            Some(chunk) => self.send(chunk).await,
            None => Ok(()),
        }
    }

    /// # Errors
    ///
    /// Will return `Err` if the client went away
    pub async fn close_ok(mut self) -> Result<(), StreamError> {
        let chunk = self.writer.close_ok();
        self.send(chunk).await
    }

    /// # Errors
    ///
    /// Will return `Err` if the client went away
    pub async fn close_with_error(mut self, err: &AppError) -> Result<(), StreamError> {
        let chunk = self.writer.close_with_error(err);
        self.send(chunk).await
    }
}

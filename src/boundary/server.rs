//! Line-delimited JSON server
//!
//! Reads one request envelope per line, dispatches each on its own task and
//! writes one response envelope per line as results complete. Responses carry
//! the request id; their order follows completion, not arrival.

use super::dispatcher::Dispatcher;
use super::requests::{RequestEnvelope, ResponseEnvelope};
use crate::db::session::SessionSource;
use crate::error::RequestError;
use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Serve requests from `reader` until EOF, then drain in-flight work.
///
/// A line that is not valid UTF-8 gets an error response like any other
/// malformed line. In-flight requests and the writer are drained even when
/// reading fails.
///
/// # Errors
/// Returns I/O errors from reading requests or writing responses
pub async fn serve<S, R, W>(
    dispatcher: Arc<Dispatcher<S>>,
    mut reader: R,
    writer: W,
) -> io::Result<()>
where
    S: SessionSource + 'static,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let writer_task = tokio::spawn(write_responses(writer, rx));

    let mut in_flight = JoinSet::new();
    let mut buf = Vec::new();
    let mut received = 0usize;
    let read_result = loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break Ok(()),
            Ok(_) => {}
            Err(e) => break Err(e),
        }

        let line = match std::str::from_utf8(trim_line_end(&buf)) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => line.to_string(),
            Err(e) => {
                received += 1;
                let e = RequestError::MalformedRequest(format!("line is not valid UTF-8: {}", e));
                tracing::warn!(error = %e, "rejecting request line");
                let _ = tx.send(encode(&ResponseEnvelope::error(None, e.to_string())));
                continue;
            }
        };
        received += 1;
        let dispatcher = Arc::clone(&dispatcher);
        let tx = tx.clone();
        in_flight.spawn(async move {
            let response = handle_line(&dispatcher, &line).await;
            // The writer only goes away after a write error, reported below
            let _ = tx.send(encode(&response));
        });
    };
    match &read_result {
        Ok(()) => tracing::info!(requests = received, "input closed; draining"),
        Err(e) => tracing::error!(error = %e, requests = received, "read failed; draining"),
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "request task failed");
        }
    }
    drop(tx);

    let write_result = writer_task
        .await
        .map_err(|e| io::Error::other(e.to_string()))?;
    read_result.and(write_result)
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Handle a single request line
pub async fn handle_line<S: SessionSource>(dispatcher: &Dispatcher<S>, line: &str) -> ResponseEnvelope {
    let envelope = match RequestEnvelope::parse(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting request line");
            return ResponseEnvelope::error(None, e.to_string());
        }
    };

    tracing::debug!(operation = %envelope.operation, id = ?envelope.id, "request received");
    match dispatcher
        .dispatch_named(&envelope.operation, envelope.payload)
        .await
    {
        Ok(result) => ResponseEnvelope::result(envelope.id, result),
        Err(e) => ResponseEnvelope::error(envelope.id, e.to_string()),
    }
}

fn encode(response: &ResponseEnvelope) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        serde_json::json!({ "id": response.id, "error": format!("Failed to encode response: {}", e) })
            .to_string()
    })
}

async fn write_responses<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<String>) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut line) = rx.recv().await {
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    writer.shutdown().await
}

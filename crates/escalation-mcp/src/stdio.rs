use std::io;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::{info, warn};

use crate::protocol::{parse_request, JsonRpcResponse, PARSE_ERROR};
use crate::server::McpServer;

/// Largest framed body accepted; bigger frames are drained and answered with a parse error.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy)]
enum StdioFrame {
    LineDelimited,
    ContentLength,
}

pub async fn serve_stdio(server: Arc<McpServer>) -> io::Result<()> {
    info!("escalation mcp server on stdio");
    serve_stream(server, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Answers framed or line-delimited requests from `input` until it closes. Each response
/// uses the framing of the request it answers.
pub async fn serve_stream<R, W>(server: Arc<McpServer>, input: R, mut output: W) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(input);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }

        let trimmed = line.trim_end_matches(['\r', '\n']).trim_start();
        if trimmed.is_empty() {
            continue;
        }

        let (payload, frame) = if is_stdio_header_line(trimmed) {
            let content_length = match read_stdio_content_length(&mut reader, trimmed).await {
                Ok(v) => v,
                Err(err) => {
                    let response = JsonRpcResponse::error(
                        Value::Null,
                        PARSE_ERROR,
                        format!("invalid stdio frame: {err}"),
                    );
                    write_stdio_response(&mut output, &response, StdioFrame::LineDelimited)
                        .await?;
                    continue;
                }
            };

            if content_length > MAX_FRAME_BYTES {
                warn!(content_length, "oversized stdio frame dropped");
                let declared = u64::try_from(content_length).unwrap_or(u64::MAX);
                tokio::io::copy(&mut (&mut reader).take(declared), &mut tokio::io::sink()).await?;
                let message =
                    format!("frame of {content_length} bytes exceeds {MAX_FRAME_BYTES} bytes");
                let response = JsonRpcResponse::error(Value::Null, PARSE_ERROR, message);
                write_stdio_response(&mut output, &response, StdioFrame::ContentLength).await?;
                continue;
            }

            let mut body = vec![0_u8; content_length];
            if let Err(err) = reader.read_exact(&mut body).await {
                let response = JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("invalid stdio frame body: {err}"),
                );
                write_stdio_response(&mut output, &response, StdioFrame::ContentLength).await?;
                continue;
            }
            (body, StdioFrame::ContentLength)
        } else {
            (trimmed.as_bytes().to_vec(), StdioFrame::LineDelimited)
        };

        let response = match parse_request(&payload) {
            Ok(request) => Arc::clone(&server).handle_request_isolated(request).await,
            Err(response) => Some(response),
        };
        if let Some(response) = response {
            write_stdio_response(&mut output, &response, frame).await?;
        }
    }

    Ok(())
}

async fn write_stdio_response<W: AsyncWrite + Unpin>(
    output: &mut W,
    response: &JsonRpcResponse,
    frame: StdioFrame,
) -> io::Result<()> {
    let serialized = serde_json::to_vec(response)?;
    match frame {
        StdioFrame::LineDelimited => {
            output.write_all(&serialized).await?;
            output.write_all(b"\n").await?;
        }
        StdioFrame::ContentLength => {
            output
                .write_all(format!("Content-Length: {}\r\n\r\n", serialized.len()).as_bytes())
                .await?;
            output.write_all(&serialized).await?;
        }
    }
    output.flush().await
}

fn is_stdio_header_line(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.starts_with("content-length:") || lower.starts_with("content-type:")
}

async fn read_stdio_content_length<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    first_line: &str,
) -> io::Result<usize> {
    let mut content_length = parse_content_length(first_line);
    let mut header_line = String::new();
    loop {
        header_line.clear();
        if reader.read_line(&mut header_line).await? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "unexpected eof while reading frame headers",
            ));
        }
        let trimmed = header_line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some(v) = parse_content_length(trimmed) {
            content_length = Some(v);
        }
    }
    content_length
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing content-length header"))
}

fn parse_content_length(line: &str) -> Option<usize> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse::<usize>().ok()
}

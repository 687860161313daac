//! Line-delimited stdio transport.
//!
//! One JSON message per line in each direction. Requests are handled strictly
//! one at a time: a line is read, answered, flushed, and only then is the
//! next line read. The loop ends at end of input.

use crate::error::ServerError;
use crate::protocol::JsonRpcResponse;
use crate::server::SqlMcpServer;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, trace};

/// Serve requests from `reader`, writing responses to `writer`, until EOF.
///
/// Only I/O failures on the streams themselves end the loop early.
pub async fn serve<R, W>(server: &SqlMcpServer, mut reader: R, mut writer: W) -> Result<(), ServerError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    let mut handled = 0usize;

    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            info!("Input closed after {} request(s)", handled);
            break;
        }

        // Invalid UTF-8 turns into replacement characters and then fails JSON parsing.
        let line = String::from_utf8_lossy(&buf);
        trace!("Received: {}", line.trim_end());

        if let Some(response) = server.handle_line(&line).await {
            handled += 1;
            write_response(&mut writer, &response).await?;
        }
    }

    writer.flush().await?;
    Ok(())
}

/// Serve on the process's standard input and output.
pub async fn serve_stdio(server: &SqlMcpServer) -> Result<(), ServerError> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve(server, stdin, stdout).await
}

async fn write_response<W>(writer: &mut W, response: &JsonRpcResponse) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    let json = match serde_json::to_string(response) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            return Ok(());
        }
    };
    debug!("Sending response for id {:?}", response.id);
    trace!("Sending: {}", json);

    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

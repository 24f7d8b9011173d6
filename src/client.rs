//! Line-oriented chat client
//!
//! Forwards stdin lines to the server and prints every server line. Sending
//! the quit command (or closing stdin) ends the session; remaining server
//! lines are printed until the server closes the connection.

use std::io::ErrorKind;

use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::AppError;
use crate::message::{read_line, ClientMessage};

/// Connect to the configured server and relay stdin/stdout
pub async fn run(config: &ClientConfig) -> Result<(), AppError> {
    let addr = config.addr();
    let stream = TcpStream::connect(&addr).await?;
    println!("Connected to chat server {}", addr);

    relay(stream, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;

    println!("You left the chat.");
    Ok(())
}

/// Relay `input` lines to `stream` and `stream` lines to `output`
///
/// Returns once the input is exhausted or the quit command has been sent,
/// and the server has closed its side.
pub async fn relay<S, I, O>(stream: S, mut input: I, output: O) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin + Send + 'static,
{
    let (server_in, mut server_out) = tokio::io::split(stream);
    let printer = tokio::spawn(print_lines(BufReader::new(server_in), output));

    while let Some(line) = read_line(&mut input).await? {
        if let Err(e) = send_line(&mut server_out, &line).await {
            if is_server_gone(&e) {
                debug!("Server closed the connection: {}", e);
                break;
            }
            return Err(e.into());
        }

        if ClientMessage::parse(line) == ClientMessage::Quit {
            break;
        }
    }
    let _ = server_out.shutdown().await;

    match printer.await {
        Ok(Err(e)) => debug!("Server connection ended with error: {}", e),
        Err(e) => debug!("Printer task failed: {}", e),
        Ok(Ok(())) => {}
    }
    Ok(())
}

async fn send_line<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Write failures that just mean the server already hung up
fn is_server_gone(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
    )
}

async fn print_lines<R, O>(mut reader: R, mut output: O) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    while let Some(line) = read_line(&mut reader).await? {
        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    Ok(())
}

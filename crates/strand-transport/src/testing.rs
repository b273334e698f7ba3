//! Mock servers for transport tests.
//!
//! Hand-rolled on `tokio::net::TcpListener` so failure modes the real
//! backend can exhibit (abrupt close, mid-stream cut, 401 bursts) can be
//! simulated byte-for-byte.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

const SSE_HEADERS: &[u8] = b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";

/// Frame an SSE record for the given event JSON.
pub fn sse_record(event_json: &str) -> String {
    format!("data: {event_json}\n\n")
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn write_chunk(socket: &mut TcpStream, payload: &[u8]) {
    let _ = socket
        .write_all(format!("{:x}\r\n", payload.len()).as_bytes())
        .await;
    let _ = socket.write_all(payload).await;
    let _ = socket.write_all(b"\r\n").await;
    let _ = socket.flush().await;
}

async fn write_terminal_chunk(socket: &mut TcpStream) {
    let _ = socket.write_all(b"0\r\n\r\n").await;
    let _ = socket.flush().await;
}

/// Start a mock SSE server that streams `records` to every connection,
/// then closes cleanly. Returns the base URL and the accept-loop handle.
pub async fn start_sse_server(records: Vec<String>) -> std::io::Result<(String, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let records = records.clone();
            tokio::spawn(async move {
                let _ = read_request(&mut socket).await;
                let _ = socket.write_all(SSE_HEADERS).await;
                for record in &records {
                    write_chunk(&mut socket, record.as_bytes()).await;
                    tokio::time::sleep(tokio::time::Duration::from_millis(2)).await;
                }
                write_terminal_chunk(&mut socket).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    Ok((format!("http://{addr}"), handle))
}

/// Start a mock SSE server whose first `failures` connections are closed
/// before any response bytes. Later connections stream `records` cleanly.
/// The returned counter tracks total accepted connections.
pub async fn start_flaky_sse_server(
    failures: usize,
    records: Vec<String>,
) -> std::io::Result<(String, Arc<AtomicUsize>, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();
    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            let records = records.clone();
            tokio::spawn(async move {
                let _ = read_request(&mut socket).await;
                if attempt < failures {
                    // Drop the connection before the response line.
                    return;
                }
                let _ = socket.write_all(SSE_HEADERS).await;
                for record in &records {
                    write_chunk(&mut socket, record.as_bytes()).await;
                }
                write_terminal_chunk(&mut socket).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    Ok((format!("http://{addr}"), connections, handle))
}

/// Start a mock SSE server that streams `records` and then cuts the
/// connection without the terminal chunk, which surfaces as a mid-stream
/// error to the client. The counter tracks accepted connections.
pub async fn start_cutoff_sse_server(
    records: Vec<String>,
) -> std::io::Result<(String, Arc<AtomicUsize>, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();
    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let records = records.clone();
            tokio::spawn(async move {
                let _ = read_request(&mut socket).await;
                let _ = socket.write_all(SSE_HEADERS).await;
                for record in &records {
                    write_chunk(&mut socket, record.as_bytes()).await;
                }
                // No terminal chunk: abort so the client sees an error.
                drop(socket);
            });
        }
    });
    Ok((format!("http://{addr}"), connections, handle))
}

/// Start a mock JSON server that requires `Bearer <expected_token>`.
/// Unauthorized requests get a 401; authorized ones get `body` as JSON.
/// The counter tracks how many 401s were served.
pub async fn start_auth_server(
    expected_token: &str,
    body: &'static str,
) -> std::io::Result<(String, Arc<AtomicUsize>, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let expected = format!("Bearer {expected_token}");
    let rejections = Arc::new(AtomicUsize::new(0));
    let counter = rejections.clone();
    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let expected = expected.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                let request = read_request(&mut socket).await;
                let response = if request.contains(&expected) {
                    format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    )
                } else {
                    counter.fetch_add(1, Ordering::SeqCst);
                    "HTTP/1.1 401 Unauthorized\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                        .to_string()
                };
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    Ok((format!("http://{addr}"), rejections, handle))
}

/// Start a mock SSE server that sends headers and then stalls forever
/// without writing any event, for idle-watchdog tests.
pub async fn start_stalled_sse_server() -> std::io::Result<(String, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let _ = read_request(&mut socket).await;
                let _ = socket.write_all(SSE_HEADERS).await;
                let _ = socket.flush().await;
                // Hold the socket open without ever sending an event.
                tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
            });
        }
    });
    Ok((format!("http://{addr}"), handle))
}

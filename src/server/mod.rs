//! Single-threaded HTTP loop: one connection is read, routed and answered before the next.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};

use crate::session::SessionContext;

pub mod api;
pub mod routes;

const MAX_REQUEST_BYTES: usize = 1 << 20;

pub fn run_server(bind_addr: &str, mut session: SessionContext) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_addr)?;
    tracing::info!("makerspace dashboard listening on http://{bind_addr}");

    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                if let Err(err) = handle_connection(&mut stream, &mut session) {
                    tracing::warn!(%err, "request error");
                }
            }
            Err(err) => tracing::warn!(%err, "connection failed"),
        }
    }

    Ok(())
}

fn handle_connection(stream: &mut TcpStream, session: &mut SessionContext) -> std::io::Result<()> {
    let Some(raw) = read_request(stream)? else {
        return Ok(());
    };

    let request = String::from_utf8_lossy(&raw);
    let (head, body) = request
        .split_once("\r\n\r\n")
        .or_else(|| request.split_once("\n\n"))
        .unwrap_or((&request[..], ""));
    let request_line = head.lines().next().unwrap_or_default();
    let mut request_parts = request_line.split_whitespace();
    let method = request_parts.next().unwrap_or("GET");
    let path = request_parts.next().unwrap_or("/");

    tracing::debug!(method, path, "request");
    let response = routes::route_request(session, method, path, body).to_http_string();
    stream.write_all(response.as_bytes())?;
    stream.flush()?;
    Ok(())
}

/// Read headers, then as much body as `Content-Length` announces.
fn read_request(stream: &mut TcpStream) -> std::io::Result<Option<Vec<u8>>> {
    let mut data = Vec::new();
    let mut buffer = [0_u8; 16_384];
    loop {
        let bytes_read = stream.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..bytes_read]);
        if let Some(header_end) = find_header_end(&data) {
            let expected = header_end + content_length(&data[..header_end]);
            if data.len() >= expected {
                break;
            }
        }
        if data.len() > MAX_REQUEST_BYTES {
            break;
        }
    }
    Ok(if data.is_empty() { None } else { Some(data) })
}

fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn content_length(head: &[u8]) -> usize {
    String::from_utf8_lossy(head)
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

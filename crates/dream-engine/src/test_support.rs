use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

/// Single-request HTTP server on a loopback port.
pub struct TestServer {
    base: String,
    handle: thread::JoinHandle<Vec<u8>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Waits for the exchange and returns the raw request it received.
    pub fn request(self) -> anyhow::Result<String> {
        let raw = self
            .handle
            .join()
            .map_err(|_| anyhow::anyhow!("test server thread panicked"))?;
        Ok(String::from_utf8_lossy(&raw).to_string())
    }
}

pub fn serve_once(
    status: &'static str,
    content_type: &'static str,
    body: &'static str,
) -> anyhow::Result<TestServer> {
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    serve(head, vec![body.as_bytes().to_vec()])
}

/// Streams `chunks` as separate writes of an unsized body closed by EOF.
pub fn serve_stream(chunks: Vec<&'static [u8]>) -> anyhow::Result<TestServer> {
    let head = "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nConnection: close\r\n\r\n"
        .to_string();
    serve(head, chunks.into_iter().map(<[u8]>::to_vec).collect())
}

fn serve(head: String, chunks: Vec<Vec<u8>>) -> anyhow::Result<TestServer> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let base = format!("http://{}", listener.local_addr()?);
    let handle = thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return Vec::new();
        };
        let request = drain_request(&mut stream);
        let _ = stream.write_all(head.as_bytes());
        for chunk in chunks {
            let _ = stream.write_all(&chunk);
            let _ = stream.flush();
            thread::sleep(Duration::from_millis(20));
        }
        request
    });
    Ok(TestServer { base, handle })
}

/// Reads headers and a `Content-Length` body so closing the socket
/// afterwards does not reset the connection.
fn drain_request(stream: &mut impl Read) -> Vec<u8> {
    let mut received = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        if let Some(header_end) = find(&received, b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&received[..header_end]).to_ascii_lowercase();
            let body_len = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|raw| raw.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if received.len() >= header_end + 4 + body_len {
                return received;
            }
        }
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return received,
            Ok(read) => received.extend_from_slice(&buf[..read]),
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

//! Canned-response HTTP service standing in for a CasJobs deployment.
//!
//! Listens on a loopback port and hands every request to a test-supplied
//! router closure. Connections are closed after each response.
#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

/// A parsed incoming request.
pub struct Request {
    pub method: String,
    pub path: String,
    query: String,
    body: String,
}

impl Request {
    /// Last path segment: the CasJobs method name.
    pub fn endpoint(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("")
    }

    /// Decoded parameter from the query string or the form body.
    pub fn param(&self, name: &str) -> Option<String> {
        find_param(&self.query, name).or_else(|| find_param(&self.body, name))
    }
}

/// A canned response.
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    /// A `<string>` scalar payload, as quick jobs return.
    pub fn string_payload(text: &str) -> Self {
        Self {
            status: 200,
            body: format!(
                "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<string xmlns=\"http://Services.Cas.jhu.edu\">{text}</string>"
            ),
        }
    }

    /// The self-closing element ASMX emits for a quick job with no output.
    pub fn empty_payload() -> Self {
        Self {
            status: 200,
            body: "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<string xmlns=\"http://Services.Cas.jhu.edu\" />"
                .to_string(),
        }
    }

    /// A `<long>` scalar payload, as job submissions return.
    pub fn long_payload(value: i64) -> Self {
        Self {
            status: 200,
            body: format!(
                "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<long xmlns=\"http://Services.Cas.jhu.edu\">{value}</long>"
            ),
        }
    }

    /// A non-XML body (extract-job downloads, the fast path).
    pub fn text(body: &str) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
        }
    }

    /// A service fault.
    pub fn fault(status: u16, message: &str) -> Self {
        Self {
            status,
            body: format!("<html><body>System.Exception: {message}</body></html>"),
        }
    }
}

/// The listener. Dropping it leaves the detached accept thread parked until
/// the test process exits, which is fine for test lifetimes.
pub struct MockService {
    url: String,
}

impl MockService {
    /// Start a service whose behavior is `router`.
    pub fn start<F>(router: F) -> Self
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
        let url = format!("http://{}", listener.local_addr().expect("local addr"));
        let router = Arc::new(router);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let router = Arc::clone(&router);
                thread::spawn(move || serve(stream, &*router));
            }
        });
        Self { url }
    }

    /// Base URL of the service, e.g. `http://127.0.0.1:PORT`.
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn serve(stream: TcpStream, router: &(dyn Fn(&Request) -> Response + Send + Sync)) {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let target = parts.next().unwrap_or("");
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (target.to_string(), String::new()),
    };

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).is_err() || line.trim_end().is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 && reader.read_exact(&mut body).is_err() {
        return;
    }
    let request = Request {
        method,
        path,
        query,
        body: String::from_utf8_lossy(&body).into_owned(),
    };

    let response = router(&request);
    let reply = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/xml; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        if response.status < 400 { "OK" } else { "Error" },
        response.body.len(),
        response.body
    );
    let mut stream = reader.into_inner();
    let _ = stream.write_all(reply.as_bytes());
    let _ = stream.flush();
}

fn find_param(encoded: &str, name: &str) -> Option<String> {
    encoded.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (decode(key) == name).then(|| decode(value))
    })
}

fn decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match u8::from_str_radix(&s[i + 1..i + 3], 16) {
                    Ok(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    Err(_) => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

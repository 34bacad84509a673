//! Minimal blocking HTTP/1.1 over any Read + Write stream
//!
//! Limits:
//! - One request per connection, no keep-alive
//! - No chunked transfer encoding
//! - Bodies need Content-Length
//! - Header cap 32 KiB, body cap 1 MiB (enforced with `Read::take`)

use std::io::{Read, Write};

const MAX_HEADER_SIZE: usize = 32 * 1024;

/// Largest accepted request body (1 MiB)
pub const MAX_BODY_SIZE: usize = 1_048_576;

/// Parsed request, independent of the socket it came from
#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    /// Path without the query string
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json(status: u16, value: &impl serde::Serialize) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: serde_json::to_vec(value).unwrap_or_default(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// A request that could not be read; answered with `status`
#[derive(Debug, PartialEq, Eq)]
pub struct RequestError {
    pub status: u16,
    pub message: String,
}

impl RequestError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: 400,
            message: message.into(),
        }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        411 => "Length Required",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Read the header section up to and including the blank line
///
/// `Ok(None)` means the peer closed before sending anything.
fn read_head(stream: &mut impl Read) -> Result<Option<Vec<u8>>, RequestError> {
    let mut head = Vec::with_capacity(1024);
    let mut byte = [0u8; 1];

    loop {
        match stream.read(&mut byte) {
            Ok(0) if head.is_empty() => return Ok(None),
            Ok(0) => return Err(RequestError::bad_request("connection closed mid-request")),
            Ok(_) => {
                head.push(byte[0]);
                if head.len() > MAX_HEADER_SIZE {
                    return Err(RequestError {
                        status: 413,
                        message: "headers too large".to_string(),
                    });
                }
                if head.ends_with(b"\r\n\r\n") {
                    return Ok(Some(head));
                }
            }
            Err(_) if head.is_empty() => return Ok(None),
            Err(e) => return Err(RequestError::bad_request(format!("read error: {}", e))),
        }
    }
}

/// Read and parse one request
pub fn read_request(stream: &mut impl Read) -> Result<Option<HttpRequest>, RequestError> {
    let Some(head) = read_head(stream)? else {
        return Ok(None);
    };

    let mut parsed_headers = [httparse::EMPTY_HEADER; 64];
    let mut req = httparse::Request::new(&mut parsed_headers);
    match req.parse(&head) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => {
            return Err(RequestError::bad_request("incomplete HTTP request"))
        }
        Err(e) => return Err(RequestError::bad_request(format!("HTTP parse error: {}", e))),
    }

    let method = req.method.unwrap_or("").to_string();
    let target = req.path.unwrap_or("/");
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (target.to_string(), None),
    };

    let headers: Vec<(String, String)> = req
        .headers
        .iter()
        .map(|h| {
            (
                h.name.to_string(),
                String::from_utf8_lossy(h.value).trim().to_string(),
            )
        })
        .collect();

    let mut request = HttpRequest {
        method,
        path,
        query,
        headers,
        body: Vec::new(),
    };

    if request
        .header("Transfer-Encoding")
        .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
    {
        return Err(RequestError::bad_request(
            "chunked transfer encoding not supported",
        ));
    }

    if matches!(request.method.as_str(), "POST" | "PUT" | "PATCH") {
        let length = match request.header("Content-Length") {
            Some(value) => value
                .parse::<usize>()
                .map_err(|_| RequestError::bad_request("invalid Content-Length"))?,
            None => {
                return Err(RequestError {
                    status: 411,
                    message: "request body requires Content-Length".to_string(),
                })
            }
        };
        if length > MAX_BODY_SIZE {
            return Err(RequestError {
                status: 413,
                message: "request body too large".to_string(),
            });
        }

        // Content-Length is not trusted for the cap
        let mut body = Vec::with_capacity(length);
        stream
            .take(length as u64)
            .read_to_end(&mut body)
            .map_err(|e| RequestError::bad_request(format!("read error: {}", e)))?;
        if body.len() < length {
            return Err(RequestError::bad_request("request body shorter than Content-Length"));
        }
        request.body = body;
    }

    Ok(Some(request))
}

/// Write a response; write errors mean the client left and are ignored
pub fn write_response(stream: &mut impl Write, response: &HttpResponse) {
    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        response.status,
        reason(response.status),
        response.body.len()
    );
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");

    let _ = stream.write_all(head.as_bytes());
    if !response.body.is_empty() {
        let _ = stream.write_all(&response.body);
    }
    let _ = stream.flush();
}

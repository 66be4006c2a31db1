/// Minimal HTTP/1.1 front end for the API.
///
/// One thread per connection, one request per connection
/// (`Connection: close`). Requests are parsed just far enough to get the
/// method, path and body; everything else is `api::route`'s job.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use crate::api::{self, ApiResponse, App};
use crate::logging::{self, Subsystem};

/// Request bodies larger than this are rejected.
pub const MAX_BODY_BYTES: usize = 64 * 1024;
/// Longest accepted request or header line, terminator included.
pub const MAX_LINE_BYTES: usize = 8 * 1024;
const MAX_HEADER_LINES: usize = 100;
const READ_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Request parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

#[derive(Debug)]
pub enum HttpError {
    Io(io::Error),
    Malformed(String),
    BodyTooLarge(usize),
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpError::Io(e) => write!(f, "I/O error: {}", e),
            HttpError::Malformed(msg) => write!(f, "Malformed request: {}", msg),
            HttpError::BodyTooLarge(len) => {
                write!(f, "Request body of {} bytes exceeds {} bytes", len, MAX_BODY_BYTES)
            }
        }
    }
}

impl std::error::Error for HttpError {}

impl From<io::Error> for HttpError {
    fn from(err: io::Error) -> Self {
        HttpError::Io(err)
    }
}

/// Reads one line of at most `MAX_LINE_BYTES`. An empty string means EOF.
fn read_capped_line<R: BufRead>(reader: &mut R) -> Result<String, HttpError> {
    let mut line = String::new();
    match reader.by_ref().take(MAX_LINE_BYTES as u64).read_line(&mut line) {
        Ok(n) if n == MAX_LINE_BYTES && !line.ends_with('\n') => Err(HttpError::Malformed(format!(
            "line exceeds {} bytes",
            MAX_LINE_BYTES
        ))),
        Ok(_) => Ok(line),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            Err(HttpError::Malformed("request head is not valid UTF-8".to_string()))
        }
        Err(e) => Err(HttpError::Io(e)),
    }
}

pub fn read_request<R: BufRead>(reader: &mut R) -> Result<Request, HttpError> {
    let request_line = read_capped_line(reader)?;
    if request_line.is_empty() {
        return Err(HttpError::Malformed("connection closed before request line".to_string()));
    }

    let mut parts = request_line.split_whitespace();
    let (method, path) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(p), Some(v)) if v.starts_with("HTTP/") => (m.to_string(), p.to_string()),
        _ => return Err(HttpError::Malformed(format!("bad request line '{}'", request_line.trim()))),
    };

    let mut content_length = 0usize;
    let mut header_lines = 0;
    loop {
        let line = read_capped_line(reader)?;
        if line.is_empty() {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        header_lines += 1;
        if header_lines > MAX_HEADER_LINES {
            return Err(HttpError::Malformed("too many headers".to_string()));
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value
                    .trim()
                    .parse()
                    .map_err(|_| HttpError::Malformed(format!("bad Content-Length '{}'", value.trim())))?;
            }
        }
    }

    if content_length > MAX_BODY_BYTES {
        return Err(HttpError::BodyTooLarge(content_length));
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;

    Ok(Request { method, path, body })
}

// ---------------------------------------------------------------------------
// Response writing
// ---------------------------------------------------------------------------

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        _ => "Internal Server Error",
    }
}

pub fn write_response<W: Write>(writer: &mut W, response: &ApiResponse) -> io::Result<()> {
    let body = response.body.to_string();
    write!(
        writer,
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        reason_phrase(response.status),
        body.len(),
        body
    )?;
    writer.flush()
}

fn error_response(err: &HttpError) -> ApiResponse {
    let status = match err {
        HttpError::BodyTooLarge(_) => 413,
        _ => 400,
    };
    ApiResponse {
        status,
        body: serde_json::json!({ "status": "error", "message": err.to_string() }),
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

pub struct Server {
    listener: TcpListener,
}

impl Server {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        Ok(Self {
            listener: TcpListener::bind(addr)?,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, one handler thread each.
    pub fn serve(&self, app: App) -> io::Result<()> {
        logging::info(
            Subsystem::Api,
            None,
            &format!("Listening on http://{}", self.local_addr()?),
        );
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let app = app.clone();
                    thread::spawn(move || handle_connection(stream, &app));
                }
                Err(e) => logging::warn(Subsystem::Api, None, &format!("Accept failed: {}", e)),
            }
        }
        Ok(())
    }
}

fn handle_connection(stream: TcpStream, app: &App) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    if let Err(e) = serve_connection(stream, app) {
        logging::warn(Subsystem::Api, None, &format!("Connection from {} failed: {}", peer, e));
    }
}

fn serve_connection(stream: TcpStream, app: &App) -> io::Result<()> {
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);

    let response = match read_request(&mut reader) {
        Ok(request) => {
            logging::debug(
                Subsystem::Api,
                None,
                &format!("{} {}", request.method, request.path),
            );
            api::route(app, &request.method, &request.path, &request.body)
        }
        Err(HttpError::Io(e)) => return Err(e),
        Err(e) => error_response(&e),
    };
    write_response(&mut writer, &response)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_post_with_body() {
        let raw = b"POST /api/log HTTP/1.1\r\nHost: pi.local\r\nContent-Type: application/json\r\nContent-Length: 15\r\n\r\n{\"name\":\"Lab\"}\n";
        let request = read_request(&mut &raw[..]).expect("valid request");
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/api/log");
        assert_eq!(request.body, b"{\"name\":\"Lab\"}\n".to_vec());
    }

    #[test]
    fn test_parses_get_without_body() {
        let raw = b"GET /leaderboard HTTP/1.1\r\nHost: pi.local\r\n\r\n";
        let request = read_request(&mut &raw[..]).expect("valid request");
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/leaderboard");
        assert!(request.body.is_empty());
    }

    #[test]
    fn test_content_length_header_is_case_insensitive() {
        let raw = b"POST /api/log HTTP/1.1\r\ncontent-length: 2\r\n\r\n{}";
        let request = read_request(&mut &raw[..]).unwrap();
        assert_eq!(request.body, b"{}".to_vec());
    }

    #[test]
    fn test_rejects_garbage_request_line() {
        let raw = b"hello\r\n\r\n";
        assert!(matches!(read_request(&mut &raw[..]), Err(HttpError::Malformed(_))));
    }

    #[test]
    fn test_rejects_oversized_body() {
        let raw = format!("POST /api/log HTTP/1.1\r\nContent-Length: {}\r\n\r\n", MAX_BODY_BYTES + 1);
        assert!(matches!(
            read_request(&mut raw.as_bytes()),
            Err(HttpError::BodyTooLarge(_))
        ));
    }

    #[test]
    fn test_rejects_unterminated_overlong_header_line() {
        let mut raw = b"GET /leaderboard HTTP/1.1\r\nX-Filler: ".to_vec();
        raw.extend(std::iter::repeat_n(b'a', MAX_LINE_BYTES * 4));
        assert!(matches!(read_request(&mut &raw[..]), Err(HttpError::Malformed(_))));
    }

    #[test]
    fn test_line_at_the_limit_is_accepted() {
        let path = format!("/{}", "a".repeat(MAX_LINE_BYTES - "GET  HTTP/1.1\r\n".len() - 1));
        let raw = format!("GET {} HTTP/1.1\r\n\r\n", path);
        let request = read_request(&mut raw.as_bytes()).expect("line fits exactly");
        assert_eq!(request.path, path);
    }

    #[test]
    fn test_invalid_utf8_head_is_malformed_not_io() {
        let raw = b"GET /\xff\xfe HTTP/1.1\r\n\r\n";
        let err = read_request(&mut &raw[..]).unwrap_err();
        assert!(matches!(err, HttpError::Malformed(_)));
        assert_eq!(error_response(&err).status, 400);
    }

    #[test]
    fn test_truncated_body_is_io_error() {
        let raw = b"POST /api/log HTTP/1.1\r\nContent-Length: 10\r\n\r\n{}";
        assert!(matches!(read_request(&mut &raw[..]), Err(HttpError::Io(_))));
    }

    #[test]
    fn test_response_has_json_headers_and_length() {
        let mut out = Vec::new();
        let response = ApiResponse {
            status: 400,
            body: json!({"status": "error", "message": "Missing or invalid 'name'"}),
        };
        write_response(&mut out, &response).unwrap();
        let text = String::from_utf8(out).unwrap();

        let body = response.body.to_string();
        assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(text.contains("Content-Type: application/json\r\n"));
        assert!(text.contains(&format!("Content-Length: {}\r\n", body.len())));
        assert!(text.ends_with(&body));
    }
}

//! Incremental HTTP/1.1 request parser, grounded on the original
//! `HttpRequest::parse`/`ParseRequestLine_`/`ParseHeader_`/`ParseBody_`
//! state machine. Two behaviors are fixed relative to the original
//! (see DESIGN.md): body framing honors `Content-Length` instead of
//! "the next line is the body", and `%XY` percent-decoding produces the
//! actual decoded byte instead of the two hex digit characters.

use std::collections::HashMap;

use crate::auth::AuthBackend;
use crate::buffer::Buffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    fn parse(s: &str) -> Option<Method> {
        match s {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    RequestLine,
    Headers,
    Body,
    Finish,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Parsing needs more bytes from the socket before it can continue.
    NeedMoreData,
    /// A full request was parsed and is ready for a response.
    Done,
    /// The request is malformed; respond with this status and close.
    BadRequest(u16),
}

/// Resource names that map to an on-disk `.html` file of the same name,
/// mirroring the original's `DEFAULT_HTML` set.
const DEFAULT_HTML: &[&str] = &["/index", "/register", "/login", "/welcome", "/video", "/picture"];

pub struct HttpRequest {
    pub state: ParseState,
    pub method: Option<Method>,
    pub url: String,
    pub version: String,
    pub headers: HashMap<String, String>,
    pub post: HashMap<String, String>,
    pub body: Vec<u8>,
    content_length: usize,
}

impl HttpRequest {
    pub fn new() -> Self {
        Self {
            state: ParseState::RequestLine,
            method: None,
            url: String::new(),
            version: String::new(),
            headers: HashMap::new(),
            post: HashMap::new(),
            body: Vec::new(),
            content_length: 0,
        }
    }

    /// Reset for the next pipelined request on the same connection.
    pub fn clear(&mut self) {
        self.state = ParseState::RequestLine;
        self.method = None;
        self.url.clear();
        self.version.clear();
        self.headers.clear();
        self.post.clear();
        self.body.clear();
        self.content_length = 0;
    }

    pub fn is_keep_alive(&self) -> bool {
        if self.version != "1.1" {
            return false;
        }
        self.headers
            .get("connection")
            .map(|v| v.eq_ignore_ascii_case("keep-alive"))
            .unwrap_or(false)
    }

    /// Drive the state machine as far as the bytes currently readable in
    /// `buf` allow, consuming what it understands. Resumable: call again
    /// once more bytes have been appended to `buf`.
    pub fn parse(&mut self, buf: &mut Buffer, auth: &dyn AuthBackend) -> ParseOutcome {
        loop {
            match self.state {
                ParseState::RequestLine => match self.take_line(buf) {
                    Some(line) => {
                        if !self.parse_request_line(&line) {
                            return ParseOutcome::BadRequest(400);
                        }
                        self.state = ParseState::Headers;
                    }
                    None => return ParseOutcome::NeedMoreData,
                },
                ParseState::Headers => match self.take_line(buf) {
                    Some(line) => {
                        if line.is_empty() {
                            self.content_length = self
                                .headers
                                .get("content-length")
                                .and_then(|v| v.parse().ok())
                                .unwrap_or(0);
                            self.state = if self.content_length > 0 {
                                ParseState::Body
                            } else {
                                ParseState::Finish
                            };
                        } else if !self.parse_header_line(&line) {
                            return ParseOutcome::BadRequest(400);
                        }
                    }
                    None => return ParseOutcome::NeedMoreData,
                },
                ParseState::Body => {
                    let remaining = self.content_length - self.body.len();
                    let available = buf.readable_bytes().min(remaining);
                    if available > 0 {
                        self.body.extend_from_slice(&buf.peek()[..available]);
                        buf.retrieve(available);
                    }
                    if self.body.len() >= self.content_length {
                        self.state = ParseState::Finish;
                    } else {
                        return ParseOutcome::NeedMoreData;
                    }
                }
                ParseState::Finish => {
                    self.parse_path();
                    if self.method == Some(Method::Post)
                        && self
                            .headers
                            .get("content-type")
                            .map(|v| v == "application/x-www-form-urlencoded")
                            .unwrap_or(false)
                    {
                        self.parse_form_urlencoded();
                        self.apply_auth(auth);
                    }
                    return ParseOutcome::Done;
                }
            }
        }
    }

    /// Pop the next CRLF-terminated line out of `buf`'s readable region,
    /// or `None` if no full line is available yet.
    fn take_line(&mut self, buf: &mut Buffer) -> Option<String> {
        let readable = buf.peek();
        let end = find_crlf(readable)?;
        let line = String::from_utf8_lossy(&readable[..end]).into_owned();
        buf.retrieve(end + 2);
        Some(line)
    }

    fn parse_request_line(&mut self, line: &str) -> bool {
        let mut parts = line.splitn(3, ' ');
        let (Some(method), Some(url), Some(version)) = (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        let Some(method) = Method::parse(method) else {
            return false;
        };
        let Some(version) = version.strip_prefix("HTTP/") else {
            return false;
        };
        self.method = Some(method);
        self.url = url.to_string();
        self.version = version.to_string();
        true
    }

    fn parse_header_line(&mut self, line: &str) -> bool {
        let Some((name, value)) = line.split_once(':') else {
            return false;
        };
        self.headers
            .insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        true
    }

    /// Rewrite bare resource names to their `.html` file, mirroring
    /// `ParsePath_`.
    fn parse_path(&mut self) {
        if self.url == "/" {
            self.url = "/index.html".to_string();
            return;
        }
        if DEFAULT_HTML.contains(&self.url.as_str()) {
            self.url.push_str(".html");
        }
    }

    fn parse_form_urlencoded(&mut self) {
        let body = String::from_utf8_lossy(&self.body).into_owned();
        for pair in body.split('&') {
            let Some((k, v)) = pair.split_once('=') else { continue };
            let key = percent_decode(k);
            let val = percent_decode(v);
            self.post.insert(key, val);
        }
    }

    /// Login/register handling, mirroring `ParsePost_`: on `/login.html`
    /// or `/register.html`, verify against the auth backend and rewrite
    /// the served path to the welcome or error page.
    fn apply_auth(&mut self, auth: &dyn AuthBackend) {
        let is_login = match self.url.as_str() {
            "/login.html" => true,
            "/register.html" => false,
            _ => return,
        };
        let username = self.post.get("username").cloned().unwrap_or_default();
        let password = self.post.get("password").cloned().unwrap_or_default();
        if auth.verify(&username, &password, is_login) {
            self.url = "/welcome.html".to_string();
        } else {
            self.url = "/error.html".to_string();
        }
    }
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan for the first `\r\n` at or after `haystack`'s start, same
/// hand-rolled byte scan style as the teacher's `find_crlf`.
fn find_crlf(haystack: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i + 1 < haystack.len() {
        if haystack[i] == b'\r' && haystack[i + 1] == b'\n' {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Decode `+` to space and `%XY` to the byte it encodes (the fixed
/// behavior; see module docs).
fn percent_decode(s: &str) -> String {
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
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    out.push(byte);
                    i += 3;
                } else {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::InMemoryAuthBackend;

    fn feed(req: &mut HttpRequest, buf: &mut Buffer, auth: &dyn AuthBackend, bytes: &[u8]) -> ParseOutcome {
        buf.append(bytes);
        req.parse(buf, auth)
    }

    #[test]
    fn parses_simple_get_request() {
        let auth = InMemoryAuthBackend::new();
        let mut req = HttpRequest::new();
        let mut buf = Buffer::new();
        let outcome = feed(
            &mut req,
            &mut buf,
            &auth,
            b"GET /page.html HTTP/1.1\r\nHost: example.com\r\n\r\n",
        );
        assert_eq!(outcome, ParseOutcome::Done);
        assert_eq!(req.method, Some(Method::Get));
        assert_eq!(req.url, "/page.html");
        assert_eq!(req.headers.get("host"), Some(&"example.com".to_string()));
    }

    #[test]
    fn root_path_rewrites_to_index() {
        let auth = InMemoryAuthBackend::new();
        let mut req = HttpRequest::new();
        let mut buf = Buffer::new();
        feed(&mut req, &mut buf, &auth, b"GET / HTTP/1.1\r\n\r\n");
        assert_eq!(req.url, "/index.html");
    }

    #[test]
    fn fragmented_request_resumes_across_calls() {
        let auth = InMemoryAuthBackend::new();
        let mut req = HttpRequest::new();
        let mut buf = Buffer::new();

        let outcome = feed(&mut req, &mut buf, &auth, b"GET /a HTTP/1.1\r\n");
        assert_eq!(outcome, ParseOutcome::NeedMoreData);
        assert_eq!(req.state, ParseState::Headers);

        let outcome = feed(&mut req, &mut buf, &auth, b"Host: x\r\n");
        assert_eq!(outcome, ParseOutcome::NeedMoreData);

        let outcome = feed(&mut req, &mut buf, &auth, b"\r\n");
        assert_eq!(outcome, ParseOutcome::Done);
    }

    #[test]
    fn body_waits_for_full_content_length() {
        let auth = InMemoryAuthBackend::new();
        let mut req = HttpRequest::new();
        let mut buf = Buffer::new();

        let head = b"POST /submit HTTP/1.1\r\ncontent-length: 10\r\n\r\n";
        let outcome = feed(&mut req, &mut buf, &auth, head);
        assert_eq!(outcome, ParseOutcome::NeedMoreData);
        assert_eq!(req.state, ParseState::Body);

        let outcome = feed(&mut req, &mut buf, &auth, b"12345");
        assert_eq!(outcome, ParseOutcome::NeedMoreData);

        let outcome = feed(&mut req, &mut buf, &auth, b"67890");
        assert_eq!(outcome, ParseOutcome::Done);
        assert_eq!(req.body, b"1234567890");
    }

    #[test]
    fn login_success_rewrites_to_welcome() {
        let auth = InMemoryAuthBackend::new();
        assert!(auth.verify("bob", "pw", false));

        let mut req = HttpRequest::new();
        let mut buf = Buffer::new();
        let body = b"username=bob&password=pw";
        let head = format!(
            "POST /login.html HTTP/1.1\r\ncontent-length: {}\r\ncontent-type: application/x-www-form-urlencoded\r\n\r\n",
            body.len()
        );
        feed(&mut req, &mut buf, &auth, head.as_bytes());
        let outcome = feed(&mut req, &mut buf, &auth, body);
        assert_eq!(outcome, ParseOutcome::Done);
        assert_eq!(req.url, "/welcome.html");
    }

    #[test]
    fn login_failure_rewrites_to_error() {
        let auth = InMemoryAuthBackend::new();
        let mut req = HttpRequest::new();
        let mut buf = Buffer::new();
        let body = b"username=ghost&password=nope";
        let head = format!(
            "POST /login.html HTTP/1.1\r\ncontent-length: {}\r\ncontent-type: application/x-www-form-urlencoded\r\n\r\n",
            body.len()
        );
        feed(&mut req, &mut buf, &auth, head.as_bytes());
        feed(&mut req, &mut buf, &auth, body);
        assert_eq!(req.url, "/error.html");
    }

    #[test]
    fn percent_decoding_produces_real_bytes() {
        let auth = InMemoryAuthBackend::new();
        let mut req = HttpRequest::new();
        let mut buf = Buffer::new();
        let body = b"username=a%40b&password=p%2Bq";
        let head = format!(
            "POST /other.html HTTP/1.1\r\ncontent-length: {}\r\ncontent-type: application/x-www-form-urlencoded\r\n\r\n",
            body.len()
        );
        feed(&mut req, &mut buf, &auth, head.as_bytes());
        feed(&mut req, &mut buf, &auth, body);
        assert_eq!(req.post.get("username"), Some(&"a@b".to_string()));
        assert_eq!(req.post.get("password"), Some(&"p+q".to_string()));
    }

    #[test]
    fn malformed_request_line_is_bad_request() {
        let auth = InMemoryAuthBackend::new();
        let mut req = HttpRequest::new();
        let mut buf = Buffer::new();
        let outcome = feed(&mut req, &mut buf, &auth, b"NOT A REQUEST\r\n\r\n");
        assert_eq!(outcome, ParseOutcome::BadRequest(400));
    }

    #[test]
    fn keep_alive_requires_http_1_1_and_header() {
        let auth = InMemoryAuthBackend::new();
        let mut req = HttpRequest::new();
        let mut buf = Buffer::new();
        feed(
            &mut req,
            &mut buf,
            &auth,
            b"GET / HTTP/1.1\r\nConnection: keep-alive\r\n\r\n",
        );
        assert!(req.is_keep_alive());
    }
}

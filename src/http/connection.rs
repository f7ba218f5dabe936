//! Per-connection driver, grounded on the original `HttpConn`
//! (`init`/`read`/`write`/`process`/`Close`, with a 2-element `iovec`
//! scatter/gather array). The vectored write here plays the role of
//! `iov_[2]`: header bytes in segment 0, the mmapped body in segment 1.

use std::io::{self, ErrorKind, IoSlice, Write};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mio::net::TcpStream;

use crate::auth::AuthBackend;
use crate::buffer::Buffer;
use crate::http::request::{HttpRequest, ParseOutcome};
use crate::http::response::HttpResponse;

/// Process-wide count of live connections, mirroring `HttpConn::userCount`.
pub static USER_COUNT: AtomicUsize = AtomicUsize::new(0);

pub enum ProcessOutcome {
    /// The request is incomplete; re-arm for read.
    NeedMoreData,
    /// A response is staged; re-arm for write.
    ReadyToWrite,
}

/// Outcome of draining the socket once, mirroring the original's
/// `ret <= 0 && errno != EAGAIN` hangup check.
pub enum ReadStatus {
    /// The kernel buffer is drained; the peer is still open.
    Drained,
    /// The peer closed its write side (`read` returned `0`).
    Hungup,
}

pub struct HttpConn {
    pub stream: TcpStream,
    pub addr: SocketAddr,
    read_buf: Buffer,
    write_header_buf: Buffer,
    request: HttpRequest,
    response: Option<HttpResponse>,
    body_offset: usize,
    closing: bool,
}

impl HttpConn {
    pub fn new(stream: TcpStream, addr: SocketAddr) -> Self {
        USER_COUNT.fetch_add(1, Ordering::SeqCst);
        Self {
            stream,
            addr,
            read_buf: Buffer::new(),
            write_header_buf: Buffer::new(),
            request: HttpRequest::new(),
            response: None,
            body_offset: 0,
            closing: false,
        }
    }

    pub fn is_keep_alive(&self) -> bool {
        self.request.is_keep_alive() && !self.closing
    }

    pub fn has_pending_bytes(&self) -> bool {
        !self.read_buf.is_empty()
    }

    /// Read everything currently available, ET-safe: loop until the
    /// kernel buffer is drained (`WouldBlock`) or the peer hangs up.
    pub fn read(&mut self) -> io::Result<ReadStatus> {
        loop {
            match self.read_buf.read_fd(&mut self.stream) {
                Ok(0) => return Ok(ReadStatus::Hungup),
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(ReadStatus::Drained),
                Err(e) => return Err(e),
            }
        }
    }

    /// Drive the parser; build the response once a full request is in.
    pub fn process(&mut self, src_dir: &str, auth: &dyn AuthBackend) -> ProcessOutcome {
        match self.request.parse(&mut self.read_buf, auth) {
            ParseOutcome::NeedMoreData => ProcessOutcome::NeedMoreData,
            ParseOutcome::Done => {
                let keep_alive = self.request.is_keep_alive();
                let response = HttpResponse::build(src_dir, &self.request.url, keep_alive);
                self.stage_response(response);
                ProcessOutcome::ReadyToWrite
            }
            ParseOutcome::BadRequest(code) => {
                let response = HttpResponse::build(src_dir, &bad_request_path(code), false);
                self.stage_response(response);
                self.closing = true;
                ProcessOutcome::ReadyToWrite
            }
        }
    }

    fn stage_response(&mut self, response: HttpResponse) {
        response.write_headers(&mut self.write_header_buf);
        self.body_offset = 0;
        self.response = Some(response);
    }

    /// One vectored write of the pending header bytes plus the mapped
    /// body, looping on short writes/`WouldBlock` until both segments
    /// drain or the socket blocks.
    pub fn write(&mut self) -> io::Result<bool> {
        loop {
            let header = self.write_header_buf.peek();
            let body = self
                .response
                .as_ref()
                .map(|r| &r.body_bytes()[self.body_offset..])
                .unwrap_or(&[]);

            if header.is_empty() && body.is_empty() {
                return Ok(true);
            }

            let slices = [IoSlice::new(header), IoSlice::new(body)];
            match self.stream.write_vectored(&slices) {
                Ok(0) => return Ok(false),
                Ok(mut n) => {
                    let header_len = header.len();
                    if n <= header_len {
                        self.write_header_buf.retrieve(n);
                    } else {
                        self.write_header_buf.retrieve(header_len);
                        n -= header_len;
                        self.body_offset += n;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
                Err(e) => return Err(e),
            }
        }
    }

    pub fn fully_written(&self) -> bool {
        self.write_header_buf.is_empty()
            && self
                .response
                .as_ref()
                .map(|r| self.body_offset >= r.content_length())
                .unwrap_or(true)
    }

    /// Reset per-request state for the next pipelined request on this
    /// connection, mirroring `OnProcess` re-entering after a drained
    /// keep-alive write.
    pub fn reset_for_next_request(&mut self) {
        self.request.clear();
        self.response = None;
        self.body_offset = 0;
    }

    pub fn should_close(&self) -> bool {
        self.closing || !self.is_keep_alive()
    }
}

fn bad_request_path(_code: u16) -> String {
    "/400.html".to_string()
}

impl Drop for HttpConn {
    fn drop(&mut self) {
        USER_COUNT.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Write `message` straight to `stream` and close, for the "server is at
/// capacity" path that never gets a full `HttpConn`.
pub fn send_busy(stream: &mut TcpStream, message: &str) {
    let _ = stream.write_all(message.as_bytes());
}

pub type SharedAuth = Arc<dyn AuthBackend>;

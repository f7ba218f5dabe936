//! Response builder, grounded on the original `HttpResponse`
//! (`Init`/`MakeResponse`/`ErrorHtml_`/`GetFileType_`) but mapping the
//! body through `memmap2` instead of the original's raw `mmap`/`munmap`
//! pair, and writing headers through this crate's `Buffer` the same way
//! the original writes into its own.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::buffer::Buffer;

fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        302 => "Found",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        _ => "Internal Server Error",
    }
}

/// Error codes remap to one of these files under `src_dir`, mirroring
/// the original's `CODE_PATH`.
fn error_page(code: u16) -> Option<&'static str> {
    match code {
        400 => Some("/400.html"),
        403 => Some("/403.html"),
        404 => Some("/404.html"),
        _ => None,
    }
}

fn mime_type(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        "avi" => "video/x-msvideo",
        "xml" => "application/xml",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

pub struct HttpResponse {
    pub code: u16,
    pub keep_alive: bool,
    path: String,
    mapped: Option<Mmap>,
    inline_body: Vec<u8>,
}

impl HttpResponse {
    /// Build a response for `path` under `src_dir`. Stats the file,
    /// remaps 400/403/404 to the configured error page, and mmaps
    /// whatever file ends up being served.
    pub fn build(src_dir: &str, path: &str, keep_alive: bool) -> Self {
        let mut resp = Self {
            code: 200,
            keep_alive,
            path: path.to_string(),
            mapped: None,
            inline_body: Vec::new(),
        };

        resp.code = resp.stat_code(src_dir, path);
        if let Some(err_path) = error_page(resp.code) {
            resp.path = err_path.to_string();
        }
        resp.map_file(src_dir);
        resp
    }

    fn stat_code(&self, src_dir: &str, path: &str) -> u16 {
        let full = Path::new(src_dir).join(path.trim_start_matches('/'));
        match std::fs::metadata(&full) {
            Ok(meta) if meta.is_dir() => 403,
            Ok(_) => 200,
            Err(_) => 404,
        }
    }

    fn map_file(&mut self, src_dir: &str) {
        let full = Path::new(src_dir).join(self.path.trim_start_matches('/'));
        match File::open(&full).and_then(|f| unsafe { Mmap::map(&f) }) {
            Ok(mmap) => self.mapped = Some(mmap),
            Err(_) => {
                self.inline_body = format!("{} {}", self.code, status_text(self.code)).into_bytes();
            }
        }
    }

    fn body(&self) -> &[u8] {
        match &self.mapped {
            Some(m) => m.as_ref(),
            None => &self.inline_body,
        }
    }

    pub fn content_length(&self) -> usize {
        self.body().len()
    }

    /// Write the status line and headers into `buf` (the connection's
    /// write buffer); the mapped body is written separately via
    /// vectored write, see `HttpConn::write`.
    pub fn write_headers(&self, buf: &mut Buffer) {
        let status_line = format!(
            "HTTP/1.1 {} {}\r\n",
            self.code,
            status_text(self.code)
        );
        buf.append(status_line.as_bytes());

        let connection = if self.keep_alive {
            "Connection: keep-alive\r\nKeep-Alive: max=6, timeout=120\r\n"
        } else {
            "Connection: close\r\n"
        };
        buf.append(connection.as_bytes());

        let headers = format!(
            "Content-Type: {}\r\nContent-Length: {}\r\n\r\n",
            mime_type(&self.path),
            self.content_length()
        );
        buf.append(headers.as_bytes());
    }

    /// The mapped (or inline) body bytes, for the vectored write.
    pub fn body_bytes(&self) -> &[u8] {
        self.body()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_site(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("webreactor_response_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn serves_existing_file_as_200() {
        let dir = make_site("ok");
        let mut f = File::create(dir.join("hello.html")).unwrap();
        write!(f, "<h1>hi</h1>").unwrap();

        let resp = HttpResponse::build(dir.to_str().unwrap(), "/hello.html", true);
        assert_eq!(resp.code, 200);
        assert_eq!(resp.body_bytes(), b"<h1>hi</h1>");
    }

    #[test]
    fn missing_file_is_404() {
        let dir = make_site("missing");
        File::create(dir.join("404.html")).unwrap();
        let resp = HttpResponse::build(dir.to_str().unwrap(), "/nope.html", true);
        assert_eq!(resp.code, 404);
    }

    #[test]
    fn directory_is_403() {
        let dir = make_site("dir403");
        File::create(dir.join("403.html")).unwrap();
        std::fs::create_dir_all(dir.join("secret")).unwrap();
        let resp = HttpResponse::build(dir.to_str().unwrap(), "/secret", true);
        assert_eq!(resp.code, 403);
    }

    #[test]
    fn mime_type_from_extension() {
        assert_eq!(mime_type("/a.css"), "text/css");
        assert_eq!(mime_type("/a.unknownext"), "application/octet-stream");
    }
}

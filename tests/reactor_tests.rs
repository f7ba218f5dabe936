//! End-to-end tests driving a real `Reactor` over a real TCP socket,
//! in the same style as the teacher's `tests/server_chunked.rs`.

use std::fs;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use webreactor::auth::InMemoryAuthBackend;
use webreactor::config::AppConfig;
use webreactor::reactor::Reactor;

fn site(name: &str) -> String {
    let dir = std::env::temp_dir().join(format!("webreactor_it_{name}"));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("index.html"), "Hello").unwrap();
    fs::write(dir.join("400.html"), "bad request").unwrap();
    fs::write(dir.join("403.html"), "forbidden").unwrap();
    fs::write(dir.join("404.html"), "not found").unwrap();
    fs::write(dir.join("welcome.html"), "welcome").unwrap();
    fs::write(dir.join("error.html"), "login failed").unwrap();
    dir.to_str().unwrap().to_string()
}

fn spawn_server(port: u16, src_dir: String) {
    thread::spawn(move || {
        let config = AppConfig {
            port,
            src_dir,
            thread_num: 2,
            timeout_ms: 0,
            ..AppConfig::default()
        };
        let auth = Arc::new(InMemoryAuthBackend::new());
        let reactor = Reactor::new(&config, auth).expect("reactor should build");
        reactor.run().expect("reactor should run");
    });
    thread::sleep(Duration::from_millis(200));
}

#[test]
fn serves_a_static_file() {
    let dir = site("static");
    spawn_server(18080, dir);

    let mut stream = TcpStream::connect("127.0.0.1:18080").unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    let text = String::from_utf8_lossy(&response);
    assert!(text.starts_with("HTTP/1.1 200 OK"));
    assert!(text.ends_with("Hello"));
}

#[test]
fn missing_file_returns_404() {
    let dir = site("missing");
    spawn_server(18081, dir);

    let mut stream = TcpStream::connect("127.0.0.1:18081").unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    stream
        .write_all(b"GET /nope.html HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    let text = String::from_utf8_lossy(&response);
    assert!(text.starts_with("HTTP/1.1 404 Not Found"));
}

#[test]
fn pipelined_keep_alive_requests_both_get_responses() {
    let dir = site("pipeline");
    spawn_server(18082, dir);

    let mut stream = TcpStream::connect("127.0.0.1:18082").unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    let two_requests = b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: keep-alive\r\n\r\n\
                          GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
    stream.write_all(two_requests).unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).unwrap();
    let text = String::from_utf8_lossy(&response);
    assert_eq!(text.matches("HTTP/1.1 200 OK").count(), 2);
}

#[test]
fn registration_then_duplicate_registration_fails() {
    let dir = site("auth");
    spawn_server(18083, dir);

    let body = "username=alice&password=hunter2";
    let request = format!(
        "POST /register.html HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\nConnection: keep-alive\r\n\r\n{}",
        body.len(),
        body
    );

    let mut stream = TcpStream::connect("127.0.0.1:18083").unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    stream.write_all(request.as_bytes()).unwrap();

    let mut buf = [0u8; 4096];
    let n = stream.read(&mut buf).unwrap();
    let first = String::from_utf8_lossy(&buf[..n]).into_owned();
    assert!(first.ends_with("welcome"));

    let close_request = request.replace("keep-alive", "close");
    let mut stream2 = TcpStream::connect("127.0.0.1:18083").unwrap();
    stream2.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    stream2.write_all(close_request.as_bytes()).unwrap();
    let mut second = Vec::new();
    stream2.read_to_end(&mut second).unwrap();
    let second_text = String::from_utf8_lossy(&second);
    assert!(second_text.ends_with("login failed"));
}

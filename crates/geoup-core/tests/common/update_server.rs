//! Minimal HTTP/1.1 stand-in for the database distribution service.
//!
//! Answers filename lookups and conditional update requests per edition.
//! Every response closes the connection.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Fixed `Last-Modified` sent with every database body.
pub const LAST_MODIFIED: &str = "Wed, 21 Oct 2015 07:28:00 GMT";
pub const LAST_MODIFIED_UNIX: u64 = 1_445_412_480;

#[derive(Debug, Clone)]
pub enum Edition {
    /// Plain body with its correct MD5.
    Serve(Vec<u8>),
    /// Gzip-compressed body; the MD5 header covers the uncompressed bytes.
    Gzip(Vec<u8>),
    /// Body whose MD5 header does not match.
    WrongMd5(Vec<u8>),
    /// 200 with the body but no `X-Database-MD5` header.
    NoMd5(Vec<u8>),
    /// Labelled gzip, but the bytes are not a gzip stream.
    BadGzip(Vec<u8>),
    /// Fixed status code for every update request.
    Status(u16),
    /// Close the first `n` update connections without answering, then serve.
    DropFirst(usize, Vec<u8>),
    /// Serve after a delay.
    Slow(Duration, Vec<u8>),
}

pub struct UpdateServer {
    pub base_url: String,
    update_requests: Arc<Mutex<HashMap<String, usize>>>,
    lookups: Arc<Mutex<usize>>,
}

impl UpdateServer {
    /// Update requests seen for `edition`, including 304 answers.
    pub fn update_requests(&self, edition: &str) -> usize {
        let map = self.update_requests.lock().unwrap();
        map.get(edition).copied().unwrap_or(0)
    }

    pub fn total_update_requests(&self) -> usize {
        self.update_requests.lock().unwrap().values().sum()
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }
}

pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Starts a server in a background thread. It runs until the process exits.
pub fn start(editions: Vec<(&str, Edition)>) -> UpdateServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let editions: Arc<HashMap<String, Edition>> = Arc::new(
        editions
            .into_iter()
            .map(|(name, e)| (name.to_string(), e))
            .collect(),
    );
    let update_requests = Arc::new(Mutex::new(HashMap::new()));
    let lookups = Arc::new(Mutex::new(0));

    let server = UpdateServer {
        base_url: format!("http://127.0.0.1:{}", port),
        update_requests: Arc::clone(&update_requests),
        lookups: Arc::clone(&lookups),
    };
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let editions = Arc::clone(&editions);
            let update_requests = Arc::clone(&update_requests);
            let lookups = Arc::clone(&lookups);
            thread::spawn(move || handle(stream, &editions, &update_requests, &lookups));
        }
    });
    server
}

fn handle(
    mut stream: TcpStream,
    editions: &HashMap<String, Edition>,
    update_requests: &Mutex<HashMap<String, usize>>,
    lookups: &Mutex<usize>,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some(request) = read_head(&mut stream) else {
        return;
    };
    let Some(target) = request_target(&request) else {
        return respond(&mut stream, "400 Bad Request", &[], b"");
    };
    if !request.to_ascii_lowercase().contains("\r\nauthorization: basic ") {
        return respond(&mut stream, "401 Unauthorized", &[], b"missing credentials");
    }
    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    if path == "/app/update_getfilename" {
        *lookups.lock().unwrap() += 1;
        let edition = query_value(query, "product_id").unwrap_or_default();
        return match editions.get(edition) {
            Some(_) => {
                let name = format!("{}.mmdb", edition);
                respond(&mut stream, "200 OK", &[], name.as_bytes())
            }
            None => respond(&mut stream, "404 Not Found", &[], b"No such product"),
        };
    }

    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let edition = match segments.as_slice() {
        ["geoip", "databases", edition, "update"] => *edition,
        _ => return respond(&mut stream, "404 Not Found", &[], b""),
    };
    let seen = {
        let mut map = update_requests.lock().unwrap();
        let n = map.entry(edition.to_string()).or_insert(0);
        *n += 1;
        *n
    };
    let local_md5 = query_value(query, "db_md5").unwrap_or_default();

    let Some(behaviour) = editions.get(edition) else {
        return respond(&mut stream, "404 Not Found", &[], b"No such product");
    };
    match behaviour {
        Edition::Serve(body) => serve(&mut stream, local_md5, body, &md5_hex(body), false),
        Edition::Gzip(body) => serve(&mut stream, local_md5, body, &md5_hex(body), true),
        Edition::WrongMd5(body) => serve(&mut stream, local_md5, body, &"f".repeat(32), false),
        Edition::NoMd5(body) => respond(
            &mut stream,
            "200 OK",
            &["Content-Type: application/octet-stream"],
            body,
        ),
        Edition::BadGzip(body) => {
            let md5_header = format!("X-Database-MD5: {}", md5_hex(body));
            respond(
                &mut stream,
                "200 OK",
                &[&md5_header, "Content-Type: application/gzip"],
                body,
            )
        }
        Edition::Status(code) => {
            let status = format!("{} Error", code);
            respond(&mut stream, &status, &[], b"server error")
        }
        Edition::DropFirst(n, body) => {
            if seen <= *n {
                return;
            }
            serve(&mut stream, local_md5, body, &md5_hex(body), false)
        }
        Edition::Slow(delay, body) => {
            thread::sleep(*delay);
            serve(&mut stream, local_md5, body, &md5_hex(body), false)
        }
    }
}

fn serve(stream: &mut TcpStream, local_md5: &str, body: &[u8], md5: &str, gzip: bool) {
    if local_md5.eq_ignore_ascii_case(&md5_hex(body)) {
        return respond(stream, "304 Not Modified", &[], b"");
    }
    let md5_header = format!("X-Database-MD5: {}", md5);
    let modified = format!("Last-Modified: {}", LAST_MODIFIED);
    if gzip {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(body).unwrap();
        let packed = enc.finish().unwrap();
        respond(
            stream,
            "200 OK",
            &[&md5_header, &modified, "Content-Type: application/gzip"],
            &packed,
        )
    } else {
        respond(
            stream,
            "200 OK",
            &[&md5_header, &modified, "Content-Type: application/octet-stream"],
            body,
        )
    }
}

fn respond(stream: &mut TcpStream, status: &str, headers: &[&str], body: &[u8]) {
    let mut head = format!("HTTP/1.1 {}\r\nConnection: close\r\n", status);
    if !status.starts_with("304") {
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    for h in headers {
        head.push_str(h);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn read_head(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 || buf.len() > 64 * 1024 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    String::from_utf8(buf).ok()
}

fn request_target(request: &str) -> Option<&str> {
    let line = request.lines().next()?;
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Some(target),
        _ => None,
    }
}

/// Values in these tests never need percent-decoding.
fn query_value<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

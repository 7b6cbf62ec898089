//! Loopback HTTP fixture for the integration tests. Nothing here touches the internet.

#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{
    NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts,
};
use hickory_resolver::proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_resolver::proto::rr::rdata::A;
use hickory_resolver::proto::rr::{RData, Record, RecordType};

use quickshield::core::scanner::ScannerSettings;

/// Canned response served for every request.
#[derive(Debug, Clone)]
pub struct Canned {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Answer HEAD with 405 so clients have to fall back to GET.
    pub reject_head: bool,
    /// Accept connections but never answer.
    pub hang: bool,
}

impl Canned {
    pub fn ok(body: &str) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
            reject_head: false,
            hang: false,
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn reject_head(mut self) -> Self {
        self.reject_head = true;
        self
    }

    pub fn hang(mut self) -> Self {
        self.hang = true;
        self
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    /// Request methods in arrival order.
    pub methods: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn methods(&self) -> Vec<String> {
        self.methods.lock().unwrap().clone()
    }
}

pub async fn serve(canned: Canned) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let methods = Arc::new(Mutex::new(Vec::new()));
    let seen = methods.clone();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let canned = canned.clone();
            let seen = seen.clone();
            tokio::spawn(async move {
                let _ = respond(stream, canned, seen).await;
            });
        }
    });

    TestServer { addr, methods }
}

async fn respond(
    mut stream: TcpStream,
    canned: Canned,
    seen: Arc<Mutex<Vec<String>>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let request = String::from_utf8_lossy(&buf);
    let method = request.split_whitespace().next().unwrap_or("").to_string();
    seen.lock().unwrap().push(method.clone());

    if canned.hang {
        tokio::time::sleep(Duration::from_secs(30)).await;
        return Ok(());
    }

    let (status, body) = if method == "HEAD" && canned.reject_head {
        (405, String::new())
    } else {
        (canned.status, canned.body.clone())
    };

    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        reason(status),
        body.len()
    );
    for (name, value) in &canned.headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");

    stream.write_all(head.as_bytes()).await?;
    if method != "HEAD" {
        stream.write_all(body.as_bytes()).await?;
    }
    stream.shutdown().await
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Client for calling the scanners directly; skips any proxy configured in the environment.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap()
}

/// An address nothing listens on; connecting is refused straight away.
pub fn refused_url() -> String {
    "http://127.0.0.1:1/".to_string()
}

/// Short timeouts so failure paths finish quickly.
pub fn fast_settings() -> ScannerSettings {
    ScannerSettings {
        http_timeout: Duration::from_secs(2),
        connect_timeout: Duration::from_secs(1),
        tls_timeout: Duration::from_secs(1),
        dns_timeout: Duration::from_secs(1),
        concurrency: 4,
        use_env_proxy: false,
        ..ScannerSettings::default()
    }
}

/// How the loopback DNS server answers every query.
#[derive(Debug, Clone)]
pub struct DnsAnswer {
    pub rcode: ResponseCode,
    /// Returned for A queries only; every other type gets an empty answer section.
    pub a: Vec<Ipv4Addr>,
}

impl DnsAnswer {
    pub fn rcode(rcode: ResponseCode) -> Self {
        Self { rcode, a: Vec::new() }
    }

    pub fn a_records(a: &[Ipv4Addr]) -> Self {
        Self {
            rcode: ResponseCode::NoError,
            a: a.to_vec(),
        }
    }
}

/// UDP DNS server on loopback answering with `answer`.
pub async fn serve_dns(answer: DnsAnswer) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        loop {
            let Ok((n, peer)) = socket.recv_from(&mut buf).await else {
                break;
            };
            let Ok(request) = Message::from_vec(&buf[..n]) else {
                continue;
            };
            if let Ok(bytes) = dns_reply(&request, &answer).to_vec() {
                let _ = socket.send_to(&bytes, peer).await;
            }
        }
    });
    addr
}

/// UDP socket that reads queries and never replies.
pub async fn silent_dns() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 512];
        while socket.recv_from(&mut buf).await.is_ok() {}
    });
    addr
}

fn dns_reply(request: &Message, answer: &DnsAnswer) -> Message {
    let mut reply = Message::new();
    reply
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(request.recursion_desired())
        .set_recursion_available(true)
        .set_response_code(answer.rcode);
    reply.add_queries(request.queries().to_vec());

    if answer.rcode == ResponseCode::NoError {
        for query in request.queries() {
            if query.query_type() == RecordType::A {
                for ip in &answer.a {
                    reply.add_answer(Record::from_rdata(query.name().clone(), 300, RData::A(A(*ip))));
                }
            }
        }
    }
    reply
}

/// Resolver that only talks to the given loopback server, over UDP.
pub fn loopback_resolver(addr: SocketAddr) -> TokioAsyncResolver {
    let group = NameServerConfigGroup::from(vec![NameServerConfig::new(addr, Protocol::Udp)]);
    let config = ResolverConfig::from_parts(None, vec![], group);
    let mut opts = ResolverOpts::default();
    opts.timeout = Duration::from_secs(1);
    opts.attempts = 1;
    opts.use_hosts_file = false;
    TokioAsyncResolver::tokio(config, opts)
}

/// Path of a file under `tests/fixtures`.
pub fn fixture(name: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// TLS server on loopback presenting `<stem>.crt` / `<stem>.key` from the fixtures. Every
/// connection is handshaken and closed; failed handshakes are skipped.
pub fn serve_tls(stem: &str) -> SocketAddr {
    let cert = std::fs::read(fixture(&format!("{stem}.crt"))).unwrap();
    let key = std::fs::read(fixture(&format!("{stem}.key"))).unwrap();
    let identity = native_tls::Identity::from_pkcs8(&cert, &key).unwrap();
    let acceptor = native_tls::TlsAcceptor::new(identity).unwrap();

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else {
                break;
            };
            if let Ok(mut tls) = acceptor.accept(stream) {
                let _ = tls.shutdown();
            }
        }
    });
    addr
}

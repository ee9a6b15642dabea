//! Integration tests for the content gateway.
//!
//! These tests start a real gateway on a loopback port and talk plain
//! HTTP/1.1 to it, signing challenges with an in-memory wallet.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;

use gated_content::client::{ChallengeClient, SignedChallenge, DEFAULT_SIGN_TIMEOUT};
use gated_content::config::Settings;
use gated_content::content::MemoryContentStore;
use gated_content::identity::{Address, ChainId};
use gated_content::server::GatewayServer;
use gated_content::validation::{validate_area, validate_file_name};
use gated_content::wallet::LocalKeyWallet;

const CHAIN_ID: u64 = 42;
const VISITOR_SEED: u64 = 7;
const OWNER_SEED: u64 = 8;

/// Test gateway instance.
struct TestGateway {
    addr: SocketAddr,
    owner: Address,
    temp_dir: TempDir,
    shutdown: Arc<Notify>,
}

/// A parsed HTTP response.
struct HttpReply {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl HttpReply {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("Response body is not JSON")
    }
}

impl TestGateway {
    /// Start a gateway serving one owner's "gallery" area.
    async fn start() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = format!(
            r#"
[server]
bind_address = "127.0.0.1:0"

[chain]
chain_id = {chain_id}

[security]
expose_denial_reasons = true

[content]
root = "{root}"

[logging]
level = "warn"

[audit]
enabled = true
log_path = "{audit}"
"#,
            chain_id = CHAIN_ID,
            root = temp_dir.path().join("content").display(),
            audit = temp_dir.path().join("audit.log").display(),
        );
        let settings = Settings::parse(&config).expect("Failed to parse test settings");

        let owner = LocalKeyWallet::address_of(&LocalKeyWallet::key_from_seed(OWNER_SEED));
        let gallery = validate_area("gallery").unwrap();
        let store = MemoryContentStore::new();
        store.insert(
            owner,
            gallery.clone(),
            &validate_file_name("hello.txt").unwrap(),
            &b"hello, visitor"[..],
        );
        store.insert(
            owner,
            gallery,
            &validate_file_name("cover image.png").unwrap(),
            vec![0x89u8, b'P', b'N', b'G'],
        );

        let server = GatewayServer::bind_with_store(Arc::new(settings), Arc::new(store))
            .await
            .expect("Failed to bind gateway");
        let addr = server.local_addr().expect("No local address");

        let shutdown = Arc::new(Notify::new());
        let shutdown_for_run = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if let Err(e) = server.run(shutdown_for_run).await {
                eprintln!("Gateway error: {}", e);
            }
        });

        Self {
            addr,
            owner,
            temp_dir,
            shutdown,
        }
    }

    /// A challenge client for the visitor wallet on `chain`.
    async fn client(&self, chain: u64) -> ChallengeClient {
        let wallet =
            LocalKeyWallet::new(LocalKeyWallet::key_from_seed(VISITOR_SEED), ChainId(chain));
        wallet.set_context(vec![self.owner]);
        ChallengeClient::connect(Arc::new(wallet), DEFAULT_SIGN_TIMEOUT).await
    }

    /// Send a GET and read the whole response.
    async fn get(&self, path: &str, headers: &[(&str, String)]) -> HttpReply {
        let mut stream = TcpStream::connect(self.addr)
            .await
            .expect("Failed to connect");

        let mut request = format!("GET {} HTTP/1.1\r\nHost: {}\r\n", path, self.addr);
        for (name, value) in headers {
            request.push_str(&format!("{}: {}\r\n", name, value));
        }
        request.push_str("Connection: close\r\n\r\n");
        stream
            .write_all(request.as_bytes())
            .await
            .expect("Failed to write request");

        let mut raw = Vec::new();
        tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut raw))
            .await
            .expect("Timed out reading response")
            .expect("Failed to read response");

        parse_reply(&raw)
    }

    /// Send a GET carrying a signed challenge.
    async fn get_signed(&self, path: &str, challenge: &SignedChallenge) -> HttpReply {
        let headers = challenge.headers.to_pairs();
        self.get(path, &headers).await
    }

    fn audit_lines(&self) -> Vec<Value> {
        std::fs::read_to_string(self.temp_dir.path().join("audit.log"))
            .unwrap_or_default()
            .lines()
            .map(|line| serde_json::from_str(line).expect("Audit line is not JSON"))
            .collect()
    }

    async fn stop(self) {
        self.shutdown.notify_waiters();
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

fn parse_reply(raw: &[u8]) -> HttpReply {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("No header terminator in response");
    let head = std::str::from_utf8(&raw[..split]).expect("Header block is not UTF-8");
    let mut lines = head.split("\r\n");

    let status = lines
        .next()
        .and_then(|line| line.split(' ').nth(1))
        .and_then(|code| code.parse().ok())
        .expect("Malformed status line");
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();

    HttpReply {
        status,
        headers,
        body: raw[split + 4..].to_vec(),
    }
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health() {
    let gateway = TestGateway::start().await;

    let reply = gateway.get("/health", &[]).await;
    assert_eq!(reply.status, 200);
    let body = reply.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["chain_id"], CHAIN_ID);

    gateway.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_route_is_not_found() {
    let gateway = TestGateway::start().await;

    let reply = gateway.get("/api/content/delete/x/y", &[]).await;
    assert_eq!(reply.status, 404);
    assert_eq!(reply.json()["error"]["code"], "NOT_FOUND");

    gateway.stop().await;
}

// ============================================================================
// Authorized access
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_with_valid_signature() {
    let gateway = TestGateway::start().await;
    let client = gateway.client(CHAIN_ID).await;

    let challenge = client.challenge("gallery").await.unwrap();
    let reply = gateway.get_signed(&challenge.list_path(), &challenge).await;

    assert_eq!(reply.status, 200);
    let items = reply.json();
    let names: Vec<&str> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["fileName"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["cover image.png", "hello.txt"]);
    assert_eq!(items[0]["mimeType"], "image/png");

    gateway.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fetch_streams_content() {
    let gateway = TestGateway::start().await;
    let client = gateway.client(CHAIN_ID).await;

    let challenge = client.challenge("gallery").await.unwrap();
    let file_name = validate_file_name("hello.txt").unwrap();
    let reply = gateway
        .get_signed(&challenge.fetch_path(&file_name), &challenge)
        .await;

    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("content-type"), Some("text/plain; charset=utf-8"));
    assert_eq!(reply.header("content-length"), Some("14"));
    assert_eq!(reply.body, b"hello, visitor");

    gateway.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fetch_percent_encoded_name() {
    let gateway = TestGateway::start().await;
    let client = gateway.client(CHAIN_ID).await;

    let challenge = client.challenge("gallery").await.unwrap();
    let file_name = validate_file_name("cover image.png").unwrap();
    let path = challenge.fetch_path(&file_name);
    assert!(path.ends_with("cover%20image.png"));

    let reply = gateway.get_signed(&path, &challenge).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, vec![0x89u8, b'P', b'N', b'G']);

    gateway.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_file_is_not_found() {
    let gateway = TestGateway::start().await;
    let client = gateway.client(CHAIN_ID).await;

    let challenge = client.challenge("gallery").await.unwrap();
    let file_name = validate_file_name("absent.txt").unwrap();
    let reply = gateway
        .get_signed(&challenge.fetch_path(&file_name), &challenge)
        .await;

    assert_eq!(reply.status, 404);
    assert_eq!(reply.json()["error"]["code"], "CONTENT_NOT_FOUND");

    gateway.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_area_lists_nothing() {
    let gateway = TestGateway::start().await;
    let client = gateway.client(CHAIN_ID).await;

    let challenge = client.challenge("archive").await.unwrap();
    let reply = gateway.get_signed(&challenge.list_path(), &challenge).await;

    assert_eq!(reply.status, 200);
    assert_eq!(reply.json(), serde_json::json!([]));

    gateway.stop().await;
}

// ============================================================================
// Denials
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_headers_require_auth() {
    let gateway = TestGateway::start().await;

    let path = format!("/api/content/list/{}/gallery", gateway.owner);
    let reply = gateway.get(&path, &[]).await;

    assert_eq!(reply.status, 401);
    assert_eq!(reply.json()["error"]["code"], "AUTH_REQUIRED");

    gateway.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_replayed_challenge_is_denied() {
    let gateway = TestGateway::start().await;
    let client = gateway.client(CHAIN_ID).await;

    let challenge = client.challenge("gallery").await.unwrap();
    let first = gateway.get_signed(&challenge.list_path(), &challenge).await;
    assert_eq!(first.status, 200);

    let second = gateway.get_signed(&challenge.list_path(), &challenge).await;
    assert_eq!(second.status, 403);
    let body = second.json();
    assert_eq!(body["error"]["code"], "ACCESS_DENIED");
    assert_eq!(body["error"]["details"]["reason"], "NONCE_REJECTED");

    gateway.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_wrong_chain_is_denied() {
    let gateway = TestGateway::start().await;
    let client = gateway.client(CHAIN_ID + 1).await;

    let challenge = client.challenge("gallery").await.unwrap();
    let reply = gateway.get_signed(&challenge.list_path(), &challenge).await;

    assert_eq!(reply.status, 403);
    assert_eq!(reply.json()["error"]["details"]["reason"], "CHAIN_MISMATCH");

    gateway.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_challenge_for_other_area_is_denied() {
    let gateway = TestGateway::start().await;
    let client = gateway.client(CHAIN_ID).await;

    // Signed for "archive", presented for "gallery".
    let challenge = client.challenge("archive").await.unwrap();
    let path = format!("/api/content/list/{}/gallery", gateway.owner);
    let reply = gateway.get_signed(&path, &challenge).await;

    assert_eq!(reply.status, 403);
    assert_eq!(reply.json()["error"]["details"]["reason"], "ADDRESS_MISMATCH");

    gateway.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_invalid_area_is_rejected() {
    let gateway = TestGateway::start().await;
    let client = gateway.client(CHAIN_ID).await;

    let challenge = client.challenge("gallery").await.unwrap();
    let path = format!("/api/content/list/{}/..", gateway.owner);
    let reply = gateway.get_signed(&path, &challenge).await;

    assert_eq!(reply.status, 400);
    assert_eq!(reply.json()["error"]["code"], "VALIDATION_ERROR");

    gateway.stop().await;
}

// ============================================================================
// Audit
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_requests_are_audited() {
    let gateway = TestGateway::start().await;
    let client = gateway.client(CHAIN_ID).await;

    let challenge = client.challenge("gallery").await.unwrap();
    gateway.get_signed(&challenge.list_path(), &challenge).await;
    gateway.get_signed(&challenge.list_path(), &challenge).await;

    let lines = gateway.audit_lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["operation"], "content.list");
    assert_eq!(lines[0]["result"]["status"], "success");
    assert_eq!(lines[1]["result"]["status"], "failure");
    assert_eq!(lines[1]["result"]["error_code"], "ACCESS_DENIED");
    assert_eq!(
        lines[0]["visitor"],
        challenge.headers.visitor.to_string()
    );

    gateway.stop().await;
}

use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;

static SERVER: OnceLock<TestServer> = OnceLock::new();
static USER_SEQ: AtomicU32 = AtomicU32::new(0);

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    #[allow(dead_code)]
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Spawn the already-built binary to keep start fast during tests
        // Assumes debug profile; adjust if you run tests with --release
        let mut cmd = Command::new("target/debug/opsdesk-api");
        cmd.env("OPSDESK_API_PORT", port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // Inherit environment so the server can see DATABASE_URL from .env
        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self {
            port,
            base_url,
            child,
        })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                // Ready on either healthy or degraded; degraded just means no DB
                if resp.status() == StatusCode::OK
                    || resp.status() == StatusCode::SERVICE_UNAVAILABLE
                {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!(
            "server did not become ready on {} within {:?}",
            self.base_url,
            timeout
        )
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// True when the server can reach its database. Database-backed tests skip
/// themselves when this is false so the suite still passes on a bare machine.
pub async fn db_ready(server: &TestServer) -> bool {
    let client = reqwest::Client::new();
    match client
        .get(format!("{}/health", server.base_url))
        .send()
        .await
    {
        Ok(resp) => resp.status() == StatusCode::OK,
        Err(_) => false,
    }
}

/// Register a fresh user and return (token, user json). Emails are unique
/// per process run.
#[allow(dead_code)]
pub async fn register_user(
    server: &TestServer,
    client: &reqwest::Client,
    name: &str,
) -> Result<(String, serde_json::Value)> {
    let seq = USER_SEQ.fetch_add(1, Ordering::Relaxed);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_nanos();
    let email = format!("{}+{}-{}@example.com", name, seq, nanos);

    let res = client
        .post(format!("{}/auth/register", server.base_url))
        .json(&serde_json::json!({
            "name": name,
            "email": email,
            "password": "correct-horse-battery",
        }))
        .send()
        .await?;

    anyhow::ensure!(
        res.status() == StatusCode::CREATED,
        "register failed: {}",
        res.status()
    );

    let body: serde_json::Value = res.json().await?;
    let token = body["data"]["token"]
        .as_str()
        .context("missing token")?
        .to_string();
    Ok((token, body["data"]["user"].clone()))
}

/// Create an organization owned by the token's user; returns the org json.
#[allow(dead_code)]
pub async fn create_org(
    server: &TestServer,
    client: &reqwest::Client,
    token: &str,
    name: &str,
) -> Result<serde_json::Value> {
    let res = client
        .post(format!("{}/api/orgs", server.base_url))
        .bearer_auth(token)
        .json(&serde_json::json!({ "name": name }))
        .send()
        .await?;

    anyhow::ensure!(
        res.status() == StatusCode::CREATED,
        "org create failed: {}",
        res.status()
    );

    let body: serde_json::Value = res.json().await?;
    Ok(body["data"].clone())
}

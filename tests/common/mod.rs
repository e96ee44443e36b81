use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::json;

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub const EXCLUDED_PREFIX: &str = "/public";

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

        // Memory store so the suite needs no database; a JWT key so auth and the gate are live
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_docstore-rest"));
        cmd.env("PORT", port.to_string())
            .env("APP_ENV", "development")
            .env("STORE", "memory")
            .env("BASE", "/")
            .env("READ_ONLY", "no")
            .env("JWT_KEY", "integration-secret")
            .env("AUTH_TOKEN", "")
            .env("EXCLUDE", EXCLUDED_PREFIX)
            .env("MAIL_RELAY_URL", "")
            .env("GOOGLE_CLIENT_ID", "")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/ping", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    // Use stable get_or_init and convert init errors into a panic with context.
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Collection or email suffix unique to one test run.
#[allow(dead_code)]
pub fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Registers a fresh user and returns its session token.
#[allow(dead_code)]
pub async fn session_token(server: &TestServer) -> Result<String> {
    let client = reqwest::Client::new();
    let email = format!("{}@example.com", unique("user"));
    let res = client
        .post(server.url("/auth/register"))
        .json(&json!({ "email": email, "password": "pw" }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "register failed: {}", res.status());
    let body = res.json::<serde_json::Value>().await?;
    body["token"]
        .as_str()
        .map(str::to_string)
        .context("register response has no token")
}

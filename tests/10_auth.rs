mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn ping_endpoint_responds() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/ping")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<serde_json::Value>().await?, json!({ "status": "OK" }));

    let res = client.get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::OK, "unexpected status: {}", res.status());
    Ok(())
}

#[tokio::test]
async fn data_routes_reject_missing_tokens() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/widgets")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body, json!({ "status": "failed", "message": "Auth failure" }));
    Ok(())
}

#[tokio::test]
async fn excluded_prefix_skips_the_gate() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();

    let res = client
        .get(server.url(&format!("{}/anything", common::EXCLUDED_PREFIX)))
        .send()
        .await?;
    assert_ne!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn register_login_session() -> Result<()> {
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let email = format!("{}@example.com", common::unique("login"));

    let res = client
        .post(server.url("/auth/register"))
        .json(&json!({ "email": email, "password": "pw", "name": "Login Test" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": email, "password": "wrong" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .post(server.url("/auth/login"))
        .json(&json!({ "email": email, "password": "pw" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = res.json::<serde_json::Value>().await?;
    let token = body["token"].as_str().unwrap_or_default().to_string();
    assert!(body["user"].get("password").is_none(), "password leaked: {}", body);

    let res = client.get(server.url("/auth/session")).bearer_auth(&token).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let user = res.json::<serde_json::Value>().await?;
    assert_eq!(user["email"], email.as_str());

    // Token in the query string works for data routes too
    let res = client.get(server.url(&format!("/widgets?token={}", token))).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

// These tests drive the query-string filter surface: operators, _id typing, sort and paging.

async fn seed(server: &common::TestServer, token: &str, coll: &str) -> Result<()> {
    let res = reqwest::Client::new()
        .post(server.url(&format!("/{}", coll)))
        .bearer_auth(token)
        .body(
            r#"[
                {"_id":1,"name":"ann","age":31,"owner_id":{"$oid":"5ec7cb151a1878fbefce4119"}},
                {"_id":2,"name":"bob","age":25,"owner_id":{"$oid":"5ec7cb151a1878fbefce4119"}},
                {"_id":3,"name":"cid","age":40},
                {"_id":4,"name":"dee","age":19,"tags":["x","y"]}
            ]"#,
        )
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "seed failed: {}", res.status());
    Ok(())
}

async fn ids(server: &common::TestServer, token: &str, path: &str) -> Result<Vec<i64>> {
    let res = reqwest::Client::new().get(server.url(path)).bearer_auth(token).send().await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "{} returned {}", path, res.status());
    let docs = res.json::<Vec<serde_json::Value>>().await?;
    Ok(docs.iter().filter_map(|d| d["_id"].as_i64()).collect())
}

#[tokio::test]
async fn operators_sort_and_paging() -> Result<()> {
    let server = common::ensure_server().await?;
    let token = common::session_token(server).await?;
    let coll = common::unique("people");
    seed(server, &token, &coll).await?;

    assert_eq!(ids(server, &token, &format!("/{}?age__gte=25&__sort=age", coll)).await?, vec![2, 1, 3]);
    assert_eq!(ids(server, &token, &format!("/{}?name__in=ann,dee", coll)).await?, vec![1, 4]);
    assert_eq!(ids(server, &token, &format!("/{}?tags=x", coll)).await?, vec![4]);
    assert_eq!(ids(server, &token, &format!("/{}?tags__exists=false&__sort=-_id", coll)).await?, vec![3, 2, 1]);
    assert_eq!(ids(server, &token, &format!("/{}?name__regex=^[ab]", coll)).await?, vec![1, 2]);
    assert_eq!(
        ids(server, &token, &format!("/{}?__sort=-age&__offset=1&__limit=2", coll)).await?,
        vec![1, 2]
    );
    Ok(())
}

#[tokio::test]
async fn id_suffixed_fields_match_object_ids() -> Result<()> {
    let server = common::ensure_server().await?;
    let token = common::session_token(server).await?;
    let coll = common::unique("owned");
    seed(server, &token, &coll).await?;

    let found = ids(server, &token, &format!("/{}?owner_id=5ec7cb151a1878fbefce4119", coll)).await?;
    assert_eq!(found, vec![1, 2]);
    Ok(())
}

#[tokio::test]
async fn raw_filter_overrides_params() -> Result<()> {
    let server = common::ensure_server().await?;
    let token = common::session_token(server).await?;
    let coll = common::unique("raw");
    seed(server, &token, &coll).await?;

    let client = reqwest::Client::new();
    let res = client
        .get(server.url(&format!("/{}", coll)))
        .query(&[("__filter", json!({ "$or": [{ "age": { "$lt": 20 } }, { "name": "cid" }] }).to_string())])
        .query(&[("name", "ann")])
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let docs = res.json::<Vec<serde_json::Value>>().await?;
    let found: Vec<i64> = docs.iter().filter_map(|d| d["_id"].as_i64()).collect();
    assert_eq!(found, vec![3, 4]);

    let res = client
        .get(server.url(&format!("/{}?__filter=%7Bbroken", coll)))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

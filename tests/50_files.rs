mod common;

use anyhow::Result;
use reqwest::{multipart, StatusCode};
use serde_json::{json, Value};

use common::TestServer;

async fn upload(server: &TestServer, token: &str, name: &str, bytes: &[u8]) -> Result<Value> {
    let form = multipart::Form::new().part("file", multipart::Part::bytes(bytes.to_vec()).file_name(name.to_string()));
    let res = server
        .client
        .post(server.url("/api/files"))
        .bearer_auth(token)
        .multipart(form)
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::CREATED, "upload failed: {}", res.status());
    let body: Value = res.json().await?;
    Ok(body["data"].clone())
}

#[tokio::test]
async fn private_files_need_sharing_before_copy() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;
    let (_, owner) = server.member(&admin, "ivy").await?;
    let (_, other) = server.member(&admin, "jon").await?;

    let file = upload(&server, &owner, "report.txt", b"quarterly numbers").await?;
    let id = file["id"].as_i64().unwrap_or_default();
    assert_eq!(file["is_shared"], false);
    assert_eq!(file["size"], 17);

    let res = server.client.get(server.url(&format!("/api/files/{}", id))).bearer_auth(&other).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let res = server
        .client
        .post(server.url(&format!("/api/files/{}/copy", id)))
        .bearer_auth(&other)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server
        .client
        .put(server.url(&format!("/api/files/{}/share", id)))
        .bearer_auth(&owner)
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["is_shared"], true);

    let res = server.client.get(server.url(&format!("/api/files/{}", id))).bearer_auth(&other).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.bytes().await?.as_ref(), b"quarterly numbers");

    let res = server
        .client
        .post(server.url(&format!("/api/files/{}/copy", id)))
        .bearer_auth(&other)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let copy: Value = res.json().await?;
    assert_ne!(copy["data"]["id"], id);
    assert_eq!(copy["data"]["is_shared"], false);
    assert_ne!(copy["data"]["filepath"], file["filepath"]);

    let res = server.client.get(server.url("/api/files?shared=true")).bearer_auth(&other).send().await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"].as_array().map(|a| a.len()), Some(1));
    Ok(())
}

#[tokio::test]
async fn rename_and_delete_are_owner_only() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;
    let (_, owner) = server.member(&admin, "kim").await?;
    let (_, other) = server.member(&admin, "lee").await?;

    let file = upload(&server, &owner, "draft.txt", b"v1").await?;
    let id = file["id"].as_i64().unwrap_or_default();

    let res = server
        .client
        .put(server.url(&format!("/api/files/{}/rename", id)))
        .bearer_auth(&owner)
        .json(&json!({ "filename": "  " }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .client
        .put(server.url(&format!("/api/files/{}/rename", id)))
        .bearer_auth(&owner)
        .json(&json!({ "filename": "final.txt" }))
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["filename"], "final.txt");

    let res = server.client.delete(server.url(&format!("/api/files/{}", id))).bearer_auth(&other).send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server.client.delete(server.url(&format!("/api/files/{}", id))).bearer_auth(&owner).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.client.get(server.url(&format!("/api/files/{}", id))).bearer_auth(&owner).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

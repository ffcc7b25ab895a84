mod common;

use anyhow::Result;
use reqwest::{multipart, StatusCode};
use serde_json::{json, Value};

use common::TestServer;

async fn seed_orders(server: &TestServer, rows: usize) -> Result<()> {
    server
        .execute("CREATE TABLE orders (id INTEGER PRIMARY KEY AUTOINCREMENT, item TEXT, qty INTEGER)")
        .await?;
    for i in 1..=rows {
        server
            .execute(&format!("INSERT INTO orders (item, qty) VALUES ('item-{}', {})", i, i))
            .await?;
    }
    Ok(())
}

async fn grant(server: &TestServer, admin: &str, body: Value) -> Result<reqwest::Response> {
    Ok(server
        .client
        .post(server.url("/api/data/admin/access"))
        .bearer_auth(admin)
        .json(&body)
        .send()
        .await?)
}

#[tokio::test]
async fn view_only_grant_reads_but_cannot_edit() -> Result<()> {
    let server = TestServer::spawn().await?;
    seed_orders(&server, 3).await?;
    let admin = server.admin_token().await?;
    let (member_id, member) = server.member(&admin, "erin").await?;

    // No grant yet
    let res = server
        .client
        .get(server.url("/api/data/tables/orders/data"))
        .bearer_auth(&member)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = grant(
        &server,
        &admin,
        json!({ "user_id": member_id, "table_name": "orders", "can_view": true, "can_edit": false }),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = server
        .client
        .get(server.url("/api/data/tables/orders/data"))
        .bearer_auth(&member)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["data"].as_array().map(|a| a.len()), Some(3));

    let res = server
        .client
        .post(server.url("/api/data/admin/tables/orders/rows"))
        .bearer_auth(&member)
        .json(&json!({ "item": "sneaky", "qty": 1 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Admins always pass the edit gate
    let res = server
        .client
        .post(server.url("/api/data/admin/tables/orders/rows"))
        .bearer_auth(&admin)
        .json(&json!({ "item": "widget", "qty": 7 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["id"], 4);
    Ok(())
}

#[tokio::test]
async fn first_page_count_is_exact_later_pages_estimate() -> Result<()> {
    let server = TestServer::spawn().await?;
    seed_orders(&server, 25).await?;
    let admin = server.admin_token().await?;

    let res = server
        .client
        .get(server.url("/api/data/tables/orders/data?page=1&per_page=10&search=item-1"))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let pagination = &body["data"]["pagination"];
    // item-1, item-10..item-19
    assert_eq!(pagination["filtered_total"], 11);
    assert_eq!(pagination["filtered_total_exact"], true);
    assert_eq!(pagination["real_total"], 25);

    let res = server
        .client
        .get(server.url("/api/data/tables/orders/data?page=3&per_page=10&sort_by=id&sort_order=desc"))
        .bearer_auth(&admin)
        .send()
        .await?;
    let body: Value = res.json().await?;
    let pagination = &body["data"]["pagination"];
    assert_eq!(pagination["filtered_total_exact"], false);
    assert_eq!(pagination["filtered_total"], 25);
    assert_eq!(body["data"]["data"][0]["id"], 5);

    let res = server
        .client
        .get(server.url("/api/data/tables/orders/data?columns=id,%20item&per_page=2"))
        .bearer_auth(&admin)
        .send()
        .await?;
    let body: Value = res.json().await?;
    let first = body["data"]["data"][0].as_object().cloned().unwrap_or_default();
    assert_eq!(first.len(), 2);
    assert!(first.contains_key("item") && !first.contains_key("qty"));

    let res = server
        .client
        .get(server.url("/api/data/tables/orders/data?sort_by=password"))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .client
        .get(server.url("/api/data/tables/missing/data"))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn batch_grant_reports_success_count() -> Result<()> {
    let server = TestServer::spawn().await?;
    seed_orders(&server, 1).await?;
    let admin = server.admin_token().await?;
    let (member_id, _) = server.member(&admin, "frank").await?;

    let res = grant(
        &server,
        &admin,
        json!({ "user_ids": [member_id, 1], "table_names": ["orders", "nope"] }),
    )
    .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["success_count"], 1);

    let res = server
        .client
        .get(server.url("/api/data/admin/access"))
        .bearer_auth(&admin)
        .send()
        .await?;
    let body: Value = res.json().await?;
    let grants = body["data"].as_array().cloned().unwrap_or_default();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0]["username"], "frank");
    assert_eq!(grants[0]["can_edit"], false);
    Ok(())
}

#[tokio::test]
async fn csv_import_then_export_round_trip() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;

    let form = multipart::Form::new()
        .text("type", "file")
        .text("table_name", "people")
        .part(
            "file",
            multipart::Part::bytes(b"name,city\nAnn,Oslo\nBob,Bergen\n".to_vec()).file_name("people.csv"),
        );
    let res = server
        .client
        .post(server.url("/api/data/admin/import-table"))
        .bearer_auth(&admin)
        .multipart(form)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["rows_imported"], 2);
    assert_eq!(body["data"]["metadata"]["description"], "Imported from file: people.csv");

    let res = server
        .client
        .get(server.url("/api/data/tables/people/export?format=csv"))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let disposition = res
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.contains("people_"), "{}", disposition);
    assert!(disposition.contains(".csv"), "{}", disposition);

    let bytes = res.bytes().await?;
    let text = String::from_utf8_lossy(&bytes);
    let text = text.trim_start_matches('\u{feff}');
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "id,name,city");
    assert!(lines[1].ends_with("Ann,Oslo"));
    assert!(lines[2].ends_with("Bob,Bergen"));

    let res = server
        .client
        .get(server.url("/api/data/tables/people/export?format=pdf"))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn sql_import_injects_surrogate_key() -> Result<()> {
    let server = TestServer::spawn().await?;
    let admin = server.admin_token().await?;

    let res = server
        .client
        .post(server.url("/api/data/admin/import-table"))
        .bearer_auth(&admin)
        .json(&json!({ "type": "sql", "sql_statement": "CREATE TABLE notes (title TEXT, body TEXT)" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["injected_key"], true);
    assert_eq!(body["data"]["columns"][0], "id");

    let res = server
        .client
        .post(server.url("/api/data/admin/import-table"))
        .bearer_auth(&admin)
        .json(&json!({ "type": "sql", "sql_statement": "DROP TABLE notes" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn dropping_a_table_removes_metadata_and_grants() -> Result<()> {
    let server = TestServer::spawn().await?;
    seed_orders(&server, 2).await?;
    let admin = server.admin_token().await?;
    let (member_id, member) = server.member(&admin, "gina").await?;

    let res = server
        .client
        .post(server.url("/api/data/admin/tables"))
        .bearer_auth(&admin)
        .json(&json!({ "table_name": "orders", "display_name": "Orders" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    grant(&server, &admin, json!({ "user_id": member_id, "table_name": "orders" })).await?;

    let res = server
        .client
        .get(server.url("/api/data/tables"))
        .bearer_auth(&member)
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"].as_array().map(|a| a.len()), Some(1));

    let res = server
        .client
        .delete(server.url("/api/data/admin/tables/orders"))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["grants_removed"], 1);

    let res = server
        .client
        .get(server.url("/api/data/tables"))
        .bearer_auth(&member)
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"].as_array().map(|a| a.len()), Some(0));

    let res = server
        .client
        .get(server.url("/api/data/tables/orders/data"))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn search_is_limited_to_viewable_tables() -> Result<()> {
    let server = TestServer::spawn().await?;
    seed_orders(&server, 3).await?;
    server.execute("CREATE TABLE secrets (id INTEGER PRIMARY KEY, item TEXT)").await?;
    server.execute("INSERT INTO secrets (item) VALUES ('item-1 classified')").await?;
    let admin = server.admin_token().await?;
    let (member_id, member) = server.member(&admin, "hank").await?;
    grant(&server, &admin, json!({ "user_id": member_id, "table_name": "orders" })).await?;

    let res = server
        .client
        .get(server.url("/api/data/search?search=item-1"))
        .bearer_auth(&member)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    let tables: Vec<&str> = body["data"]
        .as_array()
        .map(|a| a.iter().filter_map(|t| t["table_name"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(tables, vec!["orders"]);

    let res = server
        .client
        .get(server.url("/api/data/admin/search?search=item-1"))
        .bearer_auth(&admin)
        .send()
        .await?;
    let body: Value = res.json().await?;
    assert_eq!(body["data"].as_array().map(|a| a.len()), Some(2));
    Ok(())
}

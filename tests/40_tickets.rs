mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn ticket_lifecycle_with_timeline_and_audit() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::db_ready(server).await {
        eprintln!("skipping: database unavailable");
        return Ok(());
    }
    let client = reqwest::Client::new();

    let (token, _) = common::register_user(server, &client, "tickets").await?;
    let org = common::create_org(server, &client, &token, "Ticket Org").await?;
    let org_id = org["id"].as_str().unwrap();

    // Create
    let res = client
        .post(format!("{}/api/orgs/{}/tickets", server.base_url, org_id))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Checkout is down",
            "description": "500s on payment submit",
            "severity": 1,
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await?;
    let ticket_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["status"], "OPEN");
    assert_eq!(body["data"]["severity"], 1);

    // Detail carries the CREATED event
    let res = client
        .get(format!(
            "{}/api/orgs/{}/tickets/{}",
            server.base_url, org_id, ticket_id
        ))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await?;
    let events = body["data"]["events"].as_array().unwrap();
    assert!(events.iter().any(|e| e["type"] == "CREATED"));

    // Comment
    let res = client
        .post(format!(
            "{}/api/orgs/{}/tickets/{}/comments",
            server.base_url, org_id, ticket_id
        ))
        .bearer_auth(&token)
        .json(&json!({ "message": "Looking into it" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    // Status change appends a STATUS_CHANGED event
    let res = client
        .patch(format!(
            "{}/api/orgs/{}/tickets/{}",
            server.base_url, org_id, ticket_id
        ))
        .bearer_auth(&token)
        .json(&json!({ "status": "INVESTIGATING" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await?;
    assert_eq!(body["data"]["status"], "INVESTIGATING");

    let res = client
        .get(format!(
            "{}/api/orgs/{}/tickets/{}",
            server.base_url, org_id, ticket_id
        ))
        .bearer_auth(&token)
        .send()
        .await?;
    let body: serde_json::Value = res.json().await?;
    let events = body["data"]["events"].as_array().unwrap();
    assert!(events.iter().any(|e| e["type"] == "COMMENT"));
    assert!(events.iter().any(|e| e["type"] == "STATUS_CHANGED"));

    // Status filter
    let res = client
        .get(format!(
            "{}/api/orgs/{}/tickets?status=INVESTIGATING",
            server.base_url, org_id
        ))
        .bearer_auth(&token)
        .send()
        .await?;
    let body: serde_json::Value = res.json().await?;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let res = client
        .get(format!(
            "{}/api/orgs/{}/tickets?status=RESOLVED",
            server.base_url, org_id
        ))
        .bearer_auth(&token)
        .send()
        .await?;
    let body: serde_json::Value = res.json().await?;
    assert!(body["data"].as_array().unwrap().is_empty());

    // Unknown status is a client error
    let res = client
        .get(format!(
            "{}/api/orgs/{}/tickets?status=CLOSED",
            server.base_url, org_id
        ))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Audit trail recorded the mutations
    let res = client
        .get(format!("{}/api/orgs/{}/audit", server.base_url, org_id))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await?;
    let actions: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["action"].as_str())
        .collect();
    assert!(actions.contains(&"org.created"));
    assert!(actions.contains(&"ticket.created"));
    assert!(actions.contains(&"ticket.updated"));

    Ok(())
}

#[tokio::test]
async fn tags_attach_and_filter() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::db_ready(server).await {
        eprintln!("skipping: database unavailable");
        return Ok(());
    }
    let client = reqwest::Client::new();

    let (token, _) = common::register_user(server, &client, "tagger").await?;
    let org = common::create_org(server, &client, &token, "Tag Org").await?;
    let org_id = org["id"].as_str().unwrap();

    let res = client
        .post(format!("{}/api/orgs/{}/tags", server.base_url, org_id))
        .bearer_auth(&token)
        .json(&json!({ "name": "billing" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    // Duplicate tag name conflicts
    let res = client
        .post(format!("{}/api/orgs/{}/tags", server.base_url, org_id))
        .bearer_auth(&token)
        .json(&json!({ "name": "billing" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .post(format!("{}/api/orgs/{}/tickets", server.base_url, org_id))
        .bearer_auth(&token)
        .json(&json!({ "title": "Invoice totals wrong" }))
        .send()
        .await?;
    let body: serde_json::Value = res.json().await?;
    let ticket_id = body["data"]["id"].as_str().unwrap().to_string();

    // Attach by name, then filter the list by that tag
    let res = client
        .post(format!(
            "{}/api/orgs/{}/tickets/{}/tags/billing",
            server.base_url, org_id, ticket_id
        ))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!(
            "{}/api/orgs/{}/tickets?tag=billing",
            server.base_url, org_id
        ))
        .bearer_auth(&token)
        .send()
        .await?;
    let body: serde_json::Value = res.json().await?;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Detach empties the filter
    let res = client
        .delete(format!(
            "{}/api/orgs/{}/tickets/{}/tags/billing",
            server.base_url, org_id, ticket_id
        ))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!(
            "{}/api/orgs/{}/tickets?tag=billing",
            server.base_url, org_id
        ))
        .bearer_auth(&token)
        .send()
        .await?;
    let body: serde_json::Value = res.json().await?;
    assert!(body["data"].as_array().unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn viewers_are_read_only() -> Result<()> {
    let server = common::ensure_server().await?;
    if !common::db_ready(server).await {
        eprintln!("skipping: database unavailable");
        return Ok(());
    }
    let client = reqwest::Client::new();

    let (owner_token, _) = common::register_user(server, &client, "ro-owner").await?;
    let org = common::create_org(server, &client, &owner_token, "Read Only Org").await?;
    let org_id = org["id"].as_str().unwrap();

    let (viewer_token, viewer) = common::register_user(server, &client, "ro-viewer").await?;
    let res = client
        .post(format!("{}/api/orgs/{}/members", server.base_url, org_id))
        .bearer_auth(&owner_token)
        .json(&json!({ "email": viewer["email"], "role": "VIEWER" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    // Viewers can read tickets...
    let res = client
        .get(format!("{}/api/orgs/{}/tickets", server.base_url, org_id))
        .bearer_auth(&viewer_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    // ...but cannot create them, and no ticket is written
    let res = client
        .post(format!("{}/api/orgs/{}/tickets", server.base_url, org_id))
        .bearer_auth(&viewer_token)
        .json(&json!({ "title": "Should not exist" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .get(format!("{}/api/orgs/{}/tickets", server.base_url, org_id))
        .bearer_auth(&owner_token)
        .send()
        .await?;
    let body: serde_json::Value = res.json().await?;
    assert!(body["data"].as_array().unwrap().is_empty());

    // Tags are MEMBER-gated even for reads
    let res = client
        .get(format!("{}/api/orgs/{}/tags", server.base_url, org_id))
        .bearer_auth(&viewer_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    Ok(())
}

mod common;

use std::collections::HashMap;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

async fn create_org(app: &axum::Router, token: &str, name: &str, parent: Option<&Value>) -> Value {
    let (status, body) = common::send(
        app,
        Method::POST,
        "/api/organizations",
        Some(token),
        Some(json!({
            "org_code": common::unique("ORG"),
            "admin_code": common::unique("ADM"),
            "name": name,
            "org_type": "district",
            "parent_id": parent.map(|p| p["id"].clone())
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

/// name -> depth for a descendants/ancestors listing
async fn depths(app: &axum::Router, org: &Value, direction: &str) -> HashMap<String, i64> {
    let uri = format!("/api/organizations/{}/{}", org["id"].as_str().unwrap(), direction);
    let (status, body) = common::send(app, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body.as_array()
        .unwrap()
        .iter()
        .map(|n| (n["name"].as_str().unwrap().to_string(), n["depth"].as_i64().unwrap()))
        .collect()
}

#[tokio::test]
async fn closure_tracks_whole_subtree_on_reparent() {
    let Some(db) = common::database().await else { return };
    let app = common::db_app(&db);
    let (_, token) = common::seed_user(&db, "admin").await;

    let a = create_org(&app, &token, &common::unique("A"), None).await;
    let b = create_org(&app, &token, &common::unique("B"), Some(&a)).await;
    let c = create_org(&app, &token, &common::unique("C"), Some(&b)).await;
    let d = create_org(&app, &token, &common::unique("D"), None).await;
    let name = |org: &Value| org["name"].as_str().unwrap().to_string();

    let below_a = depths(&app, &a, "descendants").await;
    assert_eq!(below_a.get(&name(&b)), Some(&1));
    assert_eq!(below_a.get(&name(&c)), Some(&2));

    // Move B (and C with it) under D
    let (status, moved) = common::send(
        &app,
        Method::PUT,
        &format!("/api/organizations/{}", b["id"].as_str().unwrap()),
        Some(&token),
        Some(json!({ "parent_id": d["id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", moved);
    assert_eq!(moved["parent_id"], d["id"]);

    assert!(depths(&app, &a, "descendants").await.is_empty());

    let below_d = depths(&app, &d, "descendants").await;
    assert_eq!(below_d.len(), 2);
    assert_eq!(below_d.get(&name(&b)), Some(&1));
    assert_eq!(below_d.get(&name(&c)), Some(&2));

    let above_c = depths(&app, &c, "ancestors").await;
    assert_eq!(above_c.len(), 2);
    assert_eq!(above_c.get(&name(&b)), Some(&1));
    assert_eq!(above_c.get(&name(&d)), Some(&2));

    // Detach B to a root
    let (status, _) = common::send(
        &app,
        Method::PUT,
        &format!("/api/organizations/{}", b["id"].as_str().unwrap()),
        Some(&token),
        Some(json!({ "parent_id": null })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let above_c = depths(&app, &c, "ancestors").await;
    assert_eq!(above_c.len(), 1);
    assert_eq!(above_c.get(&name(&b)), Some(&1));
    assert!(depths(&app, &d, "descendants").await.is_empty());
}

#[tokio::test]
async fn cycles_are_rejected() {
    let Some(db) = common::database().await else { return };
    let app = common::db_app(&db);
    let (_, token) = common::seed_user(&db, "admin").await;

    let a = create_org(&app, &token, &common::unique("A"), None).await;
    let b = create_org(&app, &token, &common::unique("B"), Some(&a)).await;
    let uri = format!("/api/organizations/{}", a["id"].as_str().unwrap());

    let (status, _) = common::send(&app, Method::PUT, &uri, Some(&token), Some(json!({ "parent_id": a["id"] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = common::send(&app, Method::PUT, &uri, Some(&token), Some(json!({ "parent_id": b["id"] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing moved
    let below_a = depths(&app, &a, "descendants").await;
    assert_eq!(below_a.len(), 1);
}

#[tokio::test]
async fn duplicate_org_code_conflicts_and_missing_parent_is_not_found() {
    let Some(db) = common::database().await else { return };
    let app = common::db_app(&db);
    let (_, token) = common::seed_user(&db, "admin").await;
    let code = common::unique("DUP");

    let body = json!({ "org_code": code, "name": "first" });
    let (status, _) = common::send(&app, Method::POST, "/api/organizations", Some(&token), Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, err) = common::send(&app, Method::POST, "/api/organizations", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "CONFLICT");

    let (status, _) = common::send(
        &app,
        Method::POST,
        "/api/organizations",
        Some(&token),
        Some(json!({ "org_code": common::unique("ORPHAN"), "name": "orphan", "parent_id": uuid::Uuid::new_v4() })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn join_by_code_grants_role_from_code() {
    let Some(db) = common::database().await else { return };
    let app = common::db_app(&db);
    let (_, creator) = common::seed_user(&db, "creator").await;
    let (member_id, member_token) = common::seed_user(&db, "member").await;
    let (_, admin_token) = common::seed_user(&db, "boss").await;

    let org = create_org(&app, &creator, "เทศบาล", None).await;
    let admin_code: (String,) = sqlx::query_as("SELECT admin_code FROM organizations WHERE id = $1")
        .bind(uuid::Uuid::parse_str(org["id"].as_str().unwrap()).unwrap())
        .fetch_one(db.pool())
        .await
        .unwrap();
    // Admin code never leaves the server
    assert!(org.get("admin_code").is_none());

    let join = |token: String, code: String| {
        let app = app.clone();
        async move {
            common::send(
                &app,
                Method::POST,
                "/api/users/me/organizations",
                Some(&token),
                Some(json!({ "code": code })),
            )
            .await
        }
    };

    let (status, membership) = join(member_token.clone(), org["org_code"].as_str().unwrap().to_string()).await;
    assert_eq!(status, StatusCode::CREATED, "{}", membership);
    assert_eq!(membership["role"], "member");

    let (status, _) = join(member_token.clone(), org["org_code"].as_str().unwrap().to_string()).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, membership) = join(admin_token.clone(), admin_code.0).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(membership["role"], "admin");

    let (status, _) = join(admin_token, common::unique("NOPE")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, profile) = common::send(&app, Method::GET, "/api/users/me", Some(&member_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["id"], member_id.to_string());
    assert_eq!(profile["memberships"].as_array().unwrap().len(), 1);

    let (status, members) = common::send(
        &app,
        Method::GET,
        &format!("/api/organizations/{}/members", org["id"].as_str().unwrap()),
        Some(&member_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(members.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn unknown_token_is_unauthorized() {
    let Some(db) = common::database().await else { return };
    let app = common::db_app(&db);

    let (status, body) = common::send(&app, Method::GET, "/api/users/me", Some("no-such-token"), None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid access token");
}

#[tokio::test]
async fn concurrent_opposite_reparents_reject_the_cycle() {
    let Some(db) = common::database().await else { return };
    let app = common::db_app(&db);
    let (_, token) = common::seed_user(&db, "admin").await;

    for _ in 0..10 {
        let a = create_org(&app, &token, &common::unique("A"), None).await;
        let b = create_org(&app, &token, &common::unique("B"), None).await;

        let move_under = |child: &Value, parent: &Value| {
            let app = app.clone();
            let token = token.clone();
            let uri = format!("/api/organizations/{}", child["id"].as_str().unwrap());
            let body = json!({ "parent_id": parent["id"] });
            async move { common::send(&app, Method::PUT, &uri, Some(&token), Some(body)).await }
        };

        let (first, second) = tokio::join!(
            tokio::spawn(move_under(&a, &b)),
            tokio::spawn(move_under(&b, &a))
        );
        let mut statuses = vec![first.unwrap().0, second.unwrap().0];
        statuses.sort();
        assert_eq!(statuses, vec![StatusCode::OK, StatusCode::BAD_REQUEST]);

        let a_id: uuid::Uuid = a["id"].as_str().unwrap().parse().unwrap();
        let b_id: uuid::Uuid = b["id"].as_str().unwrap().parse().unwrap();
        let (cycles,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM organization_closure
            WHERE (ancestor_id = descendant_id AND depth > 0)
               OR (ancestor_id = $1 AND descendant_id = $2
                   AND EXISTS (SELECT 1 FROM organization_closure WHERE ancestor_id = $2 AND descendant_id = $1))
            "#,
        )
        .bind(a_id)
        .bind(b_id)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(cycles, 0);
    }
}

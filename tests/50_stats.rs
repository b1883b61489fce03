mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

struct Fixture {
    app: axum::Router,
    token: String,
    parent: String,
    child: String,
}

/// Parent org with one direct case, child org with two cases (one completed and rated)
async fn fixture() -> Option<Fixture> {
    let db = common::database().await?;
    let app = common::db_app(&db);
    let (_, token) = common::seed_user(&db, "analyst").await;

    let mut org_ids = Vec::new();
    let mut parent_id: Option<Value> = None;
    for name in ["parent", "child"] {
        let (status, org) = common::send(
            &app,
            Method::POST,
            "/api/organizations",
            Some(&token),
            Some(json!({ "org_code": common::unique(name), "name": name, "parent_id": parent_id })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", org);
        parent_id = Some(org["id"].clone());
        org_ids.push(org["id"].as_str().unwrap().to_string());
    }
    let (parent, child) = (org_ids[0].clone(), org_ids[1].clone());

    for (org, type_id, complete) in [(&parent, 1, false), (&child, 1, true), (&child, 3, false)] {
        let (status, case) = common::send(
            &app,
            Method::POST,
            "/api/cases",
            Some(&token),
            Some(json!({
                "title": "stats fixture",
                "issue_type_id": type_id,
                "latitude": 13.7,
                "longitude": 100.5,
                "organization_ids": [org]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", case);
        let id = case["id"].as_str().unwrap();

        if complete {
            let (status, _) = common::send(
                &app,
                Method::PATCH,
                &format!("/api/cases/{}", id),
                Some(&token),
                Some(json!({ "action": "update_status", "new_status": "เสร็จสิ้น" })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);

            let (status, _) = common::send(
                &app,
                Method::POST,
                &format!("/api/cases/{}/ratings", id),
                Some(&token),
                Some(json!({ "score": 4 })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }
    }

    Some(Fixture { app, token, parent, child })
}

async fn get(fx: &Fixture, uri: &str) -> (StatusCode, Value) {
    common::send(&fx.app, Method::GET, uri, Some(&fx.token), None).await
}

#[tokio::test]
async fn overview_respects_subtree_scope() {
    let Some(fx) = fixture().await else { return };

    let (status, direct) = get(&fx, &format!("/api/stats/overview?organization_id={}", fx.parent)).await;
    assert_eq!(status, StatusCode::OK, "{}", direct);
    assert_eq!(direct["total"], 1);
    assert_eq!(direct["by_status"]["รอรับเรื่อง"], 1);
    assert!(direct["average_resolution_hours"].is_null());

    let (_, tree) = get(
        &fx,
        &format!("/api/stats/overview?organization_id={}&include_children=true", fx.parent),
    )
    .await;
    assert_eq!(tree["total"], 3);
    assert_eq!(tree["by_status"]["รอรับเรื่อง"], 2);
    assert_eq!(tree["by_status"]["เสร็จสิ้น"], 1);
    assert!(tree["average_resolution_hours"].as_f64().unwrap() >= 0.0);

    let by_type = tree["by_type"].as_array().unwrap();
    assert_eq!(by_type[0]["issue_type_id"], 1);
    assert_eq!(by_type[0]["count"], 2);

    let (_, child) = get(&fx, &format!("/api/stats/overview?organization_id={}", fx.child)).await;
    assert_eq!(child["total"], 2);
}

#[tokio::test]
async fn timeseries_has_one_bucket_per_day() {
    let Some(fx) = fixture().await else { return };

    let (status, buckets) = get(
        &fx,
        &format!("/api/stats/timeseries?organization_id={}&include_children=true&interval=7d", fx.parent),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", buckets);

    let buckets = buckets.as_array().unwrap();
    assert_eq!(buckets.len(), 7);
    let today = buckets.last().unwrap();
    assert_eq!(today["date"], chrono::Utc::now().date_naive().to_string());
    assert_eq!(today["created"], 3);
    assert_eq!(today["completed"], 1);
    assert!(buckets[..6].iter().all(|b| b["created"] == 0));

    let (status, _) = get(
        &fx,
        &format!("/api/stats/timeseries?organization_id={}&interval=fortnight", fx.parent),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn satisfaction_distribution_counts_every_score() {
    let Some(fx) = fixture().await else { return };

    let (status, body) = get(
        &fx,
        &format!("/api/stats/satisfaction?organization_id={}&include_children=true", fx.parent),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_ratings"], 1);
    assert_eq!(body["average_score"].as_f64(), Some(4.0));
    assert_eq!(body["distribution"]["4"], 1);
    assert_eq!(body["distribution"]["1"], 0);

    let (_, direct) = get(&fx, &format!("/api/stats/satisfaction?organization_id={}", fx.parent)).await;
    assert_eq!(direct["total_ratings"], 0);
}

#[tokio::test]
async fn unknown_scope_is_not_found() {
    let Some(fx) = fixture().await else { return };

    let (status, body) = get(&fx, &format!("/api/stats/overview?organization_id={}", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Organization not found");
}

#[tokio::test]
async fn reverse_geocode_uses_configured_client() {
    let Some(fx) = fixture().await else { return };

    let (status, address) = get(&fx, "/api/geocode/reverse?lat=13.7463&lon=100.5347").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(address["province"], "กรุงเทพมหานคร");

    let (status, _) = get(&fx, "/api/geocode/reverse?lat=95&lon=100").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// tests/friend_tests.rs

mod common;

use common::{get_notifications, register_and_login, spawn_app};
use std::time::Duration;

#[tokio::test]
async fn friend_request_flow_accept() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let (token_a, user_a) = register_and_login(&client, &app.address, "entrepreneur").await;
    let (token_b, user_b) = register_and_login(&client, &app.address, "investor").await;

    // A sends a request to B
    let resp = client
        .post(format!("{}/api/friends/request", app.address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({ "receiver_id": user_b }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let request: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(request["status"], "pending");
    let request_id = request["id"].as_i64().unwrap();

    // B sees the pending request
    let pending: Vec<serde_json::Value> = client
        .get(format!("{}/api/friends/requests", app.address))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let incoming = pending
        .iter()
        .find(|r| r["sender_id"].as_i64() == Some(user_a))
        .expect("B should see A's pending request");
    assert_eq!(incoming["status"], "pending");

    // B accepts
    let resp = client
        .patch(format!("{}/api/friends/{}", app.address, request_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .json(&serde_json::json!({ "action": "accepted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    // Symmetry: each appears in the other's friend list
    for (token, expected_friend) in [(&token_a, user_b), (&token_b, user_a)] {
        let friends: Vec<serde_json::Value> = client
            .get(format!("{}/api/friends", app.address))
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(
            friends
                .iter()
                .any(|f| f["id"].as_i64() == Some(expected_friend)),
            "friend list should be mirrored"
        );
    }

    // A receives a friend_accept notification (fan-out is detached)
    tokio::time::sleep(Duration::from_millis(300)).await;
    let notifications = get_notifications(&client, &app.address, &token_a).await;
    assert!(
        notifications
            .iter()
            .any(|n| n["type"] == "friend_accept" && n["actor_id"].as_i64() == Some(user_b)),
        "sender should be notified of acceptance"
    );
}

#[tokio::test]
async fn duplicate_requests_are_rejected_in_both_directions() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let (token_a, _user_a) = register_and_login(&client, &app.address, "entrepreneur").await;
    let (token_b, user_b) = register_and_login(&client, &app.address, "startup").await;

    let resp = client
        .post(format!("{}/api/friends/request", app.address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({ "receiver_id": user_b }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    // Same direction again
    let resp = client
        .post(format!("{}/api/friends/request", app.address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({ "receiver_id": user_b }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    // Reverse direction
    let login_a: serde_json::Value = client
        .get(format!("{}/api/profile/me", app.address))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let user_a = login_a["id"].as_i64().unwrap();

    let resp = client
        .post(format!("{}/api/friends/request", app.address))
        .header("Authorization", format!("Bearer {}", token_b))
        .json(&serde_json::json!({ "receiver_id": user_a }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn only_the_receiver_may_respond() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let (token_a, _) = register_and_login(&client, &app.address, "entrepreneur").await;
    let (token_b, user_b) = register_and_login(&client, &app.address, "investor").await;
    let (token_c, _) = register_and_login(&client, &app.address, "university").await;

    let request: serde_json::Value = client
        .post(format!("{}/api/friends/request", app.address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({ "receiver_id": user_b }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let request_id = request["id"].as_i64().unwrap();

    // C is neither sender nor receiver: 403
    let resp = client
        .patch(format!("{}/api/friends/{}", app.address, request_id))
        .header("Authorization", format!("Bearer {}", token_c))
        .json(&serde_json::json!({ "action": "accepted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    // The sender cannot accept their own request either
    let resp = client
        .patch(format!("{}/api/friends/{}", app.address, request_id))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({ "action": "accepted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    // B rejects; a second response hits the not-pending guard
    let resp = client
        .patch(format!("{}/api/friends/{}", app.address, request_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .json(&serde_json::json!({ "action": "rejected" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resp = client
        .patch(format!("{}/api/friends/{}", app.address, request_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .json(&serde_json::json!({ "action": "accepted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn invalid_action_is_a_bad_request() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let (token_a, _) = register_and_login(&client, &app.address, "entrepreneur").await;
    let (token_b, user_b) = register_and_login(&client, &app.address, "investor").await;

    let request: serde_json::Value = client
        .post(format!("{}/api/friends/request", app.address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({ "receiver_id": user_b }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let request_id = request["id"].as_i64().unwrap();

    let resp = client
        .patch(format!("{}/api/friends/{}", app.address, request_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .json(&serde_json::json!({ "action": "maybe" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn removing_a_friend_is_idempotent() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let (token_a, user_a) = register_and_login(&client, &app.address, "entrepreneur").await;
    let (token_b, user_b) = register_and_login(&client, &app.address, "investor").await;

    common::make_friends(&client, &app.address, &token_a, &token_b, user_b).await;

    // First removal severs both directions
    let resp = client
        .delete(format!("{}/api/friends/{}", app.address, user_b))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["removed"], true);

    let friends_b: Vec<serde_json::Value> = client
        .get(format!("{}/api/friends", app.address))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(
        !friends_b.iter().any(|f| f["id"].as_i64() == Some(user_a)),
        "removal must clear the mirrored row too"
    );

    // Removing again is a no-op, not an error
    let resp = client
        .delete(format!("{}/api/friends/{}", app.address, user_b))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["removed"], false);
}

#[tokio::test]
async fn requesting_yourself_or_a_ghost_fails() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let (token_a, user_a) = register_and_login(&client, &app.address, "entrepreneur").await;

    let resp = client
        .post(format!("{}/api/friends/request", app.address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({ "receiver_id": user_a }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let resp = client
        .post(format!("{}/api/friends/request", app.address))
        .header("Authorization", format!("Bearer {}", token_a))
        .json(&serde_json::json!({ "receiver_id": 99_999_999 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

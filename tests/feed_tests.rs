// tests/feed_tests.rs
//
// Visibility resolver and feed pagination.

mod common;

use common::{create_post, make_friends, register_and_login, spawn_app};

async fn feed_post_ids(client: &reqwest::Client, address: &str, token: Option<&str>) -> Vec<i64> {
    let mut req = client.get(format!("{}/api/posts?limit=50", address));
    if let Some(token) = token {
        req = req.header("Authorization", format!("Bearer {}", token));
    }
    let feed: serde_json::Value = req.send().await.unwrap().json().await.unwrap();
    feed["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn connections_post_appears_after_friendship() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let (token_a, _user_a) = register_and_login(&client, &app.address, "entrepreneur").await;
    let (token_c, user_c) = register_and_login(&client, &app.address, "investor").await;

    let post_id = create_post(&client, &app.address, &token_a, "Hello", "connections").await;

    // Not connected: absent from C's feed, and detail access is denied
    let ids = feed_post_ids(&client, &app.address, Some(&token_c)).await;
    assert!(!ids.contains(&post_id));

    let resp = client
        .get(format!("{}/api/posts/{}", app.address, post_id))
        .header("Authorization", format!("Bearer {}", token_c))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    // After becoming friends the post shows up
    make_friends(&client, &app.address, &token_a, &token_c, user_c).await;

    let ids = feed_post_ids(&client, &app.address, Some(&token_c)).await;
    assert!(ids.contains(&post_id), "friend should now see the post");

    let resp = client
        .get(format!("{}/api/posts/{}", app.address, post_id))
        .header("Authorization", format!("Bearer {}", token_c))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn private_posts_are_author_only_and_anonymous_sees_public_only() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let (token_a, _) = register_and_login(&client, &app.address, "entrepreneur").await;
    let (token_b, user_b) = register_and_login(&client, &app.address, "investor").await;

    let public_id = create_post(&client, &app.address, &token_a, "open pitch", "public").await;
    let private_id = create_post(&client, &app.address, &token_a, "notes to self", "private").await;
    let connections_id =
        create_post(&client, &app.address, &token_a, "for my network", "connections").await;

    // Author sees all three
    let ids = feed_post_ids(&client, &app.address, Some(&token_a)).await;
    assert!(ids.contains(&public_id));
    assert!(ids.contains(&private_id));
    assert!(ids.contains(&connections_id));

    // A friend sees public + connections, never private
    make_friends(&client, &app.address, &token_a, &token_b, user_b).await;
    let ids = feed_post_ids(&client, &app.address, Some(&token_b)).await;
    assert!(ids.contains(&public_id));
    assert!(ids.contains(&connections_id));
    assert!(!ids.contains(&private_id));

    // Anonymous sees only public
    let ids = feed_post_ids(&client, &app.address, None).await;
    assert!(ids.contains(&public_id));
    assert!(!ids.contains(&private_id));
    assert!(!ids.contains(&connections_id));
}

#[tokio::test]
async fn post_requires_content_or_media() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let (token, _) = register_and_login(&client, &app.address, "entrepreneur").await;

    let resp = client
        .post(format!("{}/api/posts", app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({ "content": "", "media": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    // Media alone is enough
    let resp = client
        .post(format!("{}/api/posts", app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "media": [{ "url": "/uploads/deck.pdf", "storage_id": "deck.pdf", "media_type": "document" }]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
}

#[tokio::test]
async fn feed_pagination_contract() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let (token, _) = register_and_login(&client, &app.address, "entrepreneur").await;

    for i in 0..3 {
        create_post(&client, &app.address, &token, &format!("post {}", i), "private").await;
    }

    // Author-only view of their three private posts, two per page
    let feed: serde_json::Value = client
        .get(format!("{}/api/posts?page=1&limit=2", app.address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let pagination = &feed["pagination"];
    assert_eq!(pagination["page"], 1);
    assert_eq!(pagination["limit"], 2);
    assert!(pagination["total"].as_i64().unwrap() >= 3);
    assert!(feed["posts"].as_array().unwrap().len() <= 2);

    // Out-of-range values clamp instead of erroring
    let feed: serde_json::Value = client
        .get(format!("{}/api/posts?page=0&limit=999", app.address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(feed["pagination"]["page"], 1);
    assert_eq!(feed["pagination"]["limit"], 50);
}

#[tokio::test]
async fn deleting_a_post_deletes_each_media_object_once() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let (token, _) = register_and_login(&client, &app.address, "entrepreneur").await;

    let post: serde_json::Value = client
        .post(format!("{}/api/posts", app.address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "content": "two attachments",
            "media": [
                { "url": "/uploads/one.png", "storage_id": "one.png", "media_type": "image" },
                { "url": "/uploads/two.png", "storage_id": "two.png", "media_type": "image" }
            ]
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let post_id = post["id"].as_i64().unwrap();

    let resp = client
        .delete(format!("{}/api/posts/{}", app.address, post_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let deleted = app.media.deleted.lock().unwrap();
    let ours: Vec<_> = deleted
        .iter()
        .filter(|id| *id == "one.png" || *id == "two.png")
        .collect();
    assert_eq!(ours.len(), 2, "each media object deleted exactly once");
}

#[tokio::test]
async fn only_author_or_moderator_may_delete() {
    let Some(app) = spawn_app().await else { return };
    let client = reqwest::Client::new();

    let (token_a, _) = register_and_login(&client, &app.address, "entrepreneur").await;
    let (token_b, _) = register_and_login(&client, &app.address, "investor").await;
    let (token_m, user_m) = register_and_login(&client, &app.address, "organisation").await;

    let post_id = create_post(&client, &app.address, &token_a, "hands off", "public").await;

    let resp = client
        .delete(format!("{}/api/posts/{}", app.address, post_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    // Promote M to admin directly in the database, then re-login for a
    // token carrying the new role.
    sqlx::query("UPDATE users SET role = 'admin' WHERE id = $1")
        .bind(user_m)
        .execute(&app.pool)
        .await
        .unwrap();

    let me: serde_json::Value = client
        .get(format!("{}/api/profile/me", app.address))
        .header("Authorization", format!("Bearer {}", token_m))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let email = me["email"].as_str().unwrap();

    let login: serde_json::Value = client
        .post(format!("{}/api/auth/login", app.address))
        .json(&serde_json::json!({ "email": email, "password": "password123" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let admin_token = login["token"].as_str().unwrap();

    let resp = client
        .delete(format!("{}/api/posts/{}", app.address, post_id))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

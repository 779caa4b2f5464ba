//! Integration tests for forum topics, messages and reactions.

mod common;

use axum::http::{Method, StatusCode};
use common::{setup_app, TestApp};
use gameforum::db::Role;
use serde_json::{json, Value};

async fn topic(app: &TestApp, game_id: i64, token: &str) -> i64 {
    let (status, body) = app
        .post(
            &format!("/api/forum/games/{game_id}/topics"),
            Some(token),
            json!({
                "title": "Best speedrun routes",
                "description": "Share your routes and splits here.",
                "icon": "fas fa-flag"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().expect("topic id")
}

async fn message(app: &TestApp, topic_id: i64, token: &str, body: Value) -> Value {
    let (status, body) = app
        .post(
            &format!("/api/forum/topics/{topic_id}/messages"),
            Some(token),
            body,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

async fn topic_view(app: &TestApp, topic_id: i64) -> Value {
    let (status, body) = app.get(&format!("/api/forum/topics/{topic_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    body
}

#[tokio::test]
async fn test_topic_lifecycle() {
    let app = setup_app().await;
    let game_id = app.game("celeste").await;
    let (_, token) = app.account("alice", Role::User).await;

    let topic_id = topic(&app, game_id, &token).await;
    let body = topic_view(&app, topic_id).await;
    assert_eq!(body["author"], "alice");
    assert_eq!(body["icon"], "fas fa-flag");
    assert_eq!(body["replies"], 0);
    assert_eq!(body["gameId"], game_id);

    let (_, list) = app
        .get(&format!("/api/forum/games/{game_id}/topics"), None)
        .await;
    assert_eq!(list.as_array().map(Vec::len), Some(1));

    let (_, latest) = app.get("/api/forum/latest-topics?limit=50", None).await;
    assert_eq!(latest.as_array().map(Vec::len), Some(1));

    let (status, _) = app.get("/api/forum/topics/9999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_topic_validation() {
    let app = setup_app().await;
    let game_id = app.game("celeste").await;
    let (_, token) = app.account("alice", Role::User).await;

    let (status, _) = app
        .post(
            &format!("/api/forum/games/{game_id}/topics"),
            Some(&token),
            json!({"title": "Hey", "description": "Long enough description"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/api/forum/games/9999/topics",
            Some(&token),
            json!({"title": "Valid title", "description": "Long enough description"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Game not found");

    // An unusable icon falls back to the default.
    let (status, body) = app
        .post(
            &format!("/api/forum/games/{game_id}/topics"),
            Some(&token),
            json!({
                "title": "Valid title",
                "description": "Long enough description",
                "icon": "<script>"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["icon"], "fas fa-comments");
}

#[tokio::test]
async fn test_reply_counters_follow_creates_and_deletes() {
    let app = setup_app().await;
    let game_id = app.game("celeste").await;
    let (_, alice) = app.account("alice", Role::User).await;
    let (_, bob) = app.account("bob", Role::User).await;
    let (_, admin) = app.account("root", Role::Admin).await;

    let topic_id = topic(&app, game_id, &alice).await;
    let first = message(&app, topic_id, &alice, json!({"content": "First!"})).await;
    let first_id = first["id"].as_i64().unwrap();
    assert_eq!(first["avatarColor"].as_str().map(str::len), Some(7));

    let reply = message(
        &app,
        topic_id,
        &bob,
        json!({"content": "I agree with this", "quotedMessageId": first_id}),
    )
    .await;
    assert_eq!(reply["parentMessageId"], first_id);
    assert_eq!(reply["quotedAuthor"], "alice");
    assert_eq!(reply["quotedPreview"], "First!");

    assert_eq!(topic_view(&app, topic_id).await["replies"], 2);
    let (_, messages) = app
        .get(&format!("/api/forum/topics/{topic_id}/messages"), None)
        .await;
    let messages = messages.as_array().unwrap().clone();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["replies"], 1);

    // Only admins delete messages.
    let reply_id = reply["id"].as_i64().unwrap();
    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/api/forum/messages/{reply_id}"),
            Some(&bob),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["path"], format!("/api/forum/messages/{reply_id}"));

    let (status, _) = app
        .send(
            Method::DELETE,
            &format!("/api/forum/messages/{reply_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(topic_view(&app, topic_id).await["replies"], 1);
    let (_, messages) = app
        .get(&format!("/api/forum/topics/{topic_id}/messages"), None)
        .await;
    assert_eq!(messages[0]["replies"], 0);

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/api/forum/messages/{reply_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Message not found");
}

#[tokio::test]
async fn test_references_must_stay_in_topic() {
    let app = setup_app().await;
    let game_id = app.game("celeste").await;
    let (_, alice) = app.account("alice", Role::User).await;

    let first_topic = topic(&app, game_id, &alice).await;
    let second_topic = topic(&app, game_id, &alice).await;
    let elsewhere = message(&app, first_topic, &alice, json!({"content": "Over here"})).await;

    let (status, body) = app
        .post(
            &format!("/api/forum/topics/{second_topic}/messages"),
            Some(&alice),
            json!({"content": "Replying across topics", "parentMessageId": elsewhere["id"]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Referenced message belongs to another topic");

    let (status, body) = app
        .post(
            &format!("/api/forum/topics/{second_topic}/messages"),
            Some(&alice),
            json!({"content": "Quoting across topics", "quotedMessageId": elsewhere["id"]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Referenced message belongs to another topic");
    assert_eq!(topic_view(&app, second_topic).await["replies"], 0);
}

#[tokio::test]
async fn test_explicit_parent_kept_alongside_quote() {
    let app = setup_app().await;
    let game_id = app.game("celeste").await;
    let (_, alice) = app.account("alice", Role::User).await;
    let (_, bob) = app.account("bob", Role::User).await;
    let topic_id = topic(&app, game_id, &alice).await;

    let parent = message(&app, topic_id, &alice, json!({"content": "Route A"})).await;
    let quoted = message(&app, topic_id, &bob, json!({"content": "Route B"})).await;

    let reply = message(
        &app,
        topic_id,
        &alice,
        json!({
            "content": "B is faster than A",
            "parentMessageId": parent["id"],
            "quotedMessageId": quoted["id"]
        }),
    )
    .await;
    assert_eq!(reply["parentMessageId"], parent["id"]);
    assert_eq!(reply["quotedMessageId"], quoted["id"]);
    assert_eq!(reply["quotedAuthor"], "bob");
    assert_eq!(reply["quotedPreview"], "Route B");
}

#[tokio::test]
async fn test_message_body_rules() {
    let app = setup_app().await;
    let game_id = app.game("celeste").await;
    let (_, alice) = app.account("alice", Role::User).await;
    let topic_id = topic(&app, game_id, &alice).await;

    let (status, _) = app
        .post(
            &format!("/api/forum/topics/{topic_id}/messages"),
            Some(&alice),
            json!({"content": "   "}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            &format!("/api/forum/topics/{topic_id}/messages"),
            Some(&alice),
            json!({"content": "look", "imageUrls": ["javascript:alert(1)"]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Images alone make a valid message; duplicates and blanks collapse.
    let body = message(
        &app,
        topic_id,
        &alice,
        json!({"imageUrls": ["https://cdn.example.com/a.png", " ", "https://cdn.example.com/a.png"]}),
    )
    .await;
    assert_eq!(body["imageUrls"], json!(["https://cdn.example.com/a.png"]));
    assert_eq!(body["content"], "");
}

#[tokio::test]
async fn test_only_author_or_admin_edits() {
    let app = setup_app().await;
    let game_id = app.game("celeste").await;
    let (_, alice) = app.account("alice", Role::User).await;
    let (_, bob) = app.account("bob", Role::User).await;
    let (_, admin) = app.account("root", Role::Admin).await;
    let topic_id = topic(&app, game_id, &alice).await;
    let id = message(&app, topic_id, &alice, json!({"content": "Typo hree"})).await["id"]
        .as_i64()
        .unwrap();
    let uri = format!("/api/forum/messages/{id}");

    let (status, body) = app
        .send(Method::PATCH, &uri, Some(&bob), Some(json!({"content": "hijack"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "You can edit only your own messages");

    let (status, body) = app
        .send(Method::PATCH, &uri, Some(&alice), Some(json!({"content": "Typo here"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "Typo here");
    assert_eq!(body["edited"], true);

    let (status, _) = app
        .send(Method::PATCH, &uri, Some(&admin), Some(json!({"content": "Moderated"})))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_reactions_accumulate() {
    let app = setup_app().await;
    let game_id = app.game("celeste").await;
    let (_, alice) = app.account("alice", Role::User).await;
    let (_, bob) = app.account("bob", Role::User).await;
    let topic_id = topic(&app, game_id, &alice).await;
    let id = message(&app, topic_id, &alice, json!({"content": "Rate me"})).await["id"]
        .as_i64()
        .unwrap();

    app.post(&format!("/api/forum/messages/{id}/like"), Some(&alice), json!({}))
        .await;
    app.post(&format!("/api/forum/messages/{id}/like"), Some(&bob), json!({}))
        .await;
    let (status, body) = app
        .post(&format!("/api/forum/messages/{id}/dislike"), Some(&bob), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"messageId": id, "likes": 2, "dislikes": 1}));

    let (status, _) = app
        .post(&format!("/api/forum/messages/{id}/like"), None, json!({}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post("/api/forum/messages/9999/like", Some(&bob), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_deletes_topic_with_messages() {
    let app = setup_app().await;
    let game_id = app.game("celeste").await;
    let (_, alice) = app.account("alice", Role::User).await;
    let (_, admin) = app.account("root", Role::Admin).await;
    let topic_id = topic(&app, game_id, &alice).await;
    message(&app, topic_id, &alice, json!({"content": "Doomed"})).await;

    let uri = format!("/api/forum/topics/{topic_id}");
    let (status, _) = app.send(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, messages) = app.get(&format!("{uri}/messages"), None).await;
    assert_eq!(messages, json!([]));
}

#[tokio::test]
async fn test_forum_image_upload() {
    let app = setup_app().await;
    let (_, alice) = app.account("alice", Role::User).await;

    let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    let (status, body) = app
        .send_multipart("/api/forum/uploads/image", &alice, "file", "shot.png", "image/png", &png)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("/uploads/forum/"));
    assert!(url.ends_with(".png"));

    let stored = app.uploads_dir.join(url.trim_start_matches("/uploads/"));
    assert_eq!(std::fs::read(stored).unwrap(), png);

    let (status, body) = app
        .send_multipart(
            "/api/forum/uploads/image",
            &alice,
            "file",
            "notes.txt",
            "text/plain",
            b"hello",
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Only images are allowed");
}

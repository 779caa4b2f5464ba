use std::collections::HashMap;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

use super::extract::{Path, Query, ValidatedJson};
use super::uploads::{read_file_field, store_image, UploadKind, UPLOAD_BODY_LIMIT};
use super::AppState;
use crate::auth::CurrentUser;
use crate::db::{
    self, ForumMessage, ForumTopic, NewForumMessage, NewForumTopic, ReactionCounts, ReactionKind,
};
use crate::error::{ApiError, ApiResult};
use crate::forum as rules;

const DEFAULT_LATEST_LIMIT: i64 = 5;
const MAX_LATEST_LIMIT: i64 = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/forum/games/:game_id/topics",
            get(list_topics).post(create_topic),
        )
        .route("/api/forum/latest-topics", get(latest_topics))
        .route("/api/forum/topics/:id", get(get_topic).delete(delete_topic))
        .route(
            "/api/forum/topics/:id/messages",
            get(list_messages).post(create_message),
        )
        .route(
            "/api/forum/messages/:id",
            patch(update_message).delete(delete_message),
        )
        .route("/api/forum/messages/:id/like", post(like_message))
        .route("/api/forum/messages/:id/dislike", post(dislike_message))
        .route(
            "/api/forum/uploads/image",
            post(upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
}

// ========== Views ==========

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicView {
    pub id: i64,
    pub game_id: i64,
    pub title: String,
    pub description: String,
    pub author: String,
    pub replies: i64,
    pub icon: String,
    pub created_at: String,
    pub last_activity_at: String,
}

impl From<ForumTopic> for TopicView {
    fn from(topic: ForumTopic) -> Self {
        Self {
            icon: rules::topic_icon(Some(topic.icon.as_str())),
            id: topic.id,
            game_id: topic.game_id,
            title: topic.title,
            description: topic.description,
            author: topic.author,
            replies: topic.replies,
            created_at: topic.created_at,
            last_activity_at: topic.last_activity_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: i64,
    pub topic_id: i64,
    pub author: String,
    pub avatar_color: String,
    pub created_at: String,
    pub content: String,
    pub image_urls: Vec<String>,
    pub parent_message_id: Option<i64>,
    pub quoted_message_id: Option<i64>,
    pub quoted_author: Option<String>,
    pub quoted_preview: Option<String>,
    pub likes: i64,
    pub dislikes: i64,
    pub replies: i64,
    pub edited: bool,
}

impl MessageView {
    fn new(message: ForumMessage, quoted: Option<&ForumMessage>) -> Self {
        Self {
            image_urls: message.image_url_list(),
            quoted_author: quoted.map(|q| q.author.clone()),
            quoted_preview: quoted.map(|q| rules::quote_preview(&q.content)),
            edited: message.edited_at.is_some(),
            id: message.id,
            topic_id: message.topic_id,
            author: message.author,
            avatar_color: message.avatar_color,
            created_at: message.created_at,
            content: message.content,
            parent_message_id: message.parent_message_id,
            quoted_message_id: message.quoted_message_id,
            likes: message.likes,
            dislikes: message.dislikes,
            replies: message.replies,
        }
    }
}

async fn view_with_quote(state: &AppState, message: ForumMessage) -> ApiResult<MessageView> {
    let quoted = match message.quoted_message_id {
        Some(id) => db::get_message(state.db.pool(), id).await?,
        None => None,
    };
    Ok(MessageView::new(message, quoted.as_ref()))
}

// ========== Topics ==========

async fn list_topics(
    State(state): State<AppState>,
    Path(game_id): Path<i64>,
) -> ApiResult<Json<Vec<TopicView>>> {
    let topics = db::list_topics_by_game(state.db.pool(), game_id).await?;
    Ok(Json(topics.into_iter().map(TopicView::from).collect()))
}

async fn get_topic(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TopicView>> {
    let topic = db::get_topic(state.db.pool(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Topic not found"))?;
    Ok(Json(topic.into()))
}

#[derive(Debug, Deserialize)]
pub struct LatestParams {
    limit: Option<i64>,
}

async fn latest_topics(
    State(state): State<AppState>,
    Query(params): Query<LatestParams>,
) -> ApiResult<Json<Vec<TopicView>>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LATEST_LIMIT)
        .clamp(1, MAX_LATEST_LIMIT);
    let topics = db::latest_topics(state.db.pool(), limit).await?;
    Ok(Json(topics.into_iter().map(TopicView::from).collect()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTopicRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

async fn create_topic(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(game_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<CreateTopicRequest>,
) -> ApiResult<(StatusCode, Json<TopicView>)> {
    let pool = state.db.pool();
    if db::get_game_by_id(pool, game_id).await?.is_none() {
        return Err(ApiError::bad_request("Game not found"));
    }

    let topic = NewForumTopic {
        game_id,
        title: rules::topic_title(req.title.as_deref())?,
        description: rules::topic_description(req.description.as_deref())?,
        author: identity.username,
        icon: rules::topic_icon(req.icon.as_deref()),
    };
    let created = db::create_topic(pool, &topic).await?;
    info!(topic_id = created.id, game_id, author = %created.author, "Topic created");
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn delete_topic(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !db::delete_topic(state.db.pool(), id).await? {
        return Err(ApiError::bad_request("Topic not found"));
    }
    info!(topic_id = id, by = %identity.username, "Topic deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ========== Messages ==========

async fn list_messages(
    State(state): State<AppState>,
    Path(topic_id): Path<i64>,
) -> ApiResult<Json<Vec<MessageView>>> {
    let messages = db::list_messages(state.db.pool(), topic_id).await?;
    let by_id: HashMap<i64, ForumMessage> = messages.iter().map(|m| (m.id, m.clone())).collect();

    let views = messages
        .into_iter()
        .map(|message| {
            let quoted = message.quoted_message_id.and_then(|id| by_id.get(&id));
            MessageView::new(message, quoted)
        })
        .collect();
    Ok(Json(views))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageRequest {
    pub content: Option<String>,
    pub image_urls: Option<Vec<String>>,
    pub parent_message_id: Option<i64>,
    pub quoted_message_id: Option<i64>,
}

/// Check that a referenced message exists and lives in `topic_id`.
async fn same_topic_reference(
    state: &AppState,
    reference: Option<i64>,
    topic_id: i64,
) -> ApiResult<Option<i64>> {
    let Some(id) = reference else {
        return Ok(None);
    };
    let referenced = db::get_message(state.db.pool(), id)
        .await?
        .ok_or_else(|| ApiError::bad_request("Referenced message not found"))?;
    if referenced.topic_id != topic_id {
        return Err(ApiError::bad_request(
            "Referenced message belongs to another topic",
        ));
    }
    Ok(Some(referenced.id))
}

async fn create_message(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(topic_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<CreateMessageRequest>,
) -> ApiResult<(StatusCode, Json<MessageView>)> {
    let topic = db::get_topic(state.db.pool(), topic_id)
        .await?
        .ok_or_else(|| ApiError::bad_request("Topic not found"))?;

    let (content, image_urls) =
        rules::message_body(req.content.as_deref(), req.image_urls.as_deref())?;

    let parent_message_id = same_topic_reference(&state, req.parent_message_id, topic.id).await?;
    let quoted_message_id = same_topic_reference(&state, req.quoted_message_id, topic.id).await?;

    let message = NewForumMessage {
        topic_id: topic.id,
        avatar_color: rules::avatar_color(&identity.username).to_string(),
        author: identity.username,
        content,
        image_urls,
        parent_message_id: parent_message_id.or(quoted_message_id),
        quoted_message_id,
    };
    let created = db::create_message(state.db.pool(), &message).await?;
    info!(
        message_id = created.id,
        topic_id = created.topic_id,
        author = %created.author,
        "Message posted"
    );

    let view = view_with_quote(&state, created).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMessageRequest {
    pub content: Option<String>,
    pub image_urls: Option<Vec<String>>,
}

/// Edit a message. Only its author or an admin may do so.
async fn update_message(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateMessageRequest>,
) -> ApiResult<Json<MessageView>> {
    let pool = state.db.pool();
    let message = db::get_message(pool, id)
        .await?
        .ok_or_else(|| ApiError::bad_request("Message not found"))?;

    if message.author != identity.username && !identity.is_admin() {
        return Err(ApiError::forbidden("You can edit only your own messages"));
    }

    let (content, image_urls) =
        rules::message_body(req.content.as_deref(), req.image_urls.as_deref())?;

    let updated = db::update_message(pool, id, &content, &image_urls)
        .await?
        .ok_or_else(|| ApiError::bad_request("Message not found"))?;

    Ok(Json(view_with_quote(&state, updated).await?))
}

async fn delete_message(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !db::delete_message(state.db.pool(), id).await? {
        return Err(ApiError::bad_request("Message not found"));
    }
    info!(message_id = id, by = %identity.username, "Message deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn react(
    state: &AppState,
    message_id: i64,
    user_id: i64,
    kind: ReactionKind,
) -> ApiResult<ReactionCounts> {
    db::add_reaction(state.db.pool(), message_id, user_id, kind)
        .await?
        .ok_or_else(|| ApiError::bad_request("Message not found"))
}

async fn like_message(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ReactionCounts>> {
    Ok(Json(react(&state, id, identity.user_id, ReactionKind::Like).await?))
}

async fn dislike_message(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ReactionCounts>> {
    Ok(Json(
        react(&state, id, identity.user_id, ReactionKind::Dislike).await?,
    ))
}

// ========== Uploads ==========

async fn upload_image(
    State(state): State<AppState>,
    CurrentUser(identity): CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut multipart = multipart?;
    let file = read_file_field(&mut multipart, "file").await?;
    let url = store_image(&state.config.uploads_dir, UploadKind::Forum, &file).await?;
    info!(url = %url, by = %identity.username, "Forum image uploaded");
    Ok((StatusCode::CREATED, Json(json!({ "url": url }))))
}

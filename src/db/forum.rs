//! Forum topics, messages and reactions.
//!
//! Reply and reaction counters are derived columns: every mutation that can
//! change them recounts from the source rows in the same transaction.

use anyhow::{Context, Result};
use sqlx::{SqliteConnection, SqlitePool};

use super::models::{
    ForumMessage, ForumTopic, NewForumMessage, NewForumTopic, ReactionCounts, ReactionKind,
};
use super::queries::now_timestamp;

// ========== Topics ==========

/// List a game's topics, newest first.
pub async fn list_topics_by_game(pool: &SqlitePool, game_id: i64) -> Result<Vec<ForumTopic>> {
    sqlx::query_as("SELECT * FROM forum_topics WHERE game_id = ? ORDER BY id DESC")
        .bind(game_id)
        .fetch_all(pool)
        .await
        .context("Failed to list topics")
}

/// Get a topic by id.
pub async fn get_topic(pool: &SqlitePool, id: i64) -> Result<Option<ForumTopic>> {
    sqlx::query_as("SELECT * FROM forum_topics WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get topic")
}

/// Topics across all games ordered by most recent activity.
pub async fn latest_topics(pool: &SqlitePool, limit: i64) -> Result<Vec<ForumTopic>> {
    sqlx::query_as(
        r"
        SELECT * FROM forum_topics
        ORDER BY last_activity_at DESC, id DESC
        LIMIT ?
        ",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to get latest topics")
}

/// Insert a topic with no messages.
pub async fn create_topic(pool: &SqlitePool, topic: &NewForumTopic) -> Result<ForumTopic> {
    let now = now_timestamp();
    sqlx::query_as(
        r"
        INSERT INTO forum_topics (game_id, title, description, author, icon, replies, created_at, last_activity_at)
        VALUES (?, ?, ?, ?, ?, 0, ?, ?)
        RETURNING *
        ",
    )
    .bind(topic.game_id)
    .bind(&topic.title)
    .bind(&topic.description)
    .bind(&topic.author)
    .bind(&topic.icon)
    .bind(&now)
    .bind(&now)
    .fetch_one(pool)
    .await
    .context("Failed to create topic")
}

/// Delete a topic together with its messages and their reactions.
pub async fn delete_topic(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM forum_topics WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete topic")?;
    Ok(result.rows_affected() > 0)
}

/// Number of topics opened by `author`.
pub async fn count_topics_by_author(pool: &SqlitePool, author: &str) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM forum_topics WHERE author = ?")
        .bind(author)
        .fetch_one(pool)
        .await
        .context("Failed to count topics by author")?;
    Ok(row.0)
}

// ========== Messages ==========

/// Messages of a topic in posting order.
pub async fn list_messages(pool: &SqlitePool, topic_id: i64) -> Result<Vec<ForumMessage>> {
    sqlx::query_as("SELECT * FROM forum_messages WHERE topic_id = ? ORDER BY id ASC")
        .bind(topic_id)
        .fetch_all(pool)
        .await
        .context("Failed to list messages")
}

/// Get a message by id.
pub async fn get_message(pool: &SqlitePool, id: i64) -> Result<Option<ForumMessage>> {
    sqlx::query_as("SELECT * FROM forum_messages WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get message")
}

/// Number of messages posted by `author`.
pub async fn count_messages_by_author(pool: &SqlitePool, author: &str) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM forum_messages WHERE author = ?")
        .bind(author)
        .fetch_one(pool)
        .await
        .context("Failed to count messages by author")?;
    Ok(row.0)
}

async fn recount_message_replies(conn: &mut SqliteConnection, message_id: i64) -> Result<()> {
    sqlx::query(
        r"
        UPDATE forum_messages
        SET replies = (SELECT COUNT(*) FROM forum_messages c WHERE c.parent_message_id = ?)
        WHERE id = ?
        ",
    )
    .bind(message_id)
    .bind(message_id)
    .execute(conn)
    .await
    .context("Failed to recount message replies")?;
    Ok(())
}

async fn recount_topic(conn: &mut SqliteConnection, topic_id: i64, now: &str) -> Result<()> {
    sqlx::query(
        r"
        UPDATE forum_topics
        SET replies = (SELECT COUNT(*) FROM forum_messages m WHERE m.topic_id = ?),
            last_activity_at = ?
        WHERE id = ?
        ",
    )
    .bind(topic_id)
    .bind(now)
    .bind(topic_id)
    .execute(conn)
    .await
    .context("Failed to recount topic replies")?;
    Ok(())
}

/// Insert a message, then recount the parent's and the topic's replies and
/// touch the topic's activity time, atomically.
pub async fn create_message(pool: &SqlitePool, message: &NewForumMessage) -> Result<ForumMessage> {
    let now = now_timestamp();
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin message transaction")?;

    let inserted: ForumMessage = sqlx::query_as(
        r"
        INSERT INTO forum_messages
            (topic_id, author, avatar_color, content, image_urls, parent_message_id,
             quoted_message_id, likes, dislikes, replies, created_at, edited_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, 0, ?, NULL)
        RETURNING *
        ",
    )
    .bind(message.topic_id)
    .bind(&message.author)
    .bind(&message.avatar_color)
    .bind(&message.content)
    .bind(message.image_urls.join("\n"))
    .bind(message.parent_message_id)
    .bind(message.quoted_message_id)
    .bind(&now)
    .fetch_one(&mut *tx)
    .await
    .context("Failed to insert message")?;

    if let Some(parent_id) = inserted.parent_message_id {
        recount_message_replies(&mut tx, parent_id).await?;
    }
    recount_topic(&mut tx, inserted.topic_id, &now).await?;

    tx.commit()
        .await
        .context("Failed to commit message transaction")?;

    Ok(inserted)
}

/// Replace a message's text and images, mark it edited and touch the topic.
pub async fn update_message(
    pool: &SqlitePool,
    id: i64,
    content: &str,
    image_urls: &[String],
) -> Result<Option<ForumMessage>> {
    let now = now_timestamp();
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin message update transaction")?;

    let updated: Option<ForumMessage> = sqlx::query_as(
        r"
        UPDATE forum_messages SET content = ?, image_urls = ?, edited_at = ?
        WHERE id = ?
        RETURNING *
        ",
    )
    .bind(content)
    .bind(image_urls.join("\n"))
    .bind(&now)
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .context("Failed to update message")?;

    if let Some(message) = &updated {
        sqlx::query("UPDATE forum_topics SET last_activity_at = ? WHERE id = ?")
            .bind(&now)
            .bind(message.topic_id)
            .execute(&mut *tx)
            .await
            .context("Failed to touch topic activity")?;
    }

    tx.commit()
        .await
        .context("Failed to commit message update transaction")?;

    Ok(updated)
}

/// Delete a message and recount the counters it contributed to. Replies to
/// the deleted message stay in the topic with their parent reference cleared.
pub async fn delete_message(pool: &SqlitePool, id: i64) -> Result<bool> {
    let now = now_timestamp();
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin message delete transaction")?;

    let deleted: Option<(i64, Option<i64>)> = sqlx::query_as(
        "DELETE FROM forum_messages WHERE id = ? RETURNING topic_id, parent_message_id",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await
    .context("Failed to delete message")?;

    let Some((topic_id, parent_id)) = deleted else {
        return Ok(false);
    };

    if let Some(parent_id) = parent_id {
        recount_message_replies(&mut tx, parent_id).await?;
    }
    recount_topic(&mut tx, topic_id, &now).await?;

    tx.commit()
        .await
        .context("Failed to commit message delete transaction")?;

    Ok(true)
}

// ========== Reactions ==========

/// Record a reaction by `user_id` and recount the message's like/dislike
/// columns. Returns `None` if the message does not exist.
pub async fn add_reaction(
    pool: &SqlitePool,
    message_id: i64,
    user_id: i64,
    kind: ReactionKind,
) -> Result<Option<ReactionCounts>> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin reaction transaction")?;

    let inserted = sqlx::query(
        r"
        INSERT INTO forum_reactions (message_id, user_id, kind, created_at)
        SELECT id, ?, ?, ? FROM forum_messages WHERE id = ?
        ",
    )
    .bind(user_id)
    .bind(kind.as_str())
    .bind(now_timestamp())
    .bind(message_id)
    .execute(&mut *tx)
    .await
    .context("Failed to insert reaction")?;

    if inserted.rows_affected() == 0 {
        return Ok(None);
    }

    let (id, likes, dislikes): (i64, i64, i64) = sqlx::query_as(
        r"
        UPDATE forum_messages SET
            likes = (SELECT COUNT(*) FROM forum_reactions r WHERE r.message_id = ? AND r.kind = 'LIKE'),
            dislikes = (SELECT COUNT(*) FROM forum_reactions r WHERE r.message_id = ? AND r.kind = 'DISLIKE')
        WHERE id = ?
        RETURNING id, likes, dislikes
        ",
    )
    .bind(message_id)
    .bind(message_id)
    .bind(message_id)
    .fetch_one(&mut *tx)
    .await
    .context("Failed to recount reactions")?;

    tx.commit()
        .await
        .context("Failed to commit reaction transaction")?;

    Ok(Some(ReactionCounts {
        message_id: id,
        likes,
        dislikes,
    }))
}

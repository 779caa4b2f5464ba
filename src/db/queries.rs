use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use sqlx::SqlitePool;

use super::models::{
    CommentWithAuthor, Game, GameChanges, NewGame, ProfileChanges, ReviewStatus,
    ReviewWithPublisher, Role, SettingsChanges, User, UserProfile,
};

/// Current time as a fixed-width RFC 3339 string, so text ordering matches
/// chronological ordering.
#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ========== Users ==========

/// Create a user and return its id.
pub async fn create_user(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password_hash: &str,
    role: Role,
) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO users (username, email, password_hash, role, created_at)
        VALUES (?, ?, ?, ?, ?)
        ",
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(role.as_str())
    .bind(now_timestamp())
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(result.last_insert_rowid())
}

/// Get user by id.
pub async fn get_user_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by id")
}

/// Get user by username (case-sensitive).
pub async fn get_user_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by username")
}

/// Get user by e-mail. Callers pass the lower-cased address.
pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")
}

/// Check whether a username is taken.
pub async fn username_exists(pool: &SqlitePool, username: &str) -> Result<bool> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(username)
        .fetch_one(pool)
        .await
        .context("Failed to check username")?;
    Ok(row.0 > 0)
}

/// Check whether an e-mail address is taken.
pub async fn email_exists(pool: &SqlitePool, email: &str) -> Result<bool> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(pool)
        .await
        .context("Failed to check email")?;
    Ok(row.0 > 0)
}

/// Change a user's role.
pub async fn update_user_role(pool: &SqlitePool, user_id: i64, role: Role) -> Result<()> {
    sqlx::query("UPDATE users SET role = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to update user role")?;
    Ok(())
}

// ========== Games ==========

/// Insert a catalog entry with an empty rating aggregate.
pub async fn create_game(pool: &SqlitePool, game: &NewGame) -> Result<i64> {
    let now = now_timestamp();
    let result = sqlx::query(
        r"
        INSERT INTO games (slug, title, description, cover_url, created_at, updated_at, rating_avg, rating_cnt)
        VALUES (?, ?, ?, ?, ?, ?, 0, 0)
        ",
    )
    .bind(&game.slug)
    .bind(&game.title)
    .bind(&game.description)
    .bind(&game.cover_url)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .context("Failed to create game")?;

    Ok(result.last_insert_rowid())
}

/// Get a game by slug.
pub async fn get_game_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Game>> {
    sqlx::query_as("SELECT * FROM games WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .context("Failed to get game by slug")
}

/// Get a game by id.
pub async fn get_game_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Game>> {
    sqlx::query_as("SELECT * FROM games WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get game by id")
}

/// Check whether a slug is taken.
pub async fn slug_exists(pool: &SqlitePool, slug: &str) -> Result<bool> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM games WHERE slug = ?")
        .bind(slug)
        .fetch_one(pool)
        .await
        .context("Failed to check slug")?;
    Ok(row.0 > 0)
}

/// List games, newest first.
pub async fn list_games(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<Game>> {
    sqlx::query_as(
        r"
        SELECT * FROM games
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        ",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list games")
}

/// Count catalog entries.
pub async fn count_games(pool: &SqlitePool) -> Result<i64> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM games")
        .fetch_one(pool)
        .await
        .context("Failed to count games")?;
    Ok(row.0)
}

/// Apply a partial update and touch `updated_at`.
pub async fn update_game(pool: &SqlitePool, id: i64, changes: &GameChanges) -> Result<()> {
    sqlx::query(
        r"
        UPDATE games SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            cover_url = COALESCE(?, cover_url),
            updated_at = ?
        WHERE id = ?
        ",
    )
    .bind(changes.title.as_deref())
    .bind(changes.description.as_deref())
    .bind(changes.cover_url.as_deref())
    .bind(now_timestamp())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update game")?;
    Ok(())
}

/// Delete a game; ratings, comments, the review and forum topics cascade.
pub async fn delete_game(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM games WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete game")?;
    Ok(result.rows_affected() > 0)
}

// ========== Comments ==========

const COMMENT_COLUMNS: &str = r"
    SELECT c.id, c.game_id, c.user_id, u.username, c.content, c.created_at, c.is_deleted
    FROM comments c
    JOIN users u ON u.id = c.user_id
";

/// List visible comments of a game, newest first.
pub async fn list_comments(
    pool: &SqlitePool,
    game_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<CommentWithAuthor>> {
    sqlx::query_as(&format!(
        "{COMMENT_COLUMNS} WHERE c.game_id = ? AND c.is_deleted = 0 \
         ORDER BY c.created_at DESC, c.id DESC LIMIT ? OFFSET ?"
    ))
    .bind(game_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list comments")
}

/// Count visible comments of a game.
pub async fn count_comments(pool: &SqlitePool, game_id: i64) -> Result<i64> {
    let row: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM comments WHERE game_id = ? AND is_deleted = 0")
            .bind(game_id)
            .fetch_one(pool)
            .await
            .context("Failed to count comments")?;
    Ok(row.0)
}

/// Get a comment, including soft-deleted ones.
pub async fn get_comment(pool: &SqlitePool, id: i64) -> Result<Option<CommentWithAuthor>> {
    sqlx::query_as(&format!("{COMMENT_COLUMNS} WHERE c.id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get comment")
}

/// Insert a comment and return it with its author.
pub async fn create_comment(
    pool: &SqlitePool,
    game_id: i64,
    user_id: i64,
    content: &str,
) -> Result<CommentWithAuthor> {
    let result = sqlx::query(
        r"
        INSERT INTO comments (game_id, user_id, content, created_at, is_deleted)
        VALUES (?, ?, ?, ?, 0)
        ",
    )
    .bind(game_id)
    .bind(user_id)
    .bind(content)
    .bind(now_timestamp())
    .execute(pool)
    .await
    .context("Failed to create comment")?;

    get_comment(pool, result.last_insert_rowid())
        .await?
        .context("Inserted comment not found")
}

/// Flag a comment as deleted. The row stays for referential integrity.
pub async fn soft_delete_comment(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE comments SET is_deleted = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete comment")?;
    Ok(())
}

// ========== Reviews ==========

const REVIEW_COLUMNS: &str = r"
    SELECT r.id, r.game_id, r.publisher_id, u.username AS publisher_username,
           r.title, r.content, r.status, r.created_at, r.updated_at
    FROM reviews r
    JOIN users u ON u.id = r.publisher_id
";

/// Get the review of a game in any state.
pub async fn get_review_by_game(
    pool: &SqlitePool,
    game_id: i64,
) -> Result<Option<ReviewWithPublisher>> {
    sqlx::query_as(&format!("{REVIEW_COLUMNS} WHERE r.game_id = ?"))
        .bind(game_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get review")
}

/// Get the review of a game only if it is published.
pub async fn get_published_review(
    pool: &SqlitePool,
    game_id: i64,
) -> Result<Option<ReviewWithPublisher>> {
    sqlx::query_as(&format!(
        "{REVIEW_COLUMNS} WHERE r.game_id = ? AND r.status = ?"
    ))
    .bind(game_id)
    .bind(ReviewStatus::Published.as_str())
    .fetch_optional(pool)
    .await
    .context("Failed to get published review")
}

/// Create the game's review as a draft, or replace the text of the existing
/// one. The status and original publisher of an existing review are kept.
pub async fn upsert_review(
    pool: &SqlitePool,
    game_id: i64,
    publisher_id: i64,
    title: &str,
    content: &str,
) -> Result<ReviewWithPublisher> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin review transaction")?;
    let now = now_timestamp();

    sqlx::query(
        r"
        INSERT INTO reviews (game_id, publisher_id, title, content, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(game_id) DO UPDATE SET
            title = excluded.title,
            content = excluded.content,
            updated_at = excluded.updated_at
        ",
    )
    .bind(game_id)
    .bind(publisher_id)
    .bind(title)
    .bind(content)
    .bind(ReviewStatus::Draft.as_str())
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .context("Failed to upsert review")?;

    let review: ReviewWithPublisher = sqlx::query_as(&format!("{REVIEW_COLUMNS} WHERE r.game_id = ?"))
        .bind(game_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to reload review")?;

    tx.commit()
        .await
        .context("Failed to commit review transaction")?;

    Ok(review)
}

/// Move a review between draft and published. Returns `None` if the game has
/// no review.
pub async fn set_review_status(
    pool: &SqlitePool,
    game_id: i64,
    status: ReviewStatus,
) -> Result<Option<ReviewWithPublisher>> {
    let result = sqlx::query("UPDATE reviews SET status = ?, updated_at = ? WHERE game_id = ?")
        .bind(status.as_str())
        .bind(now_timestamp())
        .bind(game_id)
        .execute(pool)
        .await
        .context("Failed to update review status")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    get_review_by_game(pool, game_id).await
}

// ========== Profiles ==========

/// Get the stored profile of a user, if one was ever saved.
pub async fn get_user_profile(pool: &SqlitePool, user_id: i64) -> Result<Option<UserProfile>> {
    sqlx::query_as("SELECT * FROM user_profiles WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user profile")
}

async fn ensure_profile_row(
    conn: &mut sqlx::SqliteConnection,
    user_id: i64,
    now: &str,
) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO user_profiles (user_id, updated_at) VALUES (?, ?)
        ON CONFLICT(user_id) DO NOTHING
        ",
    )
    .bind(user_id)
    .bind(now)
    .execute(conn)
    .await
    .context("Failed to create profile row")?;
    Ok(())
}

/// Replace bio, city and favourite games.
pub async fn update_user_profile(
    pool: &SqlitePool,
    user_id: i64,
    changes: &ProfileChanges,
) -> Result<UserProfile> {
    let favorite_games =
        serde_json::to_string(&changes.favorite_games).context("Failed to encode favourite games")?;
    let now = now_timestamp();

    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin profile transaction")?;

    ensure_profile_row(&mut tx, user_id, &now).await?;

    let profile = sqlx::query_as(
        r"
        UPDATE user_profiles SET bio = ?, city = ?, favorite_games = ?, updated_at = ?
        WHERE user_id = ?
        RETURNING *
        ",
    )
    .bind(&changes.bio)
    .bind(&changes.city)
    .bind(favorite_games)
    .bind(&now)
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await
    .context("Failed to update profile")?;

    tx.commit()
        .await
        .context("Failed to commit profile transaction")?;

    Ok(profile)
}

/// Apply account settings: e-mail and password on the account, preference
/// flags on the profile, all in one transaction.
pub async fn update_account_settings(
    pool: &SqlitePool,
    user_id: i64,
    changes: &SettingsChanges,
) -> Result<UserProfile> {
    let now = now_timestamp();
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin settings transaction")?;

    if let Some(email) = &changes.email {
        sqlx::query("UPDATE users SET email = ? WHERE id = ?")
            .bind(email)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("Failed to update email")?;
    }

    if let Some(password_hash) = &changes.password_hash {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("Failed to update password")?;
    }

    ensure_profile_row(&mut tx, user_id, &now).await?;

    let profile = sqlx::query_as(
        r"
        UPDATE user_profiles SET
            email_notifications = COALESCE(?, email_notifications),
            public_profile = COALESCE(?, public_profile),
            updated_at = ?
        WHERE user_id = ?
        RETURNING *
        ",
    )
    .bind(changes.email_notifications)
    .bind(changes.public_profile)
    .bind(&now)
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await
    .context("Failed to update profile settings")?;

    tx.commit()
        .await
        .context("Failed to commit settings transaction")?;

    Ok(profile)
}

/// Point the profile at a freshly uploaded avatar.
pub async fn update_avatar_url(
    pool: &SqlitePool,
    user_id: i64,
    avatar_url: &str,
) -> Result<UserProfile> {
    let now = now_timestamp();
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin avatar transaction")?;

    ensure_profile_row(&mut tx, user_id, &now).await?;

    let profile = sqlx::query_as(
        "UPDATE user_profiles SET avatar_url = ?, updated_at = ? WHERE user_id = ? RETURNING *",
    )
    .bind(avatar_url)
    .bind(&now)
    .bind(user_id)
    .fetch_one(&mut *tx)
    .await
    .context("Failed to update avatar")?;

    tx.commit()
        .await
        .context("Failed to commit avatar transaction")?;

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_timestamp_fixed_width() {
        let a = now_timestamp();
        assert!(a.ends_with('Z'));
        // 2024-01-01T00:00:00.000000Z
        assert_eq!(a.len(), 27);
    }
}

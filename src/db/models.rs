use serde::{Deserialize, Serialize};

/// Authorization role attached to every account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Publisher,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Publisher => "PUBLISHER",
            Self::Admin => "ADMIN",
        }
    }

    /// Parse a role name, ignoring surrounding whitespace and case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "USER" => Some(Self::User),
            "PUBLISHER" => Some(Self::Publisher),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: String,
}

impl User {
    /// Stored role; unknown values fall back to the least privileged role.
    #[must_use]
    pub fn role_enum(&self) -> Role {
        Role::parse(&self.role).unwrap_or(Role::User)
    }
}

/// A catalog entry with its cached rating aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Game {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub cover_url: String,
    pub created_at: String,
    pub updated_at: String,
    pub rating_avg: f64,
    pub rating_cnt: i64,
}

/// Fields for a new catalog entry.
#[derive(Debug, Clone)]
pub struct NewGame {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub cover_url: String,
}

/// Partial update of a catalog entry; `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct GameChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover_url: Option<String>,
}

/// One user's score for one game.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rating {
    pub id: i64,
    pub game_id: i64,
    pub user_id: i64,
    pub value: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Cached average/count written onto the game row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingAggregate {
    pub rating_avg: f64,
    pub rating_cnt: i64,
}

/// A game comment joined with its author's username.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommentWithAuthor {
    pub id: i64,
    pub game_id: i64,
    pub user_id: i64,
    pub username: String,
    pub content: String,
    pub created_at: String,
    pub is_deleted: bool,
}

/// Review visibility state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewStatus {
    Draft,
    Published,
}

impl ReviewStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Published => "PUBLISHED",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "DRAFT" => Some(Self::Draft),
            "PUBLISHED" => Some(Self::Published),
            _ => None,
        }
    }
}

/// A publisher review joined with the publisher's username.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReviewWithPublisher {
    pub id: i64,
    pub game_id: i64,
    pub publisher_id: i64,
    pub publisher_username: String,
    pub title: String,
    pub content: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ReviewWithPublisher {
    #[must_use]
    pub fn status_enum(&self) -> ReviewStatus {
        ReviewStatus::from_str(&self.status).unwrap_or(ReviewStatus::Draft)
    }
}

/// A forum topic attached to a game.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ForumTopic {
    pub id: i64,
    pub game_id: i64,
    pub title: String,
    pub description: String,
    pub author: String,
    pub icon: String,
    pub replies: i64,
    pub created_at: String,
    pub last_activity_at: String,
}

/// Fields for a new forum topic, already sanitized.
#[derive(Debug, Clone)]
pub struct NewForumTopic {
    pub game_id: i64,
    pub title: String,
    pub description: String,
    pub author: String,
    pub icon: String,
}

/// A message posted in a forum topic.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ForumMessage {
    pub id: i64,
    pub topic_id: i64,
    pub author: String,
    pub avatar_color: String,
    pub content: String,
    /// Newline separated list of image URLs.
    pub image_urls: String,
    pub parent_message_id: Option<i64>,
    pub quoted_message_id: Option<i64>,
    pub likes: i64,
    pub dislikes: i64,
    pub replies: i64,
    pub created_at: String,
    pub edited_at: Option<String>,
}

impl ForumMessage {
    #[must_use]
    pub fn image_url_list(&self) -> Vec<String> {
        self.image_urls
            .lines()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Fields for a new forum message, already sanitized and reference-checked
/// against the topic.
#[derive(Debug, Clone)]
pub struct NewForumMessage {
    pub topic_id: i64,
    pub author: String,
    pub avatar_color: String,
    pub content: String,
    pub image_urls: Vec<String>,
    pub parent_message_id: Option<i64>,
    pub quoted_message_id: Option<i64>,
}

/// Kind of reaction left on a forum message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl ReactionKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "LIKE",
            Self::Dislike => "DISLIKE",
        }
    }
}

/// Reaction counters of one message after a reaction was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionCounts {
    pub message_id: i64,
    pub likes: i64,
    pub dislikes: i64,
}

/// Profile data kept alongside an account.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub user_id: i64,
    pub avatar_url: String,
    pub bio: String,
    pub city: String,
    /// JSON array of game titles.
    pub favorite_games: String,
    pub email_notifications: bool,
    pub public_profile: bool,
    pub updated_at: String,
}

impl UserProfile {
    /// Profile shown for accounts that never saved one.
    #[must_use]
    pub fn defaults(user_id: i64) -> Self {
        Self {
            user_id,
            avatar_url: String::new(),
            bio: String::new(),
            city: String::new(),
            favorite_games: "[]".to_string(),
            email_notifications: true,
            public_profile: true,
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[must_use]
    pub fn favorite_game_list(&self) -> Vec<String> {
        serde_json::from_str(&self.favorite_games).unwrap_or_default()
    }
}

/// Profile fields replaced by `PUT /api/me/profile`.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub bio: String,
    pub city: String,
    pub favorite_games: Vec<String>,
}

/// Account settings changes; `None` leaves the value unchanged.
#[derive(Debug, Clone, Default)]
pub struct SettingsChanges {
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub email_notifications: Option<bool>,
    pub public_profile: Option<bool>,
}

//! Per-user game ratings and the cached aggregate on the game row.
//!
//! Every rating write recomputes `games.rating_avg` / `games.rating_cnt` from
//! the full set of rating rows inside the same transaction, so the cache is
//! never observable out of step with the ratings it summarizes.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::{Rating, RatingAggregate};
use super::queries::now_timestamp;

/// Lowest accepted rating value.
pub const MIN_RATING: i64 = 1;
/// Highest accepted rating value.
pub const MAX_RATING: i64 = 10;

/// Round a non-negative value to two decimal places, halves up.
///
/// The input is first snapped to an integer count of nano-units so that
/// binary noise in averages such as `2.675` (stored as `2.67499999...`)
/// rounds the way the decimal value would.
#[must_use]
pub fn round_half_up_2(value: f64) -> f64 {
    let nanos = (value * 1e9).round() as i64;
    let hundredths = (nanos + 5_000_000).div_euclid(10_000_000);
    hundredths as f64 / 100.0
}

/// Insert or replace `user_id`'s rating of `game_id` and refresh the game's
/// cached aggregate.
///
/// The upsert is the first statement of the transaction, so SQLite grants the
/// write lock before the aggregate is read. Concurrent submissions for the
/// same game therefore run one after another and each recompute sees every
/// previously committed rating.
pub async fn set_rating(
    pool: &SqlitePool,
    game_id: i64,
    user_id: i64,
    value: i64,
) -> Result<RatingAggregate> {
    anyhow::ensure!(
        (MIN_RATING..=MAX_RATING).contains(&value),
        "rating value {value} outside {MIN_RATING}..={MAX_RATING}"
    );

    let now = now_timestamp();
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin rating transaction")?;

    sqlx::query(
        r"
        INSERT INTO ratings (game_id, user_id, value, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(game_id, user_id) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        ",
    )
    .bind(game_id)
    .bind(user_id)
    .bind(value)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await
    .context("Failed to upsert rating")?;

    let (avg, count): (f64, i64) = sqlx::query_as(
        "SELECT COALESCE(AVG(value), 0.0), COUNT(*) FROM ratings WHERE game_id = ?",
    )
    .bind(game_id)
    .fetch_one(&mut *tx)
    .await
    .context("Failed to aggregate ratings")?;

    let aggregate = RatingAggregate {
        rating_avg: round_half_up_2(avg),
        rating_cnt: count,
    };

    sqlx::query("UPDATE games SET rating_avg = ?, rating_cnt = ? WHERE id = ?")
        .bind(aggregate.rating_avg)
        .bind(aggregate.rating_cnt)
        .bind(game_id)
        .execute(&mut *tx)
        .await
        .context("Failed to store rating aggregate")?;

    tx.commit()
        .await
        .context("Failed to commit rating transaction")?;

    Ok(aggregate)
}

/// Get a user's rating of a game.
pub async fn get_rating(pool: &SqlitePool, game_id: i64, user_id: i64) -> Result<Option<Rating>> {
    sqlx::query_as("SELECT * FROM ratings WHERE game_id = ? AND user_id = ?")
        .bind(game_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get rating")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_up() {
        assert!((round_half_up_2(7.0) - 7.0).abs() < f64::EPSILON);
        assert!((round_half_up_2(2.675) - 2.68).abs() < 1e-9);
        assert!((round_half_up_2(1.005) - 1.01).abs() < 1e-9);
        assert!((round_half_up_2(20.0 / 3.0) - 6.67).abs() < 1e-9);
        assert!((round_half_up_2(10.0 / 3.0) - 3.33).abs() < 1e-9);
        assert!((round_half_up_2(0.0)).abs() < f64::EPSILON);
    }
}

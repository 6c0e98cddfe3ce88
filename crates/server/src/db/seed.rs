// First-boot demo data: a fixed set of users and a bundle of comment texts.

use pinboard_types::DEFAULT_FILE_ID;
use rand::Rng;

use super::{models::timestamp, Database};
use crate::{config::Config, routes::auth::hash_password};

pub const SEED_USERNAMES: [&str; 4] = ["udi", "jonathan", "shimi", "yotam"];

const BUNDLED_COMMENTS: &str = include_str!("../../seed/comments-seed.txt");

pub async fn run(db: &Database, config: &Config) -> anyhow::Result<()> {
    seed_users(db, &config.seed_password).await?;

    let texts = match &config.seed_comments_path {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => BUNDLED_COMMENTS.to_string(),
    };
    seed_comments(db, &texts).await?;

    Ok(())
}

async fn seed_users(db: &Database, password: &str) -> anyhow::Result<()> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(&db.pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    // Every demo user shares one password, so hash once
    let password_hash = hash_password(password)?;
    let now = timestamp();

    let mut tx = db.pool.begin().await?;
    for username in SEED_USERNAMES {
        sqlx::query("INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)")
            .bind(username)
            .bind(&password_hash)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    tracing::info!("Seeded users: {}", SEED_USERNAMES.join(", "));
    Ok(())
}

async fn seed_comments(db: &Database, texts: &str) -> anyhow::Result<()> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments")
        .fetch_one(&db.pool)
        .await?;
    if existing > 0 {
        return Ok(());
    }

    let user_ids = sqlx::query_scalar::<_, i64>("SELECT id FROM users ORDER BY id")
        .fetch_all(&db.pool)
        .await?;
    if user_ids.is_empty() {
        anyhow::bail!("cannot seed comments without users");
    }

    let lines: Vec<&str> = texts
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    // Integer coordinates in [0, 1000), authors assigned round-robin
    let placements: Vec<(f64, f64)> = {
        let mut rng = rand::thread_rng();
        lines
            .iter()
            .map(|_| {
                (
                    f64::from(rng.gen_range(0..1000_u32)),
                    f64::from(rng.gen_range(0..1000_u32)),
                )
            })
            .collect()
    };

    let mut tx = db.pool.begin().await?;
    for (index, (text, (x, y))) in lines.iter().zip(placements).enumerate() {
        let now = timestamp();
        sqlx::query(
            "INSERT INTO comments (file_id, user_id, text_content, x_coord, y_coord, type, parent_id, created_at, date_last_updated) VALUES (?, ?, ?, ?, ?, 'comment', NULL, ?, ?)",
        )
        .bind(DEFAULT_FILE_ID)
        .bind(user_ids[index % user_ids.len()])
        .bind(*text)
        .bind(x)
        .bind(y)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!("Seeded {} comments", lines.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn migrated() -> Database {
        let db = Database::in_memory().await.unwrap();
        db.run_migrations().await.unwrap();
        db
    }

    #[tokio::test]
    async fn seeds_users_and_comments_once() {
        let db = migrated().await;
        let config = Config::default();

        run(&db, &config).await.unwrap();
        run(&db, &config).await.unwrap();

        let users = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(users, SEED_USERNAMES.len() as i64);

        let expected = BUNDLED_COMMENTS.lines().filter(|l| !l.trim().is_empty()).count();
        let comments = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        assert_eq!(comments, expected as i64);
    }

    #[tokio::test]
    async fn seeded_comments_are_in_range_and_round_robin() {
        let db = migrated().await;
        seed_users(&db, "pw").await.unwrap();
        seed_comments(&db, "a\n\nb\nc\nd\ne\n").await.unwrap();

        let rows = sqlx::query_as::<_, (i64, f64, f64, String)>(
            "SELECT user_id, x_coord, y_coord, type FROM comments ORDER BY id",
        )
        .fetch_all(&db.pool)
        .await
        .unwrap();

        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].0, rows[4].0);
        assert_ne!(rows[0].0, rows[1].0);
        for (_, x, y, kind) in rows {
            assert!((0.0..1000.0).contains(&x));
            assert!((0.0..1000.0).contains(&y));
            assert_eq!(kind, "comment");
        }
    }
}

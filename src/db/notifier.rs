use chrono::Utc;

use crate::alerts::{NotificationChannel, NotificationDispatcher};
use crate::db::models::to_millis;
use crate::error::Result;

/// Stores in-app notifications and queues emails for the external sender.
#[derive(Clone)]
pub struct SqliteNotifier {
    pool: sqlx::SqlitePool,
}

impl SqliteNotifier {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

impl NotificationDispatcher for SqliteNotifier {
    async fn notify(
        &self,
        user_id: &str,
        channel: NotificationChannel,
        title: &str,
        message: &str,
    ) -> Result<()> {
        let now = to_millis(Utc::now());
        let sql = match channel {
            NotificationChannel::InApp => {
                "INSERT INTO notifications (user_id, title, message, created_at) VALUES (?, ?, ?, ?)"
            }
            NotificationChannel::Email => {
                "INSERT INTO email_queue (user_id, subject, body, queued_at) VALUES (?, ?, ?, ?)"
            }
        };
        sqlx::query(sql)
            .bind(user_id)
            .bind(title)
            .bind(message)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn channels_land_in_their_tables() {
        let pool = test_pool().await;
        let notifier = SqliteNotifier::new(pool.clone());

        notifier
            .notify("u1", NotificationChannel::InApp, "Viral post detected", "post p1 hit 8x")
            .await
            .unwrap();
        notifier
            .notify("u1", NotificationChannel::Email, "Viral post detected", "post p1 hit 8x")
            .await
            .unwrap();
        notifier
            .notify("u2", NotificationChannel::Email, "Growth stall", "velocity 1.2")
            .await
            .unwrap();

        let (in_app,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE read_at IS NULL")
            .fetch_one(&pool)
            .await
            .unwrap();
        let (queued,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM email_queue WHERE sent_at IS NULL")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!((in_app, queued), (1, 2));
    }
}

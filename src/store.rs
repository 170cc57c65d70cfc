//! Append-only record store. Every produced value is written with the
//! tier that produced it; records are never updated or deleted.

use std::sync::Arc;

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::dispatch::Tier;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LatestAnswer {
    pub question: String,
    pub answer: String,
}

#[derive(Clone)]
pub struct TaskStore {
    db: Arc<Mutex<Connection>>,
}

impl TaskStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    pub async fn record_answer(
        &self,
        question: &str,
        answer: &str,
        context: Option<&str>,
        tier: Tier,
    ) -> Result<i64> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO qa_history (question, answer, context, tier) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![question, answer, context, tier.as_str()],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// The most recently recorded question/answer pair, if any.
    pub async fn latest_answer(&self) -> Result<Option<LatestAnswer>> {
        let db = self.db.lock().await;
        let latest = db
            .query_row(
                "SELECT question, answer FROM qa_history ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(LatestAnswer {
                        question: row.get(0)?,
                        answer: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(latest)
    }

    pub async fn record_image(&self, prompt: &str, image_data: &str, tier: Tier) -> Result<i64> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO image_records (prompt, image_data, tier) VALUES (?1, ?2, ?3)",
            rusqlite::params![prompt, image_data, tier.as_str()],
        )?;
        Ok(db.last_insert_rowid())
    }

    pub async fn record_content(
        &self,
        prompt: &str,
        platform: &str,
        content: &str,
        tier: Tier,
    ) -> Result<i64> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO content_records (prompt, platform, content, tier) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![prompt, platform, content, tier.as_str()],
        )?;
        Ok(db.last_insert_rowid())
    }
}

#[cfg(test)]
impl TaskStore {
    /// Tier column of the newest row in `table`. Test-only introspection.
    pub(crate) async fn last_tier(&self, table: &str) -> String {
        self.db
            .lock()
            .await
            .query_row(
                &format!("SELECT tier FROM {table} ORDER BY id DESC LIMIT 1"),
                [],
                |r| r.get(0),
            )
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    #[tokio::test]
    async fn latest_answer_on_empty_store_is_none() {
        let store = TaskStore::new(test_db());
        assert!(store.latest_answer().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_answer_returns_most_recent_pair() {
        let store = TaskStore::new(test_db());
        store
            .record_answer("first?", "one", None, Tier::Primary)
            .await
            .unwrap();
        store
            .record_answer("second?", "two", Some("ctx"), Tier::Secondary)
            .await
            .unwrap();

        let latest = store.latest_answer().await.unwrap().unwrap();
        assert_eq!(
            latest,
            LatestAnswer {
                question: "second?".to_string(),
                answer: "two".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn record_ids_increase() {
        let store = TaskStore::new(test_db());
        let a = store
            .record_content("launch", "twitter", "**Tweet 1:** hi", Tier::Fallback)
            .await
            .unwrap();
        let b = store
            .record_content("launch", "twitter", "**Tweet 1:** hi again", Tier::Primary)
            .await
            .unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn image_records_persist_tier() {
        let db = test_db();
        let store = TaskStore::new(db.clone());
        store
            .record_image("cat", "aGVsbG8=", Tier::Fallback)
            .await
            .unwrap();

        let tier: String = db
            .lock()
            .await
            .query_row("SELECT tier FROM image_records LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(tier, "fallback");
    }
}

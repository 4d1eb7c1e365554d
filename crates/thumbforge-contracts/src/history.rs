use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::answers::FormAnswers;
use crate::storage::KeyValueStore;

pub const HISTORY_KEY: &str = "thumbnail_history";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: Uuid,
    /// Data URL of the generated image.
    pub image: String,
    pub prompt: String,
    pub answers: FormAnswers,
    /// Unix milliseconds.
    pub timestamp: i64,
}

impl HistoryItem {
    pub fn new(image: String, prompt: String, answers: FormAnswers) -> Self {
        Self {
            id: Uuid::new_v4(),
            image,
            prompt,
            answers,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn created_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// Newest-first list of past generations, written through to a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    items: Vec<HistoryItem>,
}

impl History {
    /// Reads the persisted list. Missing or malformed content yields an empty
    /// history.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let items = store
            .get(HISTORY_KEY)
            .and_then(|value| match serde_json::from_value::<Vec<HistoryItem>>(value) {
                Ok(items) => Some(items),
                Err(err) => {
                    tracing::debug!("discarding malformed history: {err}");
                    None
                }
            })
            .unwrap_or_default();
        Self { items }
    }

    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&HistoryItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn prepend(&mut self, item: HistoryItem, store: &mut dyn KeyValueStore) {
        self.items.insert(0, item);
        self.persist(store);
    }

    pub fn clear(&mut self, store: &mut dyn KeyValueStore) {
        self.items.clear();
        if let Err(err) = store.remove(HISTORY_KEY) {
            tracing::debug!("history entry not removed: {err:#}");
        }
    }

    fn persist(&self, store: &mut dyn KeyValueStore) {
        let value = match serde_json::to_value(&self.items) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!("history not serialized: {err}");
                return;
            }
        };
        if let Err(err) = store.set(HISTORY_KEY, value) {
            tracing::debug!("history not persisted: {err:#}");
        }
    }
}

impl From<Vec<HistoryItem>> for History {
    fn from(items: Vec<HistoryItem>) -> Self {
        Self { items }
    }
}

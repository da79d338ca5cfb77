use crate::error::{ClientError, ClientResult};
use crate::models::Listing;
use crate::store::{DocumentStore, LISTINGS_PATH};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// The raw `logements` subtree as ordered `(storage key, record)` pairs.
///
/// The store hands the collection back either as an object keyed by storage
/// key or, when the keys happen to be dense integers, as an array that may
/// contain `null` holes. Both shapes normalise to the same entries, with
/// numeric keys in numeric order ahead of any other keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingCollection {
    entries: Vec<(String, Value)>,
}

impl ListingCollection {
    pub fn from_value(value: Option<Value>) -> Self {
        let mut entries: Vec<(String, Value)> = match value {
            Some(Value::Object(map)) => map.into_iter().collect(),
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            Some(other) => {
                warn!("Ignoring unexpected listings payload: {}", other);
                Vec::new()
            }
            None => Vec::new(),
        };
        entries.retain(|(_, v)| !v.is_null());
        entries.sort_by_key(|(key, _)| match key.parse::<u64>() {
            Ok(n) => (0, n),
            Err(_) => (1, 0),
        });
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Typed view of every record, in storage order.
    pub fn listings(&self) -> Vec<Listing> {
        self.entries
            .iter()
            .filter_map(|(key, raw)| match serde_json::from_value::<Listing>(raw.clone()) {
                Ok(listing) => Some(listing),
                Err(err) => {
                    warn!("Skipping malformed listing at key {}: {}", key, err);
                    None
                }
            })
            .collect()
    }

    pub fn owned_by(&self, email: &str) -> Vec<Listing> {
        self.listings()
            .into_iter()
            .filter(|listing| listing.owner == email)
            .collect()
    }

    /// One past the largest numeric storage key, or `"0"` when there is none.
    pub fn next_storage_key(&self) -> String {
        self.entries
            .iter()
            .filter_map(|(key, _)| key.parse::<u64>().ok())
            .max()
            .map(|max| (max + 1).to_string())
            .unwrap_or_else(|| "0".to_string())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Key of the owner's record carrying `id`. Ids are only unique per owner.
    pub fn find_key_by_owner_and_id(&self, owner: &str, id: i64) -> Option<String> {
        self.entries
            .iter()
            .find(|(_, raw)| {
                raw.get("proprietaire").and_then(Value::as_str) == Some(owner) && raw_id(raw) == Some(id)
            })
            .map(|(key, _)| key.clone())
    }

    pub fn find_key_by_owner_and_title(&self, owner: &str, title: &str) -> Option<String> {
        self.entries
            .iter()
            .find(|(_, raw)| {
                raw.get("proprietaire").and_then(Value::as_str) == Some(owner)
                    && raw.get("titre").and_then(Value::as_str) == Some(title)
            })
            .map(|(key, _)| key.clone())
    }

    pub fn insert(&mut self, key: String, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Object-of-objects written back over `logements`.
    pub fn into_value(self) -> Value {
        Value::Object(self.entries.into_iter().collect::<Map<String, Value>>())
    }
}

fn raw_id(raw: &Value) -> Option<i64> {
    let id = raw.get("id")?;
    id.as_i64()
        .or_else(|| id.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Reads and rewrites the whole `logements` collection.
#[derive(Clone)]
pub struct ListingRepository {
    store: Arc<dyn DocumentStore>,
    attempts: u32,
}

impl ListingRepository {
    pub fn new(store: Arc<dyn DocumentStore>, attempts: u32) -> Self {
        Self {
            store,
            attempts: attempts.max(1),
        }
    }

    pub async fn load(&self) -> ClientResult<ListingCollection> {
        let value = self.store.get(LISTINGS_PATH).await?;
        Ok(ListingCollection::from_value(value))
    }

    pub async fn all(&self) -> ClientResult<Vec<Listing>> {
        Ok(self.load().await?.listings())
    }

    /// Read-modify-write of the collection guarded by the store's version tag.
    ///
    /// When another writer changes `logements` between the read and the write,
    /// the edit is recomputed from fresh data. An error from `edit` aborts
    /// without writing anything.
    pub async fn modify<T, F>(&self, mut edit: F) -> ClientResult<T>
    where
        F: FnMut(&mut ListingCollection) -> ClientResult<T> + Send,
        T: Send,
    {
        for attempt in 1..=self.attempts {
            let versioned = self.store.get_versioned(LISTINGS_PATH).await?;
            let mut collection = ListingCollection::from_value(versioned.value);
            let outcome = edit(&mut collection)?;

            if self
                .store
                .set_if(LISTINGS_PATH, collection.into_value(), &versioned.etag)
                .await?
            {
                debug!("Listings written on attempt {}", attempt);
                return Ok(outcome);
            }
            warn!(
                "Listings changed concurrently (attempt {}/{}), retrying",
                attempt, self.attempts
            );
        }
        Err(ClientError::Conflict)
    }
}

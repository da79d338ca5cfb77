use crate::error::ClientResult;
use crate::listings::ListingCollection;
use crate::models::Listing;
use crate::store::{favorites_path, DocumentStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// A favorite as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub struct FavoriteView {
    pub listing: Listing,
    /// The listing no longer exists; `listing` is the copy saved when starred.
    pub stale: bool,
}

/// A user's starred listings, mirrored to `users/<key>/favorites`.
///
/// Each entry is a full copy of the listing taken when it was starred.
/// Membership is decided by `id` alone. Every change rewrites the whole
/// subtree; if that write fails the in-memory list is put back as it was.
pub struct Favorites {
    store: Arc<dyn DocumentStore>,
    path: String,
    entries: Vec<Listing>,
}

impl Favorites {
    pub fn empty(store: Arc<dyn DocumentStore>, email: &str) -> Self {
        Self {
            store,
            path: favorites_path(email),
            entries: Vec::new(),
        }
    }

    pub async fn load(store: Arc<dyn DocumentStore>, email: &str) -> ClientResult<Self> {
        let mut favorites = Self::empty(store, email);
        let raw = favorites.store.get(&favorites.path).await?;
        favorites.entries = Self::normalize(raw);
        debug!("Loaded {} favorites from {}", favorites.entries.len(), favorites.path);
        Ok(favorites)
    }

    /// Accepts the array or object-of-objects shape and drops `null` tombstones.
    pub fn normalize(raw: Option<Value>) -> Vec<Listing> {
        ListingCollection::from_value(raw).listings()
    }

    pub fn entries(&self) -> &[Listing] {
        &self.entries
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.entries.iter().any(|fav| fav.id == id)
    }

    /// Star or unstar `listing`; returns whether it is now a favorite.
    pub async fn toggle(&mut self, listing: &Listing) -> ClientResult<bool> {
        let starring = !self.contains(listing.id);
        let next = if starring {
            let mut next = self.entries.clone();
            next.push(listing.clone());
            next
        } else {
            self.without(listing.id)
        };
        self.commit(next).await?;
        Ok(starring)
    }

    pub async fn remove(&mut self, listing: &Listing) -> ClientResult<()> {
        if !self.contains(listing.id) {
            return Ok(());
        }
        let next = self.without(listing.id);
        self.commit(next).await
    }

    fn without(&self, id: i64) -> Vec<Listing> {
        self.entries.iter().filter(|fav| fav.id != id).cloned().collect()
    }

    async fn commit(&mut self, next: Vec<Listing>) -> ClientResult<()> {
        let payload = serde_json::to_value(&next)?;
        let previous = std::mem::replace(&mut self.entries, next);
        if let Err(err) = self.store.set(&self.path, payload).await {
            warn!("Failed to save favorites to {}: {}", self.path, err);
            self.entries = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Join the saved copies against the live collection by id, and by owner
    /// when the copy records one since ids repeat across owners.
    ///
    /// Favorites whose listing still exists show its current state; the rest
    /// fall back to their saved copy and are marked stale.
    pub fn resolve(&self, live: &[Listing]) -> Vec<FavoriteView> {
        self.entries
            .iter()
            .map(|fav| match live
                .iter()
                .find(|l| l.id == fav.id && (fav.owner.is_empty() || l.owner == fav.owner))
            {
                Some(current) => FavoriteView {
                    listing: current.clone(),
                    stale: false,
                },
                None => FavoriteView {
                    listing: fav.clone(),
                    stale: true,
                },
            })
            .collect()
    }
}

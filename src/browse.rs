use crate::auth::AuthService;
use crate::error::{ClientError, ClientResult};
use crate::favorites::{FavoriteView, Favorites};
use crate::listings::{filter_listings, text_matches, FilterCriteria, ListingRepository};
use crate::models::{Listing, User};
use crate::session::Session;
use crate::store::DocumentStore;
use std::sync::Arc;
use tracing::{info, warn};

/// What the profile screen shows.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileSummary {
    pub user: User,
    pub favorites: usize,
    pub listings: usize,
}

/// Listing sequence, search text, filter criteria and favorites of the
/// logged-in user, with the visible sequence derived from them.
///
/// The visible sequence is recomputed whenever any of its inputs changes.
pub struct BrowseView {
    listings: Vec<Listing>,
    query: String,
    criteria: FilterCriteria,
    visible: Vec<Listing>,
    favorites: Favorites,
}

impl BrowseView {
    pub fn new(listings: Vec<Listing>, favorites: Favorites) -> Self {
        let mut view = Self {
            listings,
            query: String::new(),
            criteria: FilterCriteria::default(),
            visible: Vec::new(),
            favorites,
        };
        view.recompute();
        view
    }

    /// Fetch the listing collection and the user's favorites side by side.
    ///
    /// A failed fetch is logged and leaves that source empty, like an empty
    /// collection would.
    pub async fn load(repo: &ListingRepository, store: Arc<dyn DocumentStore>, session: &Session) -> Self {
        let (listings, favorites) = tokio::join!(
            repo.all(),
            Favorites::load(store.clone(), &session.email)
        );

        let listings = listings.unwrap_or_else(|err| {
            warn!("Failed to load listings: {}", err);
            Vec::new()
        });
        let favorites = favorites.unwrap_or_else(|err| {
            warn!("Failed to load favorites: {}", err);
            Favorites::empty(store, &session.email)
        });
        info!(
            "Loaded {} listings and {} favorites for {}",
            listings.len(),
            favorites.count(),
            session.username
        );
        Self::new(listings, favorites)
    }

    fn recompute(&mut self) {
        self.visible = filter_listings(&self.listings, &self.query, &self.criteria);
    }

    pub fn set_query(&mut self, text: &str) {
        self.query = text.to_string();
        self.recompute();
    }

    pub fn set_filter_criteria(&mut self, criteria: FilterCriteria) {
        self.criteria = criteria;
        self.recompute();
    }

    /// Clear the search text and every filter.
    pub fn reset_filters(&mut self) {
        self.query.clear();
        self.criteria.reset();
        self.recompute();
    }

    pub fn set_listings(&mut self, listings: Vec<Listing>) {
        self.listings = listings;
        self.recompute();
    }

    pub async fn reload_listings(&mut self, repo: &ListingRepository) -> ClientResult<()> {
        let listings = repo.all().await?;
        self.set_listings(listings);
        Ok(())
    }

    /// Drop a deleted listing from local state without refetching.
    pub fn forget_listing(&mut self, owner: &str, id: i64) {
        self.listings.retain(|l| !(l.id == id && l.owner == owner));
        self.recompute();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn all_listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn visible_listings(&self) -> &[Listing] {
        &self.visible
    }

    /// Listing by id, from the live collection or else from a saved favorite.
    pub fn listing(&self, id: i64) -> Option<&Listing> {
        self.listings
            .iter()
            .find(|l| l.id == id)
            .or_else(|| self.favorites.entries().iter().find(|l| l.id == id))
    }

    /// One of `email`'s own listings; ids only identify a listing within
    /// its owner's listings.
    pub fn owned_listing(&self, email: &str, id: i64) -> Option<&Listing> {
        self.listings.iter().find(|l| l.id == id && l.owner == email)
    }

    pub fn my_listings(&self, email: &str) -> Vec<Listing> {
        self.listings
            .iter()
            .filter(|l| l.owner == email)
            .cloned()
            .collect()
    }

    pub fn is_favorite(&self, id: i64) -> bool {
        self.favorites.contains(id)
    }

    pub async fn toggle_favorite(&mut self, listing: &Listing) -> ClientResult<bool> {
        self.favorites.toggle(listing).await
    }

    pub async fn remove_favorite(&mut self, id: i64) -> ClientResult<()> {
        let listing = self
            .favorites
            .entries()
            .iter()
            .find(|l| l.id == id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound("Favori introuvable".into()))?;
        self.favorites.remove(&listing).await
    }

    /// The favorites screen: favorites joined against live listings, narrowed
    /// by free text only.
    pub fn favorites_view(&self, query: &str) -> Vec<FavoriteView> {
        self.favorites
            .resolve(&self.listings)
            .into_iter()
            .filter(|view| text_matches(&view.listing, query))
            .collect()
    }

    pub async fn profile_summary(&self, auth: &AuthService, session: &Session) -> ClientResult<ProfileSummary> {
        let user = auth
            .find_by_username(&session.username)
            .await?
            .ok_or_else(|| ClientError::NotFound("Utilisateur introuvable".into()))?;
        Ok(ProfileSummary {
            favorites: self.favorites.count(),
            listings: self.my_listings(&user.email).len(),
            user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn seeded_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::with_root(json!({
            "logements": {
                "0": {"id": 1, "titre": "Studio Hydra", "prix": 10000, "ville": "Alger", "type": "studio",
                      "disponible": true, "equipements": ["WiFi"], "proprietaire": "a@x.dz"},
                "1": {"id": 2, "titre": "F3 Oran", "prix": 20000, "ville": "Oran", "type": "appartement",
                      "disponible": false, "equipements": [], "proprietaire": "b@x.dz"}
            },
            "users": {
                "a@x_dz": {"username": "amine", "email": "a@x.dz", "phone": "1", "password": "pw",
                           "favorites": [null, {"id": 2, "titre": "F3 Oran (ancien)"}, {"id": 9, "titre": "Supprimé"}]}
            }
        })))
    }

    async fn loaded(store: Arc<MemoryStore>) -> BrowseView {
        let repo = ListingRepository::new(store.clone(), 3);
        BrowseView::load(&repo, store, &Session::new("amine", "a@x.dz")).await
    }

    fn ids(listings: &[Listing]) -> Vec<i64> {
        listings.iter().map(|l| l.id).collect()
    }

    #[tokio::test]
    async fn visible_listings_follow_query_and_criteria() {
        let mut view = loaded(seeded_store()).await;
        assert_eq!(ids(view.visible_listings()), vec![1, 2]);

        view.set_query("oran");
        assert_eq!(ids(view.visible_listings()), vec![2]);

        view.set_query("");
        view.set_filter_criteria(FilterCriteria {
            kind: "studio".into(),
            ..Default::default()
        });
        assert_eq!(ids(view.visible_listings()), vec![1]);

        view.set_listings(vec![Listing {
            id: 3,
            kind: Some("studio".into()),
            ..Default::default()
        }]);
        assert_eq!(ids(view.visible_listings()), vec![3]);
    }

    #[tokio::test]
    async fn favorites_toggle_through_the_view() {
        let store = seeded_store();
        let mut view = loaded(store.clone()).await;
        assert!(view.is_favorite(2));
        assert!(!view.is_favorite(1));

        let first = view.visible_listings()[0].clone();
        assert!(view.toggle_favorite(&first).await.unwrap());
        assert!(view.is_favorite(1));

        let stored = Favorites::normalize(store.get("users/a@x_dz/favorites").await.unwrap());
        assert_eq!(ids(&stored), vec![2, 9, 1]);
    }

    #[tokio::test]
    async fn favorites_view_joins_live_and_searches() {
        let view = loaded(seeded_store()).await;
        let all = view.favorites_view("");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].listing.title, "F3 Oran");
        assert!(!all[0].stale);
        assert!(all[1].stale);

        let searched = view.favorites_view("supprimé");
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].listing.id, 9);
    }

    #[tokio::test]
    async fn failed_listing_fetch_leaves_empty_view() {
        struct Broken;

        #[async_trait::async_trait]
        impl DocumentStore for Broken {
            async fn get(&self, _: &str) -> ClientResult<Option<serde_json::Value>> {
                Err(ClientError::store("offline"))
            }
            async fn set(&self, _: &str, _: serde_json::Value) -> ClientResult<()> {
                Err(ClientError::store("offline"))
            }
            async fn get_versioned(&self, _: &str) -> ClientResult<crate::store::types::Versioned> {
                Err(ClientError::store("offline"))
            }
            async fn set_if(&self, _: &str, _: serde_json::Value, _: &crate::store::types::ETag) -> ClientResult<bool> {
                Err(ClientError::store("offline"))
            }
            fn backend_name(&self) -> &'static str {
                "broken"
            }
        }

        let store: Arc<dyn DocumentStore> = Arc::new(Broken);
        let repo = ListingRepository::new(store.clone(), 1);
        let view = BrowseView::load(&repo, store, &Session::new("amine", "a@x.dz")).await;
        assert!(view.visible_listings().is_empty());
        assert!(!view.is_favorite(1));
    }

    #[tokio::test]
    async fn profile_counts_favorites_and_own_listings() {
        let store = seeded_store();
        let view = loaded(store.clone()).await;
        let auth = AuthService::new(store);
        let summary = view
            .profile_summary(&auth, &Session::new("amine", "a@x.dz"))
            .await
            .unwrap();
        assert_eq!(summary.user.email, "a@x.dz");
        assert_eq!(summary.favorites, 2);
        assert_eq!(summary.listings, 1);
    }

    #[tokio::test]
    async fn detail_lookup_and_local_delete() {
        let mut view = loaded(seeded_store()).await;
        assert_eq!(view.listing(9).map(|l| l.title.as_str()), Some("Supprimé"));
        view.forget_listing("a@x.dz", 1);
        assert_eq!(ids(view.visible_listings()), vec![2]);
        assert!(view.listing(1).is_none());
        assert!(matches!(
            view.remove_favorite(1).await,
            Err(ClientError::NotFound(_))
        ));
        view.remove_favorite(9).await.unwrap();
        assert!(!view.is_favorite(9));
    }

    #[tokio::test]
    async fn owned_lookup_picks_the_owners_copy_of_a_shared_id() {
        let store = Arc::new(MemoryStore::with_root(json!({
            "logements": {
                "0": {"id": 51, "titre": "A flat", "proprietaire": "a@x.dz"},
                "1": {"id": 51, "titre": "B flat", "proprietaire": "b@x.dz"}
            }
        })));
        let mut view = loaded(store).await;
        assert_eq!(view.owned_listing("b@x.dz", 51).map(|l| l.title.as_str()), Some("B flat"));
        assert!(view.owned_listing("c@x.dz", 51).is_none());

        view.forget_listing("b@x.dz", 51);
        assert_eq!(view.owned_listing("a@x.dz", 51).map(|l| l.title.as_str()), Some("A flat"));
        assert!(view.owned_listing("b@x.dz", 51).is_none());
    }

    #[tokio::test]
    async fn reset_clears_query_and_criteria() {
        let mut view = loaded(seeded_store()).await;
        view.set_query("oran");
        view.set_filter_criteria(FilterCriteria { available_only: true, ..Default::default() });
        assert!(view.visible_listings().is_empty());

        view.reset_filters();
        assert_eq!(view.query(), "");
        assert!(view.criteria().is_empty());
        assert_eq!(ids(view.visible_listings()), vec![1, 2]);
    }
}

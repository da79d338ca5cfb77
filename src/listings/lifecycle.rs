use crate::error::{ClientError, ClientResult};
use crate::listings::repository::ListingRepository;
use crate::models::{Listing, ListingType};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

/// Logical id given to an owner's first listing.
pub const FIRST_LISTING_ID: i64 = 51;

/// The add/edit form, with numbers still as the text the user typed.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
    /// Stored type text; new listings get one of [`ListingType`]
    pub kind: String,
    pub city: String,
    pub neighbourhood: String,
    pub price: String,
    pub surface: String,
    pub available: bool,
    pub amenities: Vec<String>,
    /// Only used on creation; empty means the placeholder photo
    pub photos: Vec<String>,
}

impl Default for ListingDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            kind: ListingType::Studio.as_str().to_string(),
            city: String::new(),
            neighbourhood: String::new(),
            price: String::new(),
            surface: String::new(),
            available: true,
            amenities: Vec::new(),
            photos: Vec::new(),
        }
    }
}

/// Form fields after validation.
struct ValidDraft {
    price: i64,
    surface: Option<i64>,
}

impl ListingDraft {
    /// Pre-fill the edit form from an existing listing.
    pub fn from_listing(listing: &Listing) -> Self {
        Self {
            title: listing.title.clone(),
            description: listing.description.clone(),
            kind: match listing.kind_str().trim() {
                "" => ListingType::default().as_str().to_string(),
                _ => listing.kind_str().to_string(),
            },
            city: listing.city.clone(),
            neighbourhood: listing.neighbourhood.clone(),
            price: listing.price.map(|p| p.to_string()).unwrap_or_default(),
            surface: listing.surface.map(|s| s.to_string()).unwrap_or_default(),
            available: listing.available,
            amenities: listing.amenities.clone().unwrap_or_default(),
            photos: listing.photos.clone(),
        }
    }

    pub fn toggle_amenity(&mut self, name: &str) {
        match self.amenities.iter().position(|a| a == name) {
            Some(index) => {
                self.amenities.remove(index);
            }
            None => self.amenities.push(name.to_string()),
        }
    }

    fn validate(&self) -> ClientResult<ValidDraft> {
        if self.title.trim().is_empty() {
            return Err(ClientError::validation("titre", "Veuillez saisir un titre"));
        }
        if self.city.trim().is_empty() {
            return Err(ClientError::validation("ville", "Veuillez sélectionner une ville"));
        }
        if self.neighbourhood.trim().is_empty() {
            return Err(ClientError::validation("quartier", "Veuillez saisir un quartier"));
        }
        let price = self
            .price
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| ClientError::validation("prix", "Veuillez saisir un prix valide"))?;
        let surface = match self.surface.trim() {
            "" => None,
            raw => {
                let parsed = raw.parse::<i64>().ok();
                if parsed.is_none() {
                    debug!("Ignoring non-numeric surface {:?}", raw);
                }
                parsed
            }
        };
        Ok(ValidDraft { price, surface })
    }

    /// Edited fields in store shape, merged over the stored record on update.
    fn form_fields(&self, valid: &ValidDraft) -> Map<String, Value> {
        Map::from_iter([
            ("titre".to_string(), json!(self.title)),
            ("description".to_string(), json!(self.description)),
            ("type".to_string(), json!(self.kind)),
            ("ville".to_string(), json!(self.city)),
            ("quartier".to_string(), json!(self.neighbourhood)),
            ("prix".to_string(), json!(valid.price)),
            ("surface".to_string(), json!(valid.surface)),
            ("disponible".to_string(), json!(self.available)),
            ("equipements".to_string(), json!(self.amenities)),
        ])
    }
}

fn ensure_owner(actor: &str, listing: &Listing) -> ClientResult<()> {
    if listing.owner != actor {
        return Err(ClientError::validation(
            "proprietaire",
            "Vous ne pouvez gérer que vos propres annonces",
        ));
    }
    Ok(())
}

/// Creates, edits and deletes listings on behalf of their owner.
#[derive(Clone)]
pub struct ListingManager {
    repo: ListingRepository,
    placeholder_photo: String,
}

impl ListingManager {
    pub fn new(repo: ListingRepository, placeholder_photo: impl Into<String>) -> Self {
        Self {
            repo,
            placeholder_photo: placeholder_photo.into(),
        }
    }

    pub fn repository(&self) -> &ListingRepository {
        &self.repo
    }

    /// Add a listing owned by `owner`.
    ///
    /// The logical id continues the owner's own sequence (starting at 51); the
    /// storage key continues the sequence of the whole collection.
    pub async fn create(&self, owner: &str, draft: &ListingDraft) -> ClientResult<Listing> {
        let valid = draft.validate()?;
        let photos = if draft.photos.is_empty() {
            vec![self.placeholder_photo.clone()]
        } else {
            draft.photos.clone()
        };

        let (key, listing) = self
            .repo
            .modify(|collection| {
                let id = collection
                    .owned_by(owner)
                    .iter()
                    .map(|l| l.id)
                    .max()
                    .map_or(FIRST_LISTING_ID, |max| max + 1);

                let mut record = draft.form_fields(&valid);
                record.insert("id".into(), json!(id));
                record.insert("proprietaire".into(), json!(owner));
                record.insert("photos".into(), json!(photos));
                let record = Value::Object(record);
                let listing: Listing = serde_json::from_value(record.clone())?;

                let key = collection.next_storage_key();
                collection.insert(key.clone(), record);
                Ok((key, listing))
            })
            .await?;

        info!("Created listing {} under key {} for {}", listing.id, key, owner);
        Ok(listing)
    }

    /// Apply the edit form to `target`, keeping every stored field the form
    /// does not cover (owner, photos, anything unknown to this client).
    ///
    /// Ids are only unique per owner, so the record is looked up among the
    /// owner's own records.
    pub async fn update(&self, actor: &str, target: &Listing, draft: &ListingDraft) -> ClientResult<Listing> {
        ensure_owner(actor, target)?;
        let valid = draft.validate()?;

        let listing = self
            .repo
            .modify(|collection| {
                let key = collection
                    .find_key_by_owner_and_id(&target.owner, target.id)
                    .ok_or_else(|| ClientError::NotFound("Logement non trouvé".into()))?;

                let mut record = match collection.get(&key) {
                    Some(Value::Object(existing)) => existing.clone(),
                    _ => Map::new(),
                };
                record.extend(draft.form_fields(&valid));
                let record = Value::Object(record);
                let listing: Listing = serde_json::from_value(record.clone())?;

                collection.insert(key, record);
                Ok(listing)
            })
            .await?;

        info!("Updated listing {}", listing.id);
        Ok(listing)
    }

    /// Remove `target`, returning the storage key it was held under.
    ///
    /// The record is located by id among the owner's records first; if none
    /// carries that id, the owner and title pair is tried instead.
    pub async fn delete(&self, actor: &str, target: &Listing) -> ClientResult<String> {
        ensure_owner(actor, target)?;

        let key = self
            .repo
            .modify(|collection| {
                if collection.is_empty() {
                    return Err(ClientError::NotFound("Aucun logement trouvé".into()));
                }
                let key = collection
                    .find_key_by_owner_and_id(&target.owner, target.id)
                    .or_else(|| collection.find_key_by_owner_and_title(&target.owner, &target.title))
                    .ok_or_else(|| {
                        ClientError::NotFound("Annonce non trouvée dans la base de données".into())
                    })?;
                collection.remove(&key);
                Ok(key)
            })
            .await?;

        info!("Deleted listing {} (key {})", target.id, key);
        Ok(key)
    }
}

use crate::models::Listing;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Narrowing constraints picked in the filter modal.
///
/// Prices stay as the raw text the user typed; a value that does not parse
/// as a number simply leaves that bound unapplied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub city: String,
    pub kind: String,
    pub min_price: String,
    pub max_price: String,
    pub amenities: BTreeSet<String>,
    pub available_only: bool,
}

impl FilterCriteria {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Add the amenity if absent, drop it if present.
    pub fn toggle_amenity(&mut self, name: &str) {
        if !self.amenities.remove(name) {
            self.amenities.insert(name.to_string());
        }
    }
}

/// Numeric value of a price bound, truncated to whole dinars.
fn parse_price(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v.trunc() as i64)
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    !haystack.is_empty() && haystack.to_lowercase().contains(needle_lower)
}

fn eq_ci(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Whether `query` occurs, ignoring case, in the title, city, neighbourhood,
/// type or description. An empty query matches everything.
pub fn text_matches(listing: &Listing, query: &str) -> bool {
    let query = query.trim();
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    [
        listing.title.as_str(),
        listing.city.as_str(),
        listing.neighbourhood.as_str(),
        listing.kind_str(),
        listing.description.as_str(),
    ]
    .into_iter()
    .any(|field| contains_ci(field, &needle))
}

/// Apply the free-text query and then each structured criterion in turn.
///
/// Surviving listings keep their relative order from `listings`.
pub fn filter_listings(listings: &[Listing], query: &str, criteria: &FilterCriteria) -> Vec<Listing> {
    let mut visible: Vec<&Listing> = listings.iter().collect();

    if !query.trim().is_empty() {
        visible.retain(|l| text_matches(l, query));
    }
    if let Some(min) = parse_price(&criteria.min_price) {
        visible.retain(|l| l.price.is_some_and(|p| p >= min));
    }
    if let Some(max) = parse_price(&criteria.max_price) {
        visible.retain(|l| l.price.is_some_and(|p| p <= max));
    }
    if !criteria.city.is_empty() {
        visible.retain(|l| !l.city.is_empty() && eq_ci(&l.city, &criteria.city));
    }
    if !criteria.kind.is_empty() {
        visible.retain(|l| !l.kind_str().is_empty() && eq_ci(l.kind_str(), &criteria.kind));
    }
    if !criteria.amenities.is_empty() {
        visible.retain(|l| criteria.amenities.iter().all(|a| l.has_amenity(a)));
    }
    if criteria.available_only {
        visible.retain(|l| l.available);
    }

    visible.into_iter().cloned().collect()
}

/// Result count line shown above the list.
pub fn results_summary(count: usize) -> String {
    let plural = if count == 1 { "" } else { "s" };
    format!("{count} logement{plural} trouvé{plural}")
}

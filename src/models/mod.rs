use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Kind of rentable unit offered by the listing form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingType {
    #[default]
    Studio,
    Appartement,
    Colocation,
}

impl ListingType {
    pub const ALL: [ListingType; 3] = [
        ListingType::Studio,
        ListingType::Appartement,
        ListingType::Colocation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::Studio => "studio",
            ListingType::Appartement => "appartement",
            ListingType::Colocation => "colocation",
        }
    }

    /// Case-insensitive lookup; `None` for unknown names.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl std::fmt::Display for ListingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `null` decodes like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn number_from(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64),
        _ => None,
    }
}

/// Integers, floats and numeric strings all count; anything else is absent.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(number_from))
}

fn lenient_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_number(deserializer)?.unwrap_or_default())
}

/// Free-text values such as `type` are kept verbatim unless they are not strings.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Rental listing ("logement") as stored under `logements`.
///
/// Stored records are not always complete, so every field tolerates being
/// absent. `amenities` stays `None` when the field is missing because the
/// amenity filter treats a missing list differently from an empty one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Listing {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: i64,
    #[serde(rename = "titre", default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Type as stored, whatever its case; the form only offers [`ListingType`]
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(rename = "ville", default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(rename = "quartier", default, deserialize_with = "null_as_default")]
    pub neighbourhood: String,
    /// Monthly rent in dinars
    #[serde(rename = "prix", default, deserialize_with = "lenient_number")]
    pub price: Option<i64>,
    /// Square meters
    #[serde(default, deserialize_with = "lenient_number")]
    pub surface: Option<i64>,
    #[serde(rename = "disponible", default, deserialize_with = "null_as_default")]
    pub available: bool,
    #[serde(rename = "equipements", default, skip_serializing_if = "Option::is_none")]
    pub amenities: Option<Vec<String>>,
    /// Owner's email address
    #[serde(rename = "proprietaire", default, deserialize_with = "null_as_default")]
    pub owner: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub photos: Vec<String>,
    /// Stored fields this client has no use for, carried along unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

const PHOTO_BASE_URL: &str = "https://example.com/";

impl Listing {
    /// Stored type text, empty when the record has none.
    pub fn kind_str(&self) -> &str {
        self.kind.as_deref().unwrap_or_default()
    }

    pub fn has_amenity(&self, name: &str) -> bool {
        self.amenities
            .as_deref()
            .is_some_and(|list| list.iter().any(|a| a == name))
    }

    /// URI of the first photo, resolving bare file names against the image host.
    pub fn cover_photo(&self) -> Option<String> {
        let first = self.photos.first().filter(|p| !p.is_empty())?;
        if first.starts_with("data:") || first.starts_with("http") {
            Some(first.clone())
        } else {
            Some(format!("{PHOTO_BASE_URL}{first}"))
        }
    }

    /// Pre-filled mail link for contacting the owner about this listing.
    pub fn contact_link(&self) -> Option<String> {
        if self.owner.is_empty() {
            return None;
        }
        let subject = if self.title.is_empty() {
            "Logement".to_string()
        } else {
            self.title.replace(' ', "%20")
        };
        Some(format!("mailto:{}?subject={}", self.owner, subject))
    }

    /// Multi-line card as printed by the shell.
    pub fn card(&self) -> String {
        let title = or_placeholder(&self.title, "Sans titre");
        let city = or_placeholder(&self.city, "Ville inconnue");
        let area = or_placeholder(&self.neighbourhood, "Quartier inconnu");
        let price = match self.price {
            Some(p) if p > 0 => format!("{} DA / mois", group_thousands(p)),
            _ => "Prix non disponible".to_string(),
        };
        let kind = match self.kind_str().trim() {
            "" => "N/A".to_string(),
            kind => kind.to_uppercase(),
        };
        let availability = if self.available { "Disponible" } else { "Non disponible" };

        let mut card = format!(
            "#{} {}\n   {} • {}\n   {} [{}] {}",
            self.id, title, city, area, price, kind, availability
        );
        if let Some(surface) = self.surface {
            card.push_str(&format!(" · {} m²", surface));
        }
        if let Some(amenities) = self.amenities.as_deref().filter(|a| !a.is_empty()) {
            let shown: Vec<&str> = amenities.iter().take(2).map(String::as_str).collect();
            card.push_str(&format!("\n   {}", shown.join(", ")));
            if amenities.len() > 2 {
                card.push_str(&format!(" +{}", amenities.len() - 2));
            }
        }
        card
    }
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() {
        placeholder
    } else {
        value
    }
}

fn group_thousands(value: i64) -> String {
    let digits = value.abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(c);
    }
    if value < 0 {
        out.insert(0, '-');
    }
    out
}

/// Registered user under `users/<sanitized email>`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    /// Salted credential string, or plaintext for records written by older clients
    #[serde(default)]
    pub password: String,
}

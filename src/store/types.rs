use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const USERS_PATH: &str = "users";
pub const LISTINGS_PATH: &str = "logements";

/// Opaque version tag of a subtree, as returned by a versioned read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ETag(pub String);

impl ETag {
    /// Tag of a path that holds nothing.
    pub fn absent() -> Self {
        ETag("null_etag".to_string())
    }

    /// Content-derived tag: SHA-256 over the canonical JSON of `value`.
    pub fn of(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::absent(),
            Some(value) => {
                let digest = Sha256::digest(value.to_string().as_bytes());
                ETag(hex::encode(digest))
            }
        }
    }
}

/// A subtree together with the version it was read at.
#[derive(Debug, Clone)]
pub struct Versioned {
    pub value: Option<Value>,
    pub etag: ETag,
}

/// Storage key for a user: every `.` in the email becomes `_`.
pub fn sanitize_email(email: &str) -> String {
    email.trim().replace('.', "_")
}

pub fn user_path(email: &str) -> String {
    format!("{}/{}", USERS_PATH, sanitize_email(email))
}

pub fn favorites_path(email: &str) -> String {
    format!("{}/favorites", user_path(email))
}

/// Split a store path into its non-empty segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sanitize_replaces_every_dot() {
        assert_eq!(sanitize_email("jean.dupont@mail.example.dz"), "jean_dupont@mail_example_dz");
        assert_eq!(sanitize_email("plain@host"), "plain@host");
    }

    #[test]
    fn paths_use_the_sanitized_key() {
        assert_eq!(user_path("a.b@c.d"), "users/a_b@c_d");
        assert_eq!(favorites_path("a.b@c.d"), "users/a_b@c_d/favorites");
    }

    #[test]
    fn etag_tracks_content() {
        let a = json!({"x": 1});
        let b = json!({"x": 2});
        assert_eq!(ETag::of(Some(&a)), ETag::of(Some(&a.clone())));
        assert_ne!(ETag::of(Some(&a)), ETag::of(Some(&b)));
        assert_eq!(ETag::of(None), ETag::absent());
        assert_eq!(ETag::of(Some(&Value::Null)), ETag::absent());
    }

    #[test]
    fn segments_skip_empty_parts() {
        let parts: Vec<&str> = segments("/users//a/").collect();
        assert_eq!(parts, vec!["users", "a"]);
    }
}

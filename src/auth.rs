use crate::error::{AuthFailure, ClientError, ClientResult};
use crate::models::User;
use crate::session::Session;
use crate::store::{user_path, DocumentStore, USERS_PATH};
use rand::RngCore;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{info, warn};

const HASH_SCHEME: &str = "sha256";

fn digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Salted credential string: `sha256$<salt>$<digest>`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    format!("{}${}${}", HASH_SCHEME, hex::encode(salt), digest(&salt, password))
}

/// Check `password` against a stored credential.
///
/// Records written before credentials were hashed hold the password itself;
/// those still verify so their owners can log in.
pub fn verify_password(stored: &str, password: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(HASH_SCHEME), Some(salt), Some(expected)) => match hex::decode(salt) {
            Ok(salt) => digest(&salt, password) == expected,
            Err(_) => false,
        },
        _ => {
            warn!("Verifying a plaintext credential");
            stored == password
        }
    }
}

fn require(fields: &[&str]) -> ClientResult<()> {
    if fields.iter().any(|f| f.trim().is_empty()) {
        return Err(ClientError::validation("form", "Veuillez remplir tous les champs"));
    }
    Ok(())
}

/// Sign-up, login and user lookups against `users`.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn DocumentStore>,
}

impl AuthService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Register a user under its sanitized email. An existing record with the
    /// same key is overwritten.
    pub async fn sign_up(&self, username: &str, email: &str, phone: &str, password: &str) -> ClientResult<User> {
        require(&[username, email, phone, password])?;

        let user = User {
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            phone: phone.trim().to_string(),
            password: hash_password(password),
        };
        self.store
            .set(&user_path(&user.email), serde_json::to_value(&user)?)
            .await?;

        info!("Registered {}", user.username);
        Ok(user)
    }

    pub async fn log_in(&self, email: &str, password: &str) -> ClientResult<Session> {
        require(&[email, password])?;

        let raw = self
            .store
            .get(&user_path(email))
            .await?
            .ok_or(ClientError::Auth(AuthFailure::UserNotFound))?;
        let user: User = serde_json::from_value(raw)?;

        if !verify_password(&user.password, password) {
            return Err(ClientError::Auth(AuthFailure::WrongPassword));
        }
        info!("{} logged in", user.username);
        Ok(Session::new(user.username, user.email))
    }

    /// First user record whose `username` matches.
    pub async fn find_by_username(&self, username: &str) -> ClientResult<Option<User>> {
        let Some(Value::Object(users)) = self.store.get(USERS_PATH).await? else {
            return Ok(None);
        };
        Ok(users
            .into_iter()
            .filter_map(|(_, raw)| serde_json::from_value::<User>(raw).ok())
            .find(|user| user.username == username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn service() -> (Arc<MemoryStore>, AuthService) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), AuthService::new(store))
    }

    #[test]
    fn hashes_are_salted_and_verify() {
        let a = hash_password("secret");
        let b = hash_password("secret");
        assert_ne!(a, b);
        assert!(a.starts_with("sha256$"));
        assert!(verify_password(&a, "secret"));
        assert!(!verify_password(&a, "Secret"));
    }

    #[test]
    fn legacy_plaintext_still_verifies() {
        assert!(verify_password("hunter2", "hunter2"));
        assert!(!verify_password("hunter2", "hunter3"));
        assert!(!verify_password("sha256$zz$abc", "anything"));
    }

    #[tokio::test]
    async fn sign_up_then_log_in() {
        let (store, auth) = service();
        auth.sign_up("amine", "amine.k@mail.dz", "0555", "pw").await.unwrap();

        let raw = store.get("users/amine_k@mail_dz").await.unwrap().unwrap();
        assert_eq!(raw["username"], "amine");
        assert_ne!(raw["password"], "pw");

        let session = auth.log_in("amine.k@mail.dz", "pw").await.unwrap();
        assert_eq!(session.username, "amine");
        assert_eq!(session.email, "amine.k@mail.dz");
    }

    #[tokio::test]
    async fn login_failures_are_distinct() {
        let (_, auth) = service();
        auth.sign_up("amine", "amine@mail.dz", "0555", "pw").await.unwrap();

        assert!(matches!(
            auth.log_in("nobody@mail.dz", "pw").await,
            Err(ClientError::Auth(AuthFailure::UserNotFound))
        ));
        assert!(matches!(
            auth.log_in("amine@mail.dz", "nope").await,
            Err(ClientError::Auth(AuthFailure::WrongPassword))
        ));
    }

    #[tokio::test]
    async fn missing_fields_never_reach_the_store() {
        let (store, auth) = service();
        store.fail_writes(true);
        assert!(matches!(
            auth.sign_up("amine", "", "0555", "pw").await,
            Err(ClientError::Validation { .. })
        ));
        assert!(matches!(auth.log_in("a@b", " ").await, Err(ClientError::Validation { .. })));
    }

    #[tokio::test]
    async fn legacy_user_record_logs_in() {
        let store = Arc::new(MemoryStore::with_root(json!({
            "users": {"old@mail_dz": {"username": "old", "email": "old@mail.dz", "phone": "1", "password": "plain"}}
        })));
        let auth = AuthService::new(store);
        assert_eq!(auth.log_in("old@mail.dz", "plain").await.unwrap().username, "old");
    }

    #[tokio::test]
    async fn finds_user_by_username() {
        let store = Arc::new(MemoryStore::with_root(json!({
            "users": {
                "a@x_dz": {"username": "alpha", "email": "a@x.dz"},
                "b@x_dz": {"username": "beta", "email": "b@x.dz", "favorites": [{"id": 1}]}
            }
        })));
        let auth = AuthService::new(store);
        let beta = auth.find_by_username("beta").await.unwrap().unwrap();
        assert_eq!(beta.email, "b@x.dz");
        assert_eq!(auth.find_by_username("gamma").await.unwrap(), None);
    }
}

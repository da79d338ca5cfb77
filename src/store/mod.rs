pub mod firebase;
pub mod memory;
pub mod traits;
pub mod types;

pub use firebase::FirebaseStore;
pub use memory::MemoryStore;
pub use traits::DocumentStore;
pub use types::{favorites_path, user_path, LISTINGS_PATH, USERS_PATH};

//! Core module - records, remote store, cache, filtering and actions

pub mod auth;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod filter;
pub mod record;
pub mod stats;
pub mod store;

pub use auth::{admin_sign_in, verify_admin, AuthError, Authenticator, Credentials, FirebaseAuth, Session};
pub use cache::{CollectionCache, LocalCache};
pub use config::{Config, ConfigError};
pub use dispatch::{
    ActionDispatcher, ActionError, ActionOutcome, ActionState, AssumeYes, CascadeReport, Prompter,
};
pub use filter::{derive, recent_items, FilterState};
pub use record::{
    Collection, Item, ItemFacet, Notification, NotificationFacet, OwnedRecord, Record, Role, User,
    UserFacet,
};
pub use store::{Document, FirestoreStore, MemoryStore, RemoteStore, StoreError};

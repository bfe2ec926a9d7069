//! User-triggered mutations
//!
//! Every action runs the same machine:
//!
//! ```text
//! Idle -> Confirming -> Aborted -> Idle
//!                    -> Submitting -> Succeeded -> Idle
//!                                  -> Failed    -> Idle
//! ```
//!
//! The remote write happens first; the local cache is only touched for
//! records whose remote write was confirmed. Nothing is retried.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::core::cache::{CollectionCache, LocalCache};
use crate::core::record::{Collection, OwnedRecord, Record, Role, User};
use crate::core::store::{RemoteStore, StoreError};

/// Asks the operator a yes/no question before a mutation
pub trait Prompter {
    /// `true` to proceed
    fn confirm(&self, message: &str) -> bool;
}

/// Answers every prompt with yes (`--yes`)
pub struct AssumeYes;

impl Prompter for AssumeYes {
    fn confirm(&self, _message: &str) -> bool {
        true
    }
}

/// Where an action currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Idle,
    Confirming,
    Aborted,
    Submitting,
    Succeeded,
    Failed,
}

impl std::fmt::Display for ActionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionState::Idle => write!(f, "idle"),
            ActionState::Confirming => write!(f, "confirming"),
            ActionState::Aborted => write!(f, "aborted"),
            ActionState::Submitting => write!(f, "submitting"),
            ActionState::Succeeded => write!(f, "succeeded"),
            ActionState::Failed => write!(f, "failed"),
        }
    }
}

/// Why an action failed
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("No {} with id '{id}' in the loaded {collection}", .collection.singular())]
    NotCached { collection: Collection, id: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    PartialCascade(CascadeReport),
}

/// How an action ended
#[derive(Debug)]
pub enum ActionOutcome<T> {
    /// The operator declined; nothing changed
    Aborted,
    Succeeded(T),
    Failed(ActionError),
}

impl<T> ActionOutcome<T> {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, ActionOutcome::Succeeded(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, ActionOutcome::Aborted)
    }
}

/// A single deletion that the remote store rejected during a cascade
#[derive(Debug)]
pub struct CascadeFailure {
    pub collection: Collection,
    pub id: String,
    pub error: StoreError,
}

/// Per-record results of a cascading user deletion
#[derive(Debug)]
pub struct CascadeReport {
    pub user_id: String,
    /// Related records confirmed deleted remotely, in deletion order
    pub deleted: Vec<(Collection, String)>,
    pub failed: Vec<CascadeFailure>,
    pub user_deleted: bool,
}

impl CascadeReport {
    fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            deleted: Vec::new(),
            failed: Vec::new(),
            user_deleted: false,
        }
    }

    /// Every related record and the user itself were deleted
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.user_deleted
    }

    /// Deletions attempted, including the user record
    pub fn attempted(&self) -> usize {
        self.deleted.len() + self.failed.len() + usize::from(self.user_deleted)
    }

    /// Deletions that failed; a failed user deletion is listed in `failed` too
    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn deleted_in(&self, collection: Collection) -> usize {
        self.deleted.iter().filter(|(c, _)| *c == collection).count()
    }
}

impl std::fmt::Display for CascadeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_complete() {
            write!(
                f,
                "Deleted user '{}' and {} related record(s)",
                self.user_id,
                self.deleted.len()
            )
        } else {
            write!(
                f,
                "Deleting user '{}' was incomplete: {} of {} deletions failed",
                self.user_id,
                self.failure_count(),
                self.attempted()
            )
        }
    }
}

/// Applies confirmed mutations to the remote store, then to the local cache
pub struct ActionDispatcher<'a> {
    store: &'a dyn RemoteStore,
    prompter: &'a dyn Prompter,
    state: ActionState,
    trail: Vec<ActionState>,
}

impl<'a> ActionDispatcher<'a> {
    pub fn new(store: &'a dyn RemoteStore, prompter: &'a dyn Prompter) -> Self {
        Self {
            store,
            prompter,
            state: ActionState::Idle,
            trail: Vec::new(),
        }
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    /// States visited by the most recent action, ending in `Idle`
    pub fn last_trail(&self) -> &[ActionState] {
        &self.trail
    }

    fn begin(&mut self) {
        self.trail.clear();
        self.state = ActionState::Idle;
    }

    fn enter(&mut self, next: ActionState) {
        debug!(from = %self.state, to = %next, "action transition");
        self.state = next;
        self.trail.push(next);
    }

    /// Ask for confirmation; on decline the machine returns to `Idle`
    fn confirm(&mut self, message: &str) -> bool {
        self.enter(ActionState::Confirming);
        if self.prompter.confirm(message) {
            self.enter(ActionState::Submitting);
            true
        } else {
            self.enter(ActionState::Aborted);
            self.enter(ActionState::Idle);
            false
        }
    }

    fn finish<T>(&mut self, result: Result<T, ActionError>) -> ActionOutcome<T> {
        match result {
            Ok(value) => {
                self.enter(ActionState::Succeeded);
                self.enter(ActionState::Idle);
                ActionOutcome::Succeeded(value)
            }
            Err(err) => {
                error!(error = %err, "action failed");
                self.enter(ActionState::Failed);
                self.enter(ActionState::Idle);
                ActionOutcome::Failed(err)
            }
        }
    }

    /// Delete one record remotely, then drop it from its cache
    ///
    /// On remote failure the cached record stays as it was.
    pub fn delete_record<R: Record>(
        &mut self,
        cache: &mut CollectionCache<R>,
        id: &str,
    ) -> ActionOutcome<()> {
        self.begin();
        let collection = R::COLLECTION;
        let message = format!("Delete {} '{}'?", collection.singular(), id);
        if !self.confirm(&message) {
            return ActionOutcome::Aborted;
        }

        let result = self
            .store
            .delete(collection, id)
            .map(|()| {
                cache.remove(id);
                info!(%collection, id, "deleted record");
            })
            .map_err(ActionError::from);
        self.finish(result)
    }

    /// Delete a user together with every cached item and notification it owns
    ///
    /// Related records come from the cache only. Each deletion is attempted
    /// even if an earlier one failed, and only confirmed deletions are
    /// removed locally. The report lists every outcome.
    pub fn delete_user_cascade(
        &mut self,
        cache: &mut LocalCache,
        user_id: &str,
    ) -> ActionOutcome<CascadeReport> {
        self.begin();
        let items = owned_ids(&cache.items, user_id);
        let notifications = owned_ids(&cache.notifications, user_id);

        let message = format!(
            "Delete user '{}' together with {} item(s) and {} notification(s)?",
            user_id,
            items.len(),
            notifications.len()
        );
        if !self.confirm(&message) {
            return ActionOutcome::Aborted;
        }

        let mut report = CascadeReport::new(user_id);
        let related = items
            .iter()
            .map(|id| (Collection::Items, id))
            .chain(notifications.iter().map(|id| (Collection::Notifications, id)));
        for (collection, id) in related {
            match self.store.delete(collection, id) {
                Ok(()) => report.deleted.push((collection, id.clone())),
                Err(error) => {
                    error!(%collection, id = id.as_str(), %error, "cascade step failed");
                    report.failed.push(CascadeFailure {
                        collection,
                        id: id.clone(),
                        error,
                    });
                }
            }
        }

        match self.store.delete(Collection::Users, user_id) {
            Ok(()) => report.user_deleted = true,
            Err(error) => {
                error!(user_id, %error, "deleting user record failed");
                report.failed.push(CascadeFailure {
                    collection: Collection::Users,
                    id: user_id.to_string(),
                    error,
                });
            }
        }

        for (collection, id) in &report.deleted {
            match collection {
                Collection::Items => {
                    cache.items.remove(id);
                }
                Collection::Notifications => {
                    cache.notifications.remove(id);
                }
                Collection::Users => {}
            }
        }
        if report.user_deleted {
            cache.users.remove(user_id);
        }

        info!(
            user_id,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            user_deleted = report.user_deleted,
            "cascade finished"
        );

        let result = if report.is_complete() {
            Ok(report)
        } else {
            Err(ActionError::PartialCascade(report))
        };
        self.finish(result)
    }

    /// Flip a cached user between `admin` and `user`
    ///
    /// Only the `role` field is written. The local patch is trusted once the
    /// remote update returns; nothing is re-read.
    pub fn toggle_role(
        &mut self,
        users: &mut CollectionCache<User>,
        user_id: &str,
    ) -> ActionOutcome<Role> {
        self.begin();
        let Some(user) = users.get(user_id) else {
            return self.finish(Err(ActionError::NotCached {
                collection: Collection::Users,
                id: user_id.to_string(),
            }));
        };
        let current = user.role_label().to_string();
        let next = user.role().toggled();

        let message = format!(
            "Change role of '{}' from \"{}\" to \"{}\"?",
            user_id, current, next
        );
        if !self.confirm(&message) {
            return ActionOutcome::Aborted;
        }

        let mut fields = Map::new();
        fields.insert("role".to_string(), Value::String(next.as_str().to_string()));

        let result = self
            .store
            .update_fields(Collection::Users, user_id, &fields)
            .map_err(ActionError::from)
            .and_then(|()| {
                users
                    .patch(user_id, &fields)
                    .map_err(|e| ActionError::Store(StoreError::Decode(e.to_string())))
            })
            .map(|_| {
                info!(user_id, role = %next, "role updated");
                next
            });
        self.finish(result)
    }
}

fn owned_ids<R: OwnedRecord>(cache: &CollectionCache<R>, user_id: &str) -> Vec<String> {
    cache
        .records()
        .iter()
        .filter(|r| r.owner_id() == Some(user_id))
        .map(|r| r.id().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::{FailOn, MemoryStore};
    use serde_json::json;
    use std::cell::RefCell;

    /// Replays canned answers and records the questions asked
    struct Scripted {
        answers: RefCell<Vec<bool>>,
        asked: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(answers: &[bool]) -> Self {
            Self {
                answers: RefCell::new(answers.iter().rev().copied().collect()),
                asked: RefCell::new(Vec::new()),
            }
        }
    }

    impl Prompter for Scripted {
        fn confirm(&self, message: &str) -> bool {
            self.asked.borrow_mut().push(message.to_string());
            self.answers.borrow_mut().pop().unwrap_or(false)
        }
    }

    fn loaded(store: &MemoryStore) -> LocalCache {
        let mut cache = LocalCache::new();
        cache.items.ensure_loaded(store).unwrap();
        cache.users.ensure_loaded(store).unwrap();
        cache.notifications.ensure_loaded(store).unwrap();
        cache
    }

    #[test]
    fn test_declined_delete_changes_nothing() {
        let store = MemoryStore::new();
        store.insert_json(Collection::Items, "a", json!({}));
        let mut cache = loaded(&store);
        let prompter = Scripted::new(&[false]);
        let mut dispatcher = ActionDispatcher::new(&store, &prompter);

        let outcome = dispatcher.delete_record(&mut cache.items, "a");
        assert!(outcome.is_aborted());
        assert!(cache.items.contains("a"));
        assert!(store.contains(Collection::Items, "a"));
        assert_eq!(store.write_calls(), 0);
        assert_eq!(
            dispatcher.last_trail(),
            [ActionState::Confirming, ActionState::Aborted, ActionState::Idle]
        );
    }

    #[test]
    fn test_delete_record_removes_after_remote_success() {
        let store = MemoryStore::new();
        store.insert_json(Collection::Items, "a", json!({}));
        store.insert_json(Collection::Items, "b", json!({}));
        let mut cache = loaded(&store);
        let mut dispatcher = ActionDispatcher::new(&store, &AssumeYes);

        assert!(dispatcher.delete_record(&mut cache.items, "a").is_succeeded());
        assert!(!cache.items.contains("a"));
        assert!(!store.contains(Collection::Items, "a"));
        assert_eq!(dispatcher.state(), ActionState::Idle);
        assert_eq!(
            dispatcher.last_trail(),
            [
                ActionState::Confirming,
                ActionState::Submitting,
                ActionState::Succeeded,
                ActionState::Idle
            ]
        );
    }

    #[test]
    fn test_delete_record_failure_keeps_cache() {
        let store = MemoryStore::new();
        store.insert_json(Collection::Notifications, "n1", json!({}));
        store.fail(FailOn::Delete, Collection::Notifications, Some("n1"));
        let mut cache = loaded(&store);
        let mut dispatcher = ActionDispatcher::new(&store, &AssumeYes);

        let outcome = dispatcher.delete_record(&mut cache.notifications, "n1");
        assert!(matches!(outcome, ActionOutcome::Failed(ActionError::Store(_))));
        assert!(cache.notifications.contains("n1"));
        assert_eq!(dispatcher.state(), ActionState::Idle);
        assert_eq!(dispatcher.last_trail()[2], ActionState::Failed);
    }

    #[test]
    fn test_repeated_delete_is_harmless() {
        let store = MemoryStore::new();
        store.insert_json(Collection::Items, "a", json!({}));
        let mut cache = loaded(&store);
        let mut dispatcher = ActionDispatcher::new(&store, &AssumeYes);

        assert!(dispatcher.delete_record(&mut cache.items, "a").is_succeeded());
        assert!(dispatcher.delete_record(&mut cache.items, "a").is_succeeded());
        assert!(cache.items.is_empty());
        assert_eq!(store.write_calls(), 2);
    }

    #[test]
    fn test_cascade_deletes_owned_records() {
        let store = MemoryStore::new();
        store.insert_json(Collection::Users, "u1", json!({}));
        store.insert_json(Collection::Users, "u2", json!({}));
        store.insert_json(Collection::Items, "x", json!({"userId": "u1"}));
        store.insert_json(Collection::Items, "y", json!({"userId": "u2"}));
        store.insert_json(Collection::Notifications, "n", json!({"userId": "u1"}));
        let mut cache = loaded(&store);
        let prompter = Scripted::new(&[true]);
        let mut dispatcher = ActionDispatcher::new(&store, &prompter);

        let ActionOutcome::Succeeded(report) = dispatcher.delete_user_cascade(&mut cache, "u1")
        else {
            panic!("cascade should succeed");
        };
        assert!(report.is_complete());
        assert_eq!(report.deleted_in(Collection::Items), 1);
        assert_eq!(report.deleted_in(Collection::Notifications), 1);
        assert!(!cache.users.contains("u1"));
        assert!(!cache.items.contains("x"));
        assert!(cache.items.contains("y"));
        assert!(cache.notifications.is_empty());
        assert!(prompter.asked.borrow()[0].contains("1 item(s) and 1 notification(s)"));
    }

    #[test]
    fn test_cascade_continues_past_failures() {
        let store = MemoryStore::new();
        store.insert_json(Collection::Users, "u1", json!({}));
        store.insert_json(Collection::Items, "x", json!({"userId": "u1"}));
        store.insert_json(Collection::Items, "z", json!({"userId": "u1"}));
        store.fail(FailOn::Delete, Collection::Items, Some("x"));
        let mut cache = loaded(&store);
        let mut dispatcher = ActionDispatcher::new(&store, &AssumeYes);

        let ActionOutcome::Failed(ActionError::PartialCascade(report)) =
            dispatcher.delete_user_cascade(&mut cache, "u1")
        else {
            panic!("cascade should report partial failure");
        };
        assert!(report.user_deleted);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, "x");
        assert_eq!(report.deleted, [(Collection::Items, "z".to_string())]);
        assert!(cache.items.contains("x"));
        assert!(!cache.items.contains("z"));
        assert!(!cache.users.contains("u1"));
        assert_eq!(dispatcher.state(), ActionState::Idle);
    }

    #[test]
    fn test_cascade_keeps_user_when_user_delete_fails() {
        let store = MemoryStore::new();
        store.insert_json(Collection::Users, "u1", json!({}));
        store.fail(FailOn::Delete, Collection::Users, Some("u1"));
        let mut cache = loaded(&store);
        let mut dispatcher = ActionDispatcher::new(&store, &AssumeYes);

        let outcome = dispatcher.delete_user_cascade(&mut cache, "u1");
        let ActionOutcome::Failed(err) = outcome else {
            panic!("expected failure");
        };
        assert!(err.to_string().contains("1 of 1 deletions failed"));
        assert!(cache.users.contains("u1"));
    }

    #[test]
    fn test_toggle_role_round_trip() {
        let store = MemoryStore::new();
        store.insert_json(Collection::Users, "u1", json!({"email": "a@b.c"}));
        let mut cache = loaded(&store);
        let mut dispatcher = ActionDispatcher::new(&store, &AssumeYes);

        let ActionOutcome::Succeeded(role) = dispatcher.toggle_role(&mut cache.users, "u1") else {
            panic!("toggle should succeed");
        };
        assert_eq!(role, Role::Admin);
        assert_eq!(cache.users.get("u1").unwrap().role.as_deref(), Some("admin"));
        assert_eq!(
            store.document(Collection::Users, "u1").unwrap().fields["role"],
            json!("admin")
        );

        dispatcher.toggle_role(&mut cache.users, "u1");
        let user: &User = cache.users.get("u1").unwrap();
        assert_eq!(user.role.as_deref(), Some("user"));
        assert_eq!(user.email.as_deref(), Some("a@b.c"));
    }

    #[test]
    fn test_toggle_role_failure_leaves_cache() {
        let store = MemoryStore::new();
        store.insert_json(Collection::Users, "u1", json!({"role": "admin"}));
        store.fail(FailOn::Update, Collection::Users, Some("u1"));
        let mut cache = loaded(&store);
        let mut dispatcher = ActionDispatcher::new(&store, &AssumeYes);

        assert!(matches!(
            dispatcher.toggle_role(&mut cache.users, "u1"),
            ActionOutcome::Failed(_)
        ));
        assert_eq!(cache.users.get("u1").unwrap().role.as_deref(), Some("admin"));
    }

    #[test]
    fn test_toggle_role_unknown_user_skips_prompt() {
        let store = MemoryStore::new();
        let mut cache = LocalCache::new();
        let prompter = Scripted::new(&[true]);
        let mut dispatcher = ActionDispatcher::new(&store, &prompter);

        let outcome = dispatcher.toggle_role(&mut cache.users, "ghost");
        assert!(matches!(
            outcome,
            ActionOutcome::Failed(ActionError::NotCached { .. })
        ));
        assert!(prompter.asked.borrow().is_empty());
        assert_eq!(dispatcher.state(), ActionState::Idle);
    }

    #[test]
    fn test_cascade_uses_cache_not_remote() {
        let store = MemoryStore::new();
        store.insert_json(Collection::Users, "u1", json!({}));
        let mut cache = loaded(&store);
        // Created after the snapshot; the cascade cannot see it
        store.insert_json(Collection::Items, "late", json!({"userId": "u1"}));
        let mut dispatcher = ActionDispatcher::new(&store, &AssumeYes);

        assert!(dispatcher.delete_user_cascade(&mut cache, "u1").is_succeeded());
        assert!(store.contains(Collection::Items, "late"));
    }
}

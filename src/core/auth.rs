//! Administrator sign-in and session persistence
//!
//! Credentials are checked by the hosted identity service; admin rights are
//! a separate lookup of the `role` field on the signed-in user's record.
//! A successful admin sign-in is saved to disk so later invocations reuse
//! it until `lfa logout`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::core::config::Config;
use crate::core::record::{Collection, Record, Role, User};
use crate::core::store::{RemoteStore, StoreError};

const SIGN_IN_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:signInWithPassword";
const REFRESH_URL: &str = "https://securetoken.googleapis.com/v1/token";

/// Refresh tokens this close to expiry
const REFRESH_MARGIN_SECS: i64 = 60;

/// Errors that can occur while signing in or restoring a session
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Sign-in failed: {0}")]
    InvalidCredentials(String),

    #[error("This account is not allowed to use the admin console")]
    NotAdmin,

    #[error("Not signed in. Run 'lfa login' first")]
    NotSignedIn,

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Session file error: {0}")]
    Session(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tokens issued by the identity service
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub uid: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Verifies credentials against the identity service
pub trait Authenticator {
    fn sign_in(&self, email: &str, password: &str) -> Result<Credentials, AuthError>;

    fn refresh(&self, refresh_token: &str) -> Result<Credentials, AuthError>;
}

/// Firebase Authentication over its REST endpoints
pub struct FirebaseAuth {
    agent: ureq::Agent,
    api_key: String,
}

impl FirebaseAuth {
    pub fn new(agent: ureq::Agent, api_key: impl Into<String>) -> Self {
        Self {
            agent,
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, crate::core::config::ConfigError> {
        Ok(Self::new(config.http_agent(), config.api_key()?))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    user_id: String,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

fn expiry(expires_in: &str) -> DateTime<Utc> {
    let secs = expires_in.parse::<i64>().unwrap_or(0);
    Utc::now() + Duration::seconds(secs)
}

fn map_error(err: ureq::Error) -> AuthError {
    match err {
        ureq::Error::Status(status, response) => {
            let message = response
                .into_json::<ErrorEnvelope>()
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            AuthError::InvalidCredentials(message)
        }
        ureq::Error::Transport(t) => AuthError::Transport(t.to_string()),
    }
}

impl Authenticator for FirebaseAuth {
    fn sign_in(&self, email: &str, password: &str) -> Result<Credentials, AuthError> {
        debug!(email, "signing in");
        let response: SignInResponse = self
            .agent
            .post(SIGN_IN_URL)
            .query("key", &self.api_key)
            .send_json(serde_json::json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .map_err(map_error)?
            .into_json()
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        Ok(Credentials {
            uid: response.local_id,
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            expires_at: expiry(&response.expires_in),
        })
    }

    fn refresh(&self, refresh_token: &str) -> Result<Credentials, AuthError> {
        debug!("refreshing id token");
        let response: RefreshResponse = self
            .agent
            .post(REFRESH_URL)
            .query("key", &self.api_key)
            .send_form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .map_err(map_error)?
            .into_json()
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        Ok(Credentials {
            uid: response.user_id,
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            expires_at: expiry(&response.expires_in),
        })
    }
}

/// Check that `uid` has an admin record in the users collection
pub fn verify_admin(store: &dyn RemoteStore, uid: &str) -> Result<(), AuthError> {
    let Some(doc) = store.get(Collection::Users, uid)? else {
        return Err(AuthError::NotAdmin);
    };
    let user = User::from_document(doc).map_err(|e| StoreError::Decode(e.to_string()))?;
    if user.role() == Role::Admin {
        Ok(())
    } else {
        Err(AuthError::NotAdmin)
    }
}

/// Sign in and require the admin role before handing back a session
///
/// `store_for` builds the store from the fresh credentials so the role
/// lookup runs as the signed-in user. Nothing is persisted here.
pub fn admin_sign_in<S, F>(
    auth: &dyn Authenticator,
    email: &str,
    password: &str,
    store_for: F,
) -> Result<Session, AuthError>
where
    S: RemoteStore,
    F: FnOnce(&Credentials) -> S,
{
    let credentials = auth.sign_in(email, password)?;
    let store = store_for(&credentials);
    verify_admin(&store, &credentials.uid)?;
    debug!(uid = %credentials.uid, "admin role confirmed");
    Ok(Session::new(email, credentials))
}

/// A signed-in administrator, as saved between invocations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub uid: String,
    pub email: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(email: &str, credentials: Credentials) -> Self {
        Self {
            uid: credentials.uid,
            email: email.to_string(),
            id_token: credentials.id_token,
            refresh_token: credentials.refresh_token,
            expires_at: credentials.expires_at,
        }
    }

    /// Default session file location
    pub fn default_path() -> Option<PathBuf> {
        Config::config_dir().map(|dir| dir.join("session.json"))
    }

    /// Load a saved session; a missing file means not signed in
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        if !path.exists() {
            return Err(AuthError::NotSignedIn);
        }
        let contents = fs::read_to_string(path).map_err(|e| AuthError::Session(e.to_string()))?;
        serde_json::from_str(&contents).map_err(|e| AuthError::Session(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), AuthError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| AuthError::Session(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| AuthError::Session(e.to_string()))?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(path)
            .map_err(|e| AuthError::Session(e.to_string()))?;

        // `mode` only applies on creation; tighten a file left by an older save
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(|e| AuthError::Session(e.to_string()))?;
        }

        file.write_all(json.as_bytes())
            .map_err(|e| AuthError::Session(e.to_string()))
    }

    /// Delete the saved session; returns whether one existed
    pub fn remove(path: &Path) -> Result<bool, AuthError> {
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path).map_err(|e| AuthError::Session(e.to_string()))?;
        Ok(true)
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) <= now
    }

    /// Swap in fresh tokens if the current id token is about to expire
    ///
    /// Returns whether a refresh happened.
    pub fn ensure_fresh(&mut self, auth: &dyn Authenticator) -> Result<bool, AuthError> {
        if !self.needs_refresh(Utc::now()) {
            return Ok(false);
        }
        let credentials = auth.refresh(&self.refresh_token)?;
        self.id_token = credentials.id_token;
        self.refresh_token = credentials.refresh_token;
        self.expires_at = credentials.expires_at;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryStore;
    use serde_json::json;
    use std::cell::Cell;
    use tempfile::TempDir;

    struct FakeAuth {
        refreshed: Cell<usize>,
    }

    impl Authenticator for FakeAuth {
        fn sign_in(&self, email: &str, password: &str) -> Result<Credentials, AuthError> {
            if password != "secret" {
                return Err(AuthError::InvalidCredentials("INVALID_PASSWORD".into()));
            }
            Ok(Credentials {
                uid: email.to_string(),
                id_token: "id-1".into(),
                refresh_token: "rt-1".into(),
                expires_at: Utc::now() + Duration::hours(1),
            })
        }

        fn refresh(&self, _refresh_token: &str) -> Result<Credentials, AuthError> {
            self.refreshed.set(self.refreshed.get() + 1);
            Ok(Credentials {
                uid: "u1".into(),
                id_token: "id-2".into(),
                refresh_token: "rt-2".into(),
                expires_at: Utc::now() + Duration::hours(1),
            })
        }
    }

    fn session(expires_at: DateTime<Utc>) -> Session {
        Session {
            uid: "u1".into(),
            email: "admin@example.com".into(),
            id_token: "id-1".into(),
            refresh_token: "rt-1".into(),
            expires_at,
        }
    }

    #[test]
    fn test_verify_admin() {
        let store = MemoryStore::new();
        store.insert_json(Collection::Users, "boss", json!({"role": "admin"}));
        store.insert_json(Collection::Users, "member", json!({"role": "user"}));
        store.insert_json(Collection::Users, "blank", json!({}));

        assert!(verify_admin(&store, "boss").is_ok());
        assert!(matches!(verify_admin(&store, "member"), Err(AuthError::NotAdmin)));
        assert!(matches!(verify_admin(&store, "blank"), Err(AuthError::NotAdmin)));
        assert!(matches!(verify_admin(&store, "nobody"), Err(AuthError::NotAdmin)));
    }

    #[test]
    fn test_session_round_trip_and_remove() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("session.json");

        assert!(matches!(Session::load(&path), Err(AuthError::NotSignedIn)));

        let saved = session(Utc::now());
        saved.save(&path).unwrap();
        assert_eq!(Session::load(&path).unwrap(), saved);

        assert!(Session::remove(&path).unwrap());
        assert!(!Session::remove(&path).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("session.json");

        session(Utc::now()).save(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        // An existing, wider file is tightened before the tokens go in
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        session(Utc::now()).save(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_ensure_fresh_only_near_expiry() {
        let auth = FakeAuth {
            refreshed: Cell::new(0),
        };

        let mut fresh = session(Utc::now() + Duration::hours(1));
        assert!(!fresh.ensure_fresh(&auth).unwrap());
        assert_eq!(fresh.id_token, "id-1");

        let mut stale = session(Utc::now() + Duration::seconds(5));
        assert!(stale.ensure_fresh(&auth).unwrap());
        assert_eq!(stale.id_token, "id-2");
        assert_eq!(stale.refresh_token, "rt-2");
        assert_eq!(auth.refreshed.get(), 1);
    }

    #[test]
    fn test_admin_sign_in_gates_on_role() {
        let auth = FakeAuth {
            refreshed: Cell::new(0),
        };
        let store = MemoryStore::new();
        store.insert_json(Collection::Users, "boss@example.com", json!({"role": "admin"}));
        store.insert_json(Collection::Users, "member@example.com", json!({}));

        let session = admin_sign_in(&auth, "boss@example.com", "secret", |_| &store).unwrap();
        assert_eq!(session.uid, "boss@example.com");
        assert_eq!(session.id_token, "id-1");

        let err = admin_sign_in(&auth, "member@example.com", "secret", |_| &store).unwrap_err();
        assert!(matches!(err, AuthError::NotAdmin));

        let err = admin_sign_in(&auth, "boss@example.com", "wrong", |_| &store).unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
    }

    #[test]
    fn test_sign_in_rejection_surfaces_message() {
        let auth = FakeAuth {
            refreshed: Cell::new(0),
        };
        let err = auth.sign_in("a@b.c", "wrong").unwrap_err();
        assert_eq!(err.to_string(), "Sign-in failed: INVALID_PASSWORD");
        let creds = auth.sign_in("a@b.c", "secret").unwrap();
        assert_eq!(Session::new("a@b.c", creds).email, "a@b.c");
    }
}

//! Structured records for the admin collections
//!
//! Remote documents are loosely typed: any field may be missing, and the
//! same field may hold a string in one document and a number in another.
//! The types here pin every field down to an explicit `Option`, decode
//! leniently, and keep unknown fields in `extra` so that a patched record
//! still carries everything the remote document had.

use std::borrow::Cow;
use std::fmt::Debug;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::ValueEnum;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::core::store::Document;

/// A named group of records of one kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Items,
    Users,
    Notifications,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Items,
        Collection::Users,
        Collection::Notifications,
    ];

    /// Collection name in the remote store
    pub fn remote_name(&self) -> &'static str {
        match self {
            Collection::Items => "lost_found_items",
            Collection::Users => "users",
            Collection::Notifications => "notifications",
        }
    }

    /// Human label for one record of this collection
    pub fn singular(&self) -> &'static str {
        match self {
            Collection::Items => "item",
            Collection::Users => "user",
            Collection::Notifications => "notification",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Collection::Items => write!(f, "items"),
            Collection::Users => write!(f, "users"),
            Collection::Notifications => write!(f, "notifications"),
        }
    }
}

/// Two-valued user role
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    /// Interpret a raw role field; anything other than "admin" is the default role
    pub fn from_field(raw: Option<&str>) -> Self {
        match raw {
            Some("admin") => Role::Admin,
            _ => Role::User,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Role::Admin => Role::User,
            Role::User => Role::Admin,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Common interface for records held in a collection cache
pub trait Record: Serialize + DeserializeOwned + Clone + Debug {
    /// The collection this record type lives in
    const COLLECTION: Collection;

    /// Facet dimensions this record type can be filtered on
    type Facet: Copy + Eq + Debug;

    /// Stable identifier, unique within the collection
    fn id(&self) -> &str;

    /// Present, stringifiable fields considered by free-text search
    fn search_candidates(&self) -> Vec<Cow<'_, str>>;

    /// The record's value for a facet dimension, if present
    fn facet_value(&self, facet: Self::Facet) -> Option<Cow<'_, str>>;

    /// Build a record from a remote document; the document id wins over any `id` field
    fn from_document(doc: Document) -> Result<Self, serde_json::Error> {
        let mut fields = doc.fields;
        fields.insert("id".to_string(), Value::String(doc.id));
        serde_json::from_value(Value::Object(fields))
    }

    /// Return a copy with `fields` merged over the current field map
    ///
    /// The `id` key is never overwritten.
    fn patched(&self, fields: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            for (key, field) in fields {
                if key != "id" {
                    map.insert(key.clone(), field.clone());
                }
            }
        }
        serde_json::from_value(value)
    }
}

/// Records that reference a user through a `userId` foreign key
pub trait OwnedRecord: Record {
    fn owner_id(&self) -> Option<&str>;
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// A lost or found listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,

    /// Free-text date entered by the poster
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(default, deserialize_with = "loose_bool", skip_serializing_if = "Option::is_none")]
    pub is_lost_item: Option<bool>,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,

    #[serde(default, deserialize_with = "loose_timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Facet dimensions for items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemFacet {
    Building,
    /// Derived "Lost"/"Found" label
    Status,
}

impl Item {
    /// A bare item with only an id; used by tests and fixtures
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            detail: None,
            description: None,
            category_name: None,
            building: None,
            room: None,
            location: None,
            contact: None,
            date: None,
            image_url: None,
            is_lost_item: None,
            user_id: None,
            user_name: None,
            created_at: None,
            extra: Map::new(),
        }
    }

    /// Absent `isLostItem` means the item was found
    pub fn is_lost(&self) -> bool {
        self.is_lost_item.unwrap_or(false)
    }

    pub fn status_label(&self) -> &'static str {
        if self.is_lost() {
            "Lost"
        } else {
            "Found"
        }
    }

    /// Heading: title, then detail
    pub fn heading(&self) -> Option<&str> {
        self.title.as_deref().or(self.detail.as_deref())
    }

    /// Where: room, then location
    pub fn place(&self) -> Option<&str> {
        self.room.as_deref().or(self.location.as_deref())
    }

    /// Long text: description, then detail
    pub fn body(&self) -> Option<&str> {
        self.description.as_deref().or(self.detail.as_deref())
    }

    /// Poster: user name, then user id
    pub fn poster(&self) -> Option<&str> {
        self.user_name.as_deref().or(self.user_id.as_deref())
    }

    /// Timestamp used for recency ordering
    ///
    /// Prefers `createdAt`, then a parsable free-text `date`, then the epoch.
    pub fn effective_timestamp(&self) -> DateTime<Utc> {
        self.created_at
            .or_else(|| self.date.as_deref().and_then(parse_loose_date))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }
}

impl Record for Item {
    const COLLECTION: Collection = Collection::Items;
    type Facet = ItemFacet;

    fn id(&self) -> &str {
        &self.id
    }

    fn search_candidates(&self) -> Vec<Cow<'_, str>> {
        [
            &self.title,
            &self.detail,
            &self.description,
            &self.category_name,
            &self.building,
            &self.room,
            &self.location,
            &self.contact,
            &self.date,
        ]
        .into_iter()
        .filter_map(|f| f.as_deref().map(Cow::Borrowed))
        .chain(std::iter::once(Cow::Borrowed(self.status_label())))
        .collect()
    }

    fn facet_value(&self, facet: ItemFacet) -> Option<Cow<'_, str>> {
        match facet {
            ItemFacet::Building => self.building.as_deref().map(Cow::Borrowed),
            ItemFacet::Status => Some(Cow::Borrowed(self.status_label())),
        }
    }
}

impl OwnedRecord for Item {
    fn owner_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// An application account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Raw role field; see [`User::role`] for the interpreted value
    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, deserialize_with = "loose_timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Facet dimensions for users
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserFacet {
    Role,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            name: None,
            display_name: None,
            role: None,
            created_at: None,
            extra: Map::new(),
        }
    }

    /// Name, then display name
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.display_name.as_deref())
    }

    pub fn role(&self) -> Role {
        Role::from_field(self.role.as_deref())
    }

    /// Raw role for display; absent shows as the default role
    pub fn role_label(&self) -> &str {
        self.role.as_deref().unwrap_or(Role::User.as_str())
    }
}

impl Record for User {
    const COLLECTION: Collection = Collection::Users;
    type Facet = UserFacet;

    fn id(&self) -> &str {
        &self.id
    }

    fn search_candidates(&self) -> Vec<Cow<'_, str>> {
        [&self.email, &self.name, &self.display_name]
            .into_iter()
            .filter_map(|f| f.as_deref().map(Cow::Borrowed))
            .collect()
    }

    fn facet_value(&self, facet: UserFacet) -> Option<Cow<'_, str>> {
        match facet {
            UserFacet::Role => self.role.as_deref().map(Cow::Borrowed),
        }
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// A notification sent to a user (typically a smart match)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(
        rename = "type",
        default,
        deserialize_with = "loose_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "loose_string", skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Match confidence in 0..=1
    #[serde(default, deserialize_with = "loose_f64", skip_serializing_if = "Option::is_none")]
    pub match_score: Option<f64>,

    #[serde(default, deserialize_with = "loose_bool", skip_serializing_if = "Option::is_none")]
    pub is_read: Option<bool>,

    #[serde(default, deserialize_with = "loose_timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Facet dimensions for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationFacet {
    /// `isRead` compared as "true"/"false"
    Read,
}

impl Notification {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: None,
            kind: None,
            title: None,
            body: None,
            match_score: None,
            is_read: None,
            created_at: None,
            extra: Map::new(),
        }
    }

    pub fn kind_label(&self) -> &str {
        self.kind.as_deref().unwrap_or("smart_match")
    }

    /// Match score as a rounded percentage; a zero score shows as absent
    pub fn match_percent(&self) -> Option<i64> {
        self.match_score
            .filter(|s| *s != 0.0)
            .map(|s| (s * 100.0).round() as i64)
    }
}

impl Record for Notification {
    const COLLECTION: Collection = Collection::Notifications;
    type Facet = NotificationFacet;

    fn id(&self) -> &str {
        &self.id
    }

    fn search_candidates(&self) -> Vec<Cow<'_, str>> {
        [&self.title, &self.body]
            .into_iter()
            .filter_map(|f| f.as_deref().map(Cow::Borrowed))
            .collect()
    }

    fn facet_value(&self, facet: NotificationFacet) -> Option<Cow<'_, str>> {
        match facet {
            NotificationFacet::Read => self
                .is_read
                .map(|read| Cow::Borrowed(if read { "true" } else { "false" })),
        }
    }
}

impl OwnedRecord for Notification {
    fn owner_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Lenient field decoding
// ---------------------------------------------------------------------------

/// Strings, numbers and booleans become text; empty strings and anything else are absent
fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn loose_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => match s.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

fn loose_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// RFC 3339 strings, `{seconds, nanoseconds}` objects, or epoch
/// milliseconds (the `Date.now()` form)
fn loose_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Some(Value::Object(map)) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64);
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            seconds.and_then(|s| Utc.timestamp_opt(s, nanos as u32).single())
        }
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    })
}

/// Parse a free-text date: RFC 3339 first, then a plain `YYYY-MM-DD`
pub fn parse_loose_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, fields: Value) -> Document {
        Document {
            id: id.to_string(),
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_item_from_document_is_lenient() {
        let item = Item::from_document(doc(
            "a",
            json!({
                "title": "Blue umbrella",
                "room": 304,
                "isLostItem": true,
                "building": "",
                "createdAt": "not a timestamp",
                "likes": 3
            }),
        ))
        .unwrap();

        assert_eq!(item.id, "a");
        assert_eq!(item.room.as_deref(), Some("304"));
        assert_eq!(item.building, None);
        assert_eq!(item.created_at, None);
        assert!(item.is_lost());
        assert_eq!(item.extra.get("likes"), Some(&json!(3)));
    }

    #[test]
    fn test_document_id_overrides_field() {
        let user = User::from_document(doc("u1", json!({"id": "spoofed"}))).unwrap();
        assert_eq!(user.id, "u1");
    }

    #[test]
    fn test_item_fallbacks() {
        let mut item = Item::new("a");
        item.detail = Some("Wallet".into());
        item.location = Some("Lobby".into());
        item.user_id = Some("u1".into());
        assert_eq!(item.heading(), Some("Wallet"));
        assert_eq!(item.body(), Some("Wallet"));
        assert_eq!(item.place(), Some("Lobby"));
        assert_eq!(item.poster(), Some("u1"));
        assert_eq!(item.status_label(), "Found");

        item.title = Some("Brown wallet".into());
        item.room = Some("201".into());
        assert_eq!(item.heading(), Some("Brown wallet"));
        assert_eq!(item.place(), Some("201"));
    }

    #[test]
    fn test_effective_timestamp_precedence() {
        let mut item = Item::new("a");
        assert_eq!(item.effective_timestamp(), DateTime::<Utc>::UNIX_EPOCH);

        item.date = Some("2024-03-01".into());
        assert_eq!(
            item.effective_timestamp(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );

        item.created_at = Some(Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap());
        assert_eq!(
            item.effective_timestamp(),
            Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_timestamp_object_form() {
        let user = User::from_document(doc(
            "u1",
            json!({"createdAt": {"seconds": 1_700_000_000, "nanoseconds": 0}}),
        ))
        .unwrap();
        assert_eq!(
            user.created_at,
            Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        );
    }

    #[test]
    fn test_timestamp_epoch_millis() {
        let item = Item::from_document(doc("a", json!({"createdAt": 1_700_000_000_123_i64}))).unwrap();
        assert_eq!(
            item.created_at,
            Some(Utc.timestamp_millis_opt(1_700_000_000_123).unwrap())
        );

        let fractional = Item::from_document(doc("b", json!({"createdAt": 1_700_000_000_000.0}))).unwrap();
        assert_eq!(
            fractional.created_at,
            Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        );
    }

    #[test]
    fn test_patched_merges_and_keeps_id() {
        let mut user = User::new("u1");
        user.email = Some("a@example.com".into());
        user.extra.insert("photoUrl".into(), json!("x.png"));

        let mut fields = Map::new();
        fields.insert("role".into(), json!("admin"));
        fields.insert("id".into(), json!("other"));
        let patched = user.patched(&fields).unwrap();

        assert_eq!(patched.id, "u1");
        assert_eq!(patched.role.as_deref(), Some("admin"));
        assert_eq!(patched.email.as_deref(), Some("a@example.com"));
        assert_eq!(patched.extra.get("photoUrl"), Some(&json!("x.png")));
    }

    #[test]
    fn test_role_interpretation() {
        assert_eq!(Role::from_field(None), Role::User);
        assert_eq!(Role::from_field(Some("admin")), Role::Admin);
        assert_eq!(Role::from_field(Some("Admin")), Role::User);
        assert_eq!(Role::User.toggled(), Role::Admin);
        assert_eq!(Role::Admin.toggled().toggled(), Role::Admin);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
    }

    #[test]
    fn test_notification_labels() {
        let mut n = Notification::new("n1");
        assert_eq!(n.kind_label(), "smart_match");
        assert_eq!(n.match_percent(), None);
        assert_eq!(n.facet_value(NotificationFacet::Read), None);

        n.match_score = Some(0.876);
        n.is_read = Some(false);
        assert_eq!(n.match_percent(), Some(88));
        assert_eq!(
            n.facet_value(NotificationFacet::Read).as_deref(),
            Some("false")
        );
    }

    #[test]
    fn test_item_search_candidates_skip_absent() {
        let mut item = Item::new("a");
        item.building = Some("อาคาร 1".into());
        let candidates = item.search_candidates();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0], "อาคาร 1");
        assert_eq!(candidates[1], "Found");
    }

    #[test]
    fn test_collection_names() {
        assert_eq!(Collection::Items.remote_name(), "lost_found_items");
        assert_eq!(Collection::Items.to_string(), "items");
        assert_eq!(Collection::Notifications.remote_name(), "notifications");
    }
}

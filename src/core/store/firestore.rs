//! Firestore REST client
//!
//! Speaks the v1 documents API over blocking HTTPS. Typed Firestore values
//! (`{"stringValue": ..}`, `{"mapValue": {"fields": ..}}`, ...) are converted
//! to and from plain JSON here so that nothing above the store sees them.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};
use tracing::debug;

use crate::core::record::Collection;

use super::{Document, RemoteStore, StoreError};

const API_ROOT: &str = "https://firestore.googleapis.com/v1";

/// Bytes escaped in a document id so it stays one path segment
const ID_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Documents per list page
const PAGE_SIZE: &str = "300";

/// Client for one Firestore database, authorized with a user id token
pub struct FirestoreStore {
    agent: ureq::Agent,
    documents_url: String,
    id_token: String,
}

impl FirestoreStore {
    pub fn new(
        agent: ureq::Agent,
        project_id: &str,
        database: &str,
        id_token: impl Into<String>,
    ) -> Self {
        Self {
            agent,
            documents_url: format!(
                "{}/projects/{}/databases/{}/documents",
                API_ROOT, project_id, database
            ),
            id_token: id_token.into(),
        }
    }

    fn collection_url(&self, collection: Collection) -> String {
        format!("{}/{}", self.documents_url, collection.remote_name())
    }

    fn document_url(&self, collection: Collection, id: &str) -> String {
        format!(
            "{}/{}",
            self.collection_url(collection),
            utf8_percent_encode(id, ID_SEGMENT)
        )
    }

    fn authorized(&self, request: ureq::Request) -> ureq::Request {
        request.set("Authorization", &format!("Bearer {}", self.id_token))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<WireDocument>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct WireDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl WireDocument {
    fn into_document(self) -> Document {
        let id = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        Document::new(id, decode_fields(&self.fields))
    }
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

impl RemoteStore for FirestoreStore {
    fn list_all(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let url = self.collection_url(collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            debug!(%collection, page = ?page_token, "listing documents");
            let mut request = self
                .authorized(self.agent.get(&url))
                .query("pageSize", PAGE_SIZE);
            if let Some(token) = &page_token {
                request = request.query("pageToken", token);
            }

            let page: ListResponse = request
                .call()
                .map_err(map_error)?
                .into_json()
                .map_err(|e| StoreError::Decode(e.to_string()))?;

            documents.extend(page.documents.into_iter().map(WireDocument::into_document));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(%collection, count = documents.len(), "listed documents");
        Ok(documents)
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        debug!(%collection, id, "fetching document");
        match self
            .authorized(self.agent.get(&self.document_url(collection, id)))
            .call()
        {
            Ok(response) => {
                let doc: WireDocument = response
                    .into_json()
                    .map_err(|e| StoreError::Decode(e.to_string()))?;
                Ok(Some(doc.into_document()))
            }
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(map_error(e)),
        }
    }

    fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        debug!(%collection, id, "deleting document");
        self.authorized(self.agent.delete(&self.document_url(collection, id)))
            .call()
            .map_err(map_error)?;
        Ok(())
    }

    fn update_fields(
        &self,
        collection: Collection,
        id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), StoreError> {
        debug!(%collection, id, keys = ?fields.keys().collect::<Vec<_>>(), "patching document");
        let mut request = self
            .authorized(self.agent.request("PATCH", &self.document_url(collection, id)))
            .query("currentDocument.exists", "true");
        for key in fields.keys() {
            request = request.query("updateMask.fieldPaths", &field_path(key));
        }

        match request.send_json(json!({ "fields": encode_fields(fields) })) {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(404, _)) => Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            }),
            Err(e) => Err(map_error(e)),
        }
    }
}

fn map_error(err: ureq::Error) -> StoreError {
    match err {
        ureq::Error::Status(status, response) => {
            let message = response
                .into_json::<ErrorEnvelope>()
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {}", status));
            match status {
                401 => StoreError::Unauthenticated,
                403 => StoreError::PermissionDenied { message },
                _ => StoreError::Remote { status, message },
            }
        }
        ureq::Error::Transport(t) => StoreError::Transport(t.to_string()),
    }
}

/// Quote a field name for an update mask unless it is a plain identifier
fn field_path(key: &str) -> String {
    let simple = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        key.to_string()
    } else {
        format!("`{}`", key.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn decode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), decode_value(v)))
        .collect()
}

/// Typed Firestore value to plain JSON
fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|m| m.iter().next()) else {
        return Value::Null;
    };
    match kind.as_str() {
        "booleanValue" => inner.as_bool().map(Value::Bool).unwrap_or(Value::Null),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .or_else(|| inner.as_i64())
            .map(|n| Value::Number(n.into()))
            .unwrap_or(Value::Null),
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "geoPointValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(
            inner
                .get("fields")
                .and_then(Value::as_object)
                .map(decode_fields)
                .unwrap_or_default(),
        ),
        _ => Value::Null,
    }
}

fn encode_fields(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

/// Plain JSON to typed Firestore value
fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(values) => json!({
            "arrayValue": { "values": values.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const FIELD_ID: &str = "id";
pub const FIELD_SESSION_ID: &str = "sessionId";
pub const FIELD_THUMBNAIL: &str = "thumbnail";
pub const FIELD_PRIV_THUMBNAIL: &str = "privThumbnail";

/// A session object as listed by the Neos session API.
///
/// Only the identifier and thumbnail fields are interpreted. Everything else
/// (name, host, user counts, tags, ...) is carried through untouched, so the
/// snapshot handed to the browser keeps the exact shape the API returned.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session {
    fields: Map<String, Value>,
}

impl Session {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Session identifier, used for logging only.
    pub fn id(&self) -> Option<&str> {
        self.str_field(FIELD_ID)
            .or_else(|| self.str_field(FIELD_SESSION_ID))
    }

    /// Raw thumbnail reference. Non-string values read as no thumbnail.
    pub fn thumbnail(&self) -> Option<&str> {
        self.str_field(FIELD_THUMBNAIL)
    }

    pub fn priv_thumbnail(&self) -> Option<&str> {
        self.str_field(FIELD_PRIV_THUMBNAIL)
    }

    pub fn set_thumbnail(&mut self, value: String) {
        self.fields
            .insert(FIELD_THUMBNAIL.to_string(), Value::String(value));
    }

    pub fn clear_thumbnail(&mut self) {
        self.fields.shift_remove(FIELD_THUMBNAIL);
    }

    pub fn set_priv_thumbnail(&mut self, value: String) {
        self.fields
            .insert(FIELD_PRIV_THUMBNAIL.to_string(), Value::String(value));
    }

    /// Identifier for log lines, `"<unknown>"` when the API omitted one.
    pub fn log_id(&self) -> &str {
        self.id().unwrap_or("<unknown>")
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

//! Records: ordered collections of typed fields.
//!
//! A record is stored as a flat JSON object mapping property names to text
//! values under a key derived from its identifier. Loading goes through
//! the same validation as programmatic `set`, so a document that decodes
//! always yields a record whose fields hold normalized values.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::property::{self, Field, Property};
use crate::prompt::Prompter;
use crate::store::Store;

/// Decoded record document: property name to text value.
pub type Document = BTreeMap<String, String>;

/// Values records need at construction time.
#[derive(Debug, Clone)]
pub struct RecordContext {
    /// Default for `reported_from`.
    pub current_user: String,
    /// Completion vocabulary for user fields.
    pub contributors: Vec<String>,
    /// Identifier generation retry bound.
    pub max_id_attempts: usize,
}

impl RecordContext {
    pub fn new(current_user: impl Into<String>) -> Self {
        Self {
            current_user: current_user.into(),
            contributors: Vec::new(),
            max_id_attempts: property::DEFAULT_ID_ATTEMPTS,
        }
    }

    pub fn with_contributors(mut self, contributors: Vec<String>) -> Self {
        self.contributors = contributors;
        self
    }

    pub fn with_max_id_attempts(mut self, max_id_attempts: usize) -> Self {
        self.max_id_attempts = max_id_attempts;
        self
    }
}

impl Default for RecordContext {
    fn default() -> Self {
        Self::new("unknown")
    }
}

/// Decode a stored JSON object into a [`Document`].
///
/// Strings are taken as-is, `null` counts as absent, other scalars keep
/// their JSON text.
pub fn decode_document(data: &[u8]) -> Result<Document> {
    let value: serde_json::Value = serde_json::from_slice(data)?;
    let serde_json::Value::Object(map) = value else {
        return Err(Error::OperationFailed(
            "record document is not a JSON object".to_string(),
        ));
    };

    let mut document = Document::new();
    for (name, value) in map {
        match value {
            serde_json::Value::Null => {}
            serde_json::Value::String(text) => {
                document.insert(name, text);
            }
            other => {
                document.insert(name, other.to_string());
            }
        }
    }
    Ok(document)
}

/// Shared behaviour of issues and comments.
pub trait Record: Sized {
    /// A record with every field at its default, nothing generated yet.
    fn blank(ctx: &RecordContext) -> Self;

    fn fields(&self) -> &[Field];

    fn fields_mut(&mut self) -> &mut [Field];

    /// Names of the fields shown and edited, in order.
    fn display_order(&self) -> &'static [&'static str];

    /// Storage key of this record.
    fn path(&self) -> String;

    /// Build a record from a document; missing fields take their defaults.
    ///
    /// Stored values, empty ones included, go through `set`. Only auto-filled
    /// fields treat an empty value as missing. Auto-stamped dates share a
    /// single timestamp and an absent identifier is generated against `store`.
    fn from_document(ctx: &RecordContext, store: &dyn Store, document: &Document) -> Result<Self> {
        let mut record = Self::blank(ctx);
        for field in record.fields_mut() {
            match document.get(field.name()) {
                None => {}
                Some(value) if value.is_empty() && field.is_auto_filled() => {}
                Some(value) => field.set(value)?,
            }
        }

        let at = property::now();
        for field in record.fields_mut() {
            if let Some(date) = field.as_date_mut() {
                date.stamp_missing(at);
            }
            if let Some(id) = field.as_id_mut() {
                id.ensure_generated(store, ctx.max_id_attempts)?;
            }
        }
        Ok(record)
    }

    /// Decode stored bytes and build the record.
    fn load(ctx: &RecordContext, store: &dyn Store, data: &[u8]) -> Result<Self> {
        let document = decode_document(data)?;
        Self::from_document(ctx, store, &document)
    }

    fn get_property(&self, name: &str) -> Result<&Field> {
        self.fields()
            .iter()
            .find(|field| field.name() == name)
            .ok_or_else(|| Error::PropertyNotFound {
                name: name.to_string(),
            })
    }

    fn get_property_mut(&mut self, name: &str) -> Result<&mut Field> {
        self.fields_mut()
            .iter_mut()
            .find(|field| field.name() == name)
            .ok_or_else(|| Error::PropertyNotFound {
                name: name.to_string(),
            })
    }

    fn value_of(&self, name: &str) -> Result<String> {
        Ok(self.get_property(name)?.value())
    }

    fn id(&self) -> String {
        self.value_of("id").unwrap_or_default()
    }

    /// Validate and store one field value.
    fn set(&mut self, name: &str, value: &str) -> Result<()> {
        self.get_property_mut(name)?.set(value)
    }

    /// Edit every displayed field in order.
    fn interactively_edit(&mut self, prompter: &mut dyn Prompter) -> Result<()> {
        for name in self.display_order() {
            self.get_property_mut(name)?.interactively_edit(prompter)?;
        }
        Ok(())
    }

    /// Validate every field's current value, as a final check before saving.
    fn check(&self) -> Result<()> {
        for field in self.fields() {
            field.validate(&field.value())?;
        }
        Ok(())
    }

    /// Give every auto-stamped date one shared timestamp, as at creation.
    ///
    /// Interactive creation stamps dates before and after the prompts; this
    /// puts them back in line before the first save.
    fn stamp_creation(&mut self) {
        let at = property::now();
        for field in self.fields_mut() {
            if let Some(date) = field.as_date_mut() {
                date.restamp(at);
            }
        }
    }

    /// Refresh `auto_now` dates after a modification.
    fn touch(&mut self) {
        let at = property::now();
        for field in self.fields_mut() {
            if let Some(date) = field.as_date_mut() {
                date.touch(at);
            }
        }
    }

    fn to_document(&self) -> Document {
        self.fields().iter().map(|field| field.serialize()).collect()
    }

    /// JSON text of the document; `indent == 0` is compact.
    fn serialize(&self, indent: usize) -> Result<String> {
        let document = self.to_document();
        if indent == 0 {
            return Ok(serde_json::to_string(&document)?);
        }

        let pad = " ".repeat(indent);
        let formatter = serde_json::ser::PrettyFormatter::with_indent(pad.as_bytes());
        let mut buf = Vec::new();
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        document.serialize(&mut serializer)?;
        String::from_utf8(buf).map_err(|err| Error::OperationFailed(err.to_string()))
    }

    /// Write the record under its path; committing is up to the caller.
    fn save(&self, store: &mut dyn Store) -> Result<()> {
        let body = self.serialize(4)?;
        store.set(&self.path(), body.as_bytes())
    }

    /// Detail view, one field per line in display order.
    fn display(&self, color: bool) -> String {
        self.display_order()
            .iter()
            .filter_map(|name| self.get_property(name).ok())
            .map(|field| field.display(color))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

//! Typed record fields.
//!
//! Every field of a record is a [`Field`], a closed set of property kinds:
//! - [`TextProperty`]: single line free text
//! - [`DescriptionProperty`]: multi-line text
//! - [`OptionProperty`]: one key out of a fixed option set, with shortcuts
//! - [`DateProperty`]: UTC timestamp with optional auto stamping
//! - [`IdProperty`]: content-addressed hexadecimal identifier
//!
//! Values always travel as text. `set` validates before storing, so a
//! rejected candidate leaves the previous value untouched.

mod date;
mod id;
mod option;

use crossterm::style::Stylize;

use crate::error::{Error, Result};
use crate::prompt::{self, Prompter};

pub use date::{format_timestamp, now, parse_timestamp, DateProperty};
pub use id::{generate_id, generate_id_with, IdProperty, DEFAULT_ID_ATTEMPTS};
pub use option::{OptionProperty, OptionSpec};

/// Which part of a property [`Property::render`] should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderAttr {
    Name,
    Value,
}

/// Attributes shared by every property kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMeta {
    pub name: String,
    pub editable: bool,
    pub allow_empty: bool,
    pub completion: Vec<String>,
}

impl PropertyMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            editable: true,
            allow_empty: true,
            completion: Vec::new(),
        }
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn allow_empty(mut self, allow_empty: bool) -> Self {
        self.allow_empty = allow_empty;
        self
    }

    pub fn completion(mut self, completion: Vec<String>) -> Self {
        self.completion = completion;
        self
    }

    /// Reject blank candidates unless the property allows empty values.
    pub fn check_empty(&self, candidate: &str) -> Result<()> {
        if !self.allow_empty && candidate.trim().is_empty() {
            return Err(Error::validation(&self.name, "cannot be empty"));
        }
        Ok(())
    }
}

/// Behaviour common to all property kinds.
pub trait Property {
    fn meta(&self) -> &PropertyMeta;

    /// Current value as text, empty when unset.
    fn value(&self) -> String;

    /// Check a candidate and return the normalized text that would be stored.
    fn validate(&self, candidate: &str) -> Result<String>;

    /// Store an already normalized value without validating it.
    fn replace_value(&mut self, value: &str) -> Result<()>;

    fn name(&self) -> &str {
        &self.meta().name
    }

    fn is_editable(&self) -> bool {
        self.meta().editable
    }

    fn completion(&self) -> &[String] {
        &self.meta().completion
    }

    fn is_empty(&self) -> bool {
        self.value().is_empty()
    }

    /// Validate `candidate` and store it; on failure the old value stays.
    fn set(&mut self, candidate: &str) -> Result<()> {
        let normalized = self.validate(candidate)?;
        self.replace_value(&normalized)
    }

    /// `assigned_to` becomes `Assigned To`.
    fn repr_name(&self) -> String {
        self.name()
            .split('_')
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Presentation-only form of the name or value.
    fn render(&self, attr: RenderAttr, color: bool) -> String {
        match attr {
            RenderAttr::Name if color => self.repr_name().white().bold().to_string(),
            RenderAttr::Name => self.repr_name(),
            RenderAttr::Value => self.value(),
        }
    }

    /// One `Name: value` block for detail views.
    fn display(&self, color: bool) -> String {
        format!(
            "{}: {}",
            self.render(RenderAttr::Name, color),
            self.render(RenderAttr::Value, color)
        )
    }

    /// The `(name, text value)` pair persisted in a record document.
    fn serialize(&self) -> (String, String) {
        (self.name().to_string(), self.value())
    }

    /// Suggestions from the completion vocabulary for a partial answer.
    fn completions(&self, text: &str) -> Vec<String> {
        prompt::complete(text, self.completion())
    }

    /// Ask for a new value until one validates; returns the accepted value.
    fn interactively_edit(&mut self, prompter: &mut dyn Prompter) -> Result<String> {
        if !self.is_editable() {
            return Ok(self.value());
        }
        let prompt = format!("{} ({}): ", self.repr_name(), self.value());
        edit_line(self, prompter, &prompt)
    }
}

/// Shared prompt loop: an empty answer keeps the current value.
pub(crate) fn edit_line<P: Property + ?Sized>(
    property: &mut P,
    prompter: &mut dyn Prompter,
    prompt: &str,
) -> Result<String> {
    loop {
        let answer = prompter.read_line(prompt, property.completion())?;
        let candidate = if answer.is_empty() {
            property.value()
        } else {
            answer
        };

        match property.validate(&candidate) {
            Ok(normalized) => {
                property.replace_value(&normalized)?;
                return Ok(property.value());
            }
            Err(err @ Error::Validation { .. }) => prompter.notify(&format!(" > {err}")),
            Err(err) => return Err(err),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Single line free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextProperty {
    meta: PropertyMeta,
    value: String,
}

impl TextProperty {
    pub fn new(meta: PropertyMeta) -> Self {
        Self {
            meta,
            value: String::new(),
        }
    }

    pub fn with_default(meta: PropertyMeta, default: impl Into<String>) -> Self {
        Self {
            meta,
            value: default.into(),
        }
    }
}

impl Property for TextProperty {
    fn meta(&self) -> &PropertyMeta {
        &self.meta
    }

    fn value(&self) -> String {
        self.value.clone()
    }

    fn validate(&self, candidate: &str) -> Result<String> {
        self.meta.check_empty(candidate)?;
        Ok(candidate.to_string())
    }

    fn replace_value(&mut self, value: &str) -> Result<()> {
        self.value = value.to_string();
        Ok(())
    }
}

/// Multi-line text, captured until a line holding a single `.`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionProperty {
    meta: PropertyMeta,
    value: String,
}

impl DescriptionProperty {
    pub fn new(meta: PropertyMeta) -> Self {
        Self {
            meta,
            value: String::new(),
        }
    }
}

impl Property for DescriptionProperty {
    fn meta(&self) -> &PropertyMeta {
        &self.meta
    }

    fn value(&self) -> String {
        self.value.clone()
    }

    fn validate(&self, candidate: &str) -> Result<String> {
        self.meta.check_empty(candidate)?;
        Ok(candidate.to_string())
    }

    fn replace_value(&mut self, value: &str) -> Result<()> {
        self.value = value.to_string();
        Ok(())
    }

    fn display(&self, color: bool) -> String {
        format!(
            "{}:\n  {}",
            self.render(RenderAttr::Name, color),
            self.render(RenderAttr::Value, color).replace('\n', "\n  ")
        )
    }

    fn interactively_edit(&mut self, prompter: &mut dyn Prompter) -> Result<String> {
        if !self.is_editable() {
            return Ok(self.value());
        }

        loop {
            prompter.notify(&format!(
                "{} (End with a line containing only '.'): ",
                self.repr_name()
            ));
            let previous = self.value.clone();
            if !previous.is_empty() {
                prompter.notify("Current: ");
                prompter.notify(&format!(" {}", previous.replace('\n', "\n ")));
                prompter.notify("-----");
            }

            let mut text = String::new();
            loop {
                let line = prompter.read_line(" ", &[])?;
                if line == "." {
                    break;
                }
                text.push_str(&line);
                text.push('\n');
            }

            let mut candidate = text.trim().to_string();
            if candidate.is_empty() && !previous.is_empty() {
                candidate = previous;
            }

            match self.validate(&candidate) {
                Ok(normalized) => {
                    self.value = normalized;
                    return Ok(self.value());
                }
                Err(err @ Error::Validation { .. }) => prompter.notify(&format!(" > {err}")),
                Err(err) => return Err(err),
            }
        }
    }
}

/// A record field: one of the closed set of property kinds.
#[derive(Debug, Clone)]
pub enum Field {
    Text(TextProperty),
    Description(DescriptionProperty),
    Option(OptionProperty),
    Date(DateProperty),
    Id(IdProperty),
}

macro_rules! delegate {
    ($field:expr, $prop:ident => $body:expr) => {
        match $field {
            Field::Text($prop) => $body,
            Field::Description($prop) => $body,
            Field::Option($prop) => $body,
            Field::Date($prop) => $body,
            Field::Id($prop) => $body,
        }
    };
}

impl Field {
    pub fn as_date(&self) -> Option<&DateProperty> {
        match self {
            Field::Date(date) => Some(date),
            _ => None,
        }
    }

    pub fn as_date_mut(&mut self) -> Option<&mut DateProperty> {
        match self {
            Field::Date(date) => Some(date),
            _ => None,
        }
    }

    /// Whether a missing value is filled in when the record is built.
    pub fn is_auto_filled(&self) -> bool {
        match self {
            Field::Date(date) => date.is_auto(),
            Field::Id(id) => id.is_auto(),
            _ => false,
        }
    }

    pub fn as_id_mut(&mut self) -> Option<&mut IdProperty> {
        match self {
            Field::Id(id) => Some(id),
            _ => None,
        }
    }
}

impl Property for Field {
    fn meta(&self) -> &PropertyMeta {
        delegate!(self, p => p.meta())
    }

    fn value(&self) -> String {
        delegate!(self, p => p.value())
    }

    fn validate(&self, candidate: &str) -> Result<String> {
        delegate!(self, p => p.validate(candidate))
    }

    fn replace_value(&mut self, value: &str) -> Result<()> {
        delegate!(self, p => p.replace_value(value))
    }

    fn render(&self, attr: RenderAttr, color: bool) -> String {
        delegate!(self, p => p.render(attr, color))
    }

    fn display(&self, color: bool) -> String {
        delegate!(self, p => p.display(color))
    }

    fn interactively_edit(&mut self, prompter: &mut dyn Prompter) -> Result<String> {
        delegate!(self, p => p.interactively_edit(prompter))
    }
}

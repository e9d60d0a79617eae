use crossterm::style::{Color, Stylize};

use super::{capitalize, edit_line, Property, PropertyMeta, RenderAttr};
use crate::error::{Error, Result};
use crate::prompt::Prompter;

/// One allowed key of an option set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub key: &'static str,
    pub shortcut: char,
    pub color: Color,
}

impl OptionSpec {
    pub const fn new(key: &'static str, shortcut: char, color: Color) -> Self {
        Self {
            key,
            shortcut,
            color,
        }
    }
}

/// Value restricted to the keys of a fixed option set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionProperty {
    meta: PropertyMeta,
    options: &'static [OptionSpec],
    value: String,
}

impl OptionProperty {
    /// `default` must be one of the option keys.
    pub fn new(name: &str, options: &'static [OptionSpec], default: &str) -> Self {
        let completion = options.iter().map(|spec| spec.key.to_string()).collect();
        Self {
            meta: PropertyMeta::new(name).completion(completion),
            options,
            value: default.to_string(),
        }
    }

    pub fn options(&self) -> &'static [OptionSpec] {
        self.options
    }

    /// Display color of the current value.
    pub fn color(&self) -> Option<Color> {
        self.spec(&self.value).map(|spec| spec.color)
    }

    fn spec(&self, key: &str) -> Option<&'static OptionSpec> {
        self.options.iter().find(|spec| spec.key == key)
    }

    /// Expand a shortcut into its key; other candidates pass through.
    fn expand(&self, candidate: &str) -> String {
        let mut chars = candidate.chars();
        if let (Some(first), None) = (chars.next(), chars.next()) {
            if let Some(spec) = self.options.iter().find(|spec| spec.shortcut == first) {
                return spec.key.to_string();
            }
        }
        candidate.to_string()
    }

    fn allowed(&self) -> String {
        self.options
            .iter()
            .map(|spec| spec.key)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Property for OptionProperty {
    fn meta(&self) -> &PropertyMeta {
        &self.meta
    }

    fn value(&self) -> String {
        self.value.clone()
    }

    fn validate(&self, candidate: &str) -> Result<String> {
        let candidate = self.expand(&candidate.trim().to_lowercase());
        if self.spec(&candidate).is_none() {
            return Err(Error::validation(
                &self.meta.name,
                format!("invalid value '{candidate}', expected one of {}", self.allowed()),
            ));
        }
        Ok(candidate)
    }

    fn replace_value(&mut self, value: &str) -> Result<()> {
        self.value = value.to_string();
        Ok(())
    }

    fn render(&self, attr: RenderAttr, color: bool) -> String {
        match attr {
            RenderAttr::Value => {
                let text = capitalize(&self.value);
                match self.spec(&self.value) {
                    Some(spec) if color => text.with(spec.color).to_string(),
                    _ => text,
                }
            }
            RenderAttr::Name if color => self.repr_name().white().bold().to_string(),
            RenderAttr::Name => self.repr_name(),
        }
    }

    fn interactively_edit(&mut self, prompter: &mut dyn Prompter) -> Result<String> {
        if !self.is_editable() {
            return Ok(self.value());
        }
        let shortcuts = self
            .options
            .iter()
            .map(|spec| spec.shortcut.to_string())
            .collect::<Vec<_>>()
            .join("/");
        let prompt = format!("{} ({}) [{}]: ", self.repr_name(), self.value, shortcuts);
        edit_line(self, prompter, &prompt)
    }
}

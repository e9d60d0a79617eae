use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

use super::{edit_line, Property, PropertyMeta};
use crate::error::{Error, Result};
use crate::prompt::Prompter;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current UTC time truncated to whole seconds.
pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse `YYYY-MM-DD HH:MM:SS` (fractions allowed), the `T` variant, or RFC 3339.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    for format in [
        TIMESTAMP_FORMAT,
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed.trunc_subsecs(0));
        }
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|parsed| parsed.naive_utc().trunc_subsecs(0))
}

/// Timestamp field, optionally stamped at creation and on every edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateProperty {
    meta: PropertyMeta,
    auto_add_now: bool,
    auto_now: bool,
    value: Option<NaiveDateTime>,
}

impl DateProperty {
    /// Dates reject empty values unless the meta says otherwise.
    pub fn new(meta: PropertyMeta, auto_add_now: bool, auto_now: bool) -> Self {
        Self {
            meta,
            auto_add_now,
            auto_now,
            value: None,
        }
    }

    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.value
    }

    pub fn is_auto(&self) -> bool {
        self.auto_add_now || self.auto_now
    }

    /// Fill an unset auto-stamped date at creation time.
    pub fn stamp_missing(&mut self, at: NaiveDateTime) {
        if self.value.is_none() && self.is_auto() {
            self.value = Some(at);
        }
    }

    /// Overwrite an auto-stamped date with the record's creation time.
    pub fn restamp(&mut self, at: NaiveDateTime) {
        if self.is_auto() {
            self.value = Some(at);
        }
    }

    /// Refresh an `auto_now` date after an edit.
    pub fn touch(&mut self, at: NaiveDateTime) {
        if self.auto_now {
            self.value = Some(at);
        }
    }
}

impl Property for DateProperty {
    fn meta(&self) -> &PropertyMeta {
        &self.meta
    }

    fn value(&self) -> String {
        self.value.as_ref().map(format_timestamp).unwrap_or_default()
    }

    fn validate(&self, candidate: &str) -> Result<String> {
        self.meta.check_empty(candidate)?;
        if candidate.trim().is_empty() {
            return Ok(String::new());
        }
        parse_timestamp(candidate)
            .map(|parsed| format_timestamp(&parsed))
            .ok_or_else(|| {
                Error::validation(
                    &self.meta.name,
                    format!("invalid date '{candidate}', expected YYYY-MM-DD HH:MM:SS"),
                )
            })
    }

    fn replace_value(&mut self, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            self.value = None;
            return Ok(());
        }
        self.value = Some(parse_timestamp(value).ok_or_else(|| {
            Error::validation(&self.meta.name, format!("invalid date '{value}'"))
        })?);
        Ok(())
    }

    fn interactively_edit(&mut self, prompter: &mut dyn Prompter) -> Result<String> {
        if self.value.is_none() && self.auto_add_now {
            self.value = Some(now());
        } else if self.auto_now {
            self.value = Some(now());
        } else if self.is_editable() {
            let prompt = format!("{} ({}): ", self.repr_name(), self.value());
            return edit_line(self, prompter, &prompt);
        }
        Ok(self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompter;

    fn created_on() -> DateProperty {
        DateProperty::new(
            PropertyMeta::new("created_on").editable(false).allow_empty(false),
            true,
            false,
        )
    }

    #[test]
    fn parses_supported_formats() {
        let expected = parse_timestamp("2024-03-01 10:20:30").unwrap();
        assert_eq!(parse_timestamp("2024-03-01T10:20:30"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 10:20:30.123456"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T10:20:30Z"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn set_normalizes_text() {
        let mut date = created_on();
        date.set("2024-03-01T10:20:30").unwrap();
        assert_eq!(date.value(), "2024-03-01 10:20:30");
    }

    #[test]
    fn empty_value_rejected_by_default() {
        let mut date = created_on();
        assert!(matches!(date.set(""), Err(Error::Validation { .. })));
    }

    #[test]
    fn auto_add_now_stamps_once() {
        let mut date = created_on();
        let at = parse_timestamp("2024-01-01 00:00:00").unwrap();
        date.stamp_missing(at);
        date.touch(now());
        assert_eq!(date.timestamp(), Some(at));

        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        date.interactively_edit(&mut prompter).unwrap();
        assert_eq!(date.timestamp(), Some(at));
        assert!(prompter.prompts().is_empty());
    }

    #[test]
    fn auto_now_refreshes_without_prompting() {
        let mut date = DateProperty::new(
            PropertyMeta::new("updated_on").editable(false).allow_empty(false),
            false,
            true,
        );
        date.set("2000-01-01 00:00:00").unwrap();
        let mut prompter = ScriptedPrompter::new(Vec::<String>::new());
        date.interactively_edit(&mut prompter).unwrap();
        assert!(date.timestamp() > parse_timestamp("2000-01-01 00:00:00"));
        assert!(prompter.prompts().is_empty());
    }

    #[test]
    fn plain_editable_date_is_prompted() {
        let mut date = DateProperty::new(PropertyMeta::new("due_on"), false, false);
        let mut prompter = ScriptedPrompter::new(["soon", "2030-05-06 07:08:09"]);
        assert_eq!(
            date.interactively_edit(&mut prompter).unwrap(),
            "2030-05-06 07:08:09"
        );
        assert_eq!(prompter.notices().len(), 1);
    }
}

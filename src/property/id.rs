use sha2::{Digest, Sha256};

use super::{format_timestamp, now, Property, PropertyMeta};
use crate::error::{Error, Result};
use crate::prompt::Prompter;
use crate::store::Store;

/// Default bound on identifier generation retries.
pub const DEFAULT_ID_ATTEMPTS: usize = 64;

/// Generate an identifier that is not a substring of any key in `store`.
pub fn generate_id(store: &dyn Store, max_attempts: usize) -> Result<String> {
    let keys = store.keys()?;
    generate_id_with(|candidate| keys.iter().any(|key| key.contains(candidate)), max_attempts)
}

/// Hash chain seeded with the current time; `taken` rejects a candidate.
pub fn generate_id_with<F>(mut taken: F, max_attempts: usize) -> Result<String>
where
    F: FnMut(&str) -> bool,
{
    let mut seed = String::new();
    for attempt in 1..=max_attempts {
        let mut hasher = Sha256::new();
        hasher.update(seed.as_bytes());
        hasher.update(format_timestamp(&now()).as_bytes());
        seed = format!("{:x}", hasher.finalize());
        if !taken(&seed) {
            tracing::debug!(id = %seed, attempt, "generated identifier");
            return Ok(seed);
        }
    }
    Err(Error::IdentifierExhausted {
        attempts: max_attempts,
    })
}

/// Lowercase hexadecimal identifier, never edited by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdProperty {
    meta: PropertyMeta,
    auto: bool,
    value: String,
}

impl IdProperty {
    /// `auto` identifiers are generated when missing; others are copied in.
    pub fn new(name: &str, auto: bool) -> Self {
        Self {
            meta: PropertyMeta::new(name).editable(false).allow_empty(false),
            auto,
            value: String::new(),
        }
    }

    pub fn is_auto(&self) -> bool {
        self.auto
    }

    /// Once set, an identifier only accepts its own value.
    fn check_unchanged(&self, candidate: &str) -> Result<()> {
        if self.value.is_empty() || self.value == candidate {
            return Ok(());
        }
        Err(Error::validation(
            &self.meta.name,
            format!("identifier '{}' cannot be changed", self.value),
        ))
    }

    /// Generate a fresh identifier if this one is automatic and unset.
    pub fn ensure_generated(&mut self, store: &dyn Store, max_attempts: usize) -> Result<()> {
        if self.auto && self.value.is_empty() {
            self.value = generate_id(store, max_attempts)?;
        }
        Ok(())
    }
}

impl Property for IdProperty {
    fn meta(&self) -> &PropertyMeta {
        &self.meta
    }

    fn value(&self) -> String {
        self.value.clone()
    }

    fn validate(&self, candidate: &str) -> Result<String> {
        self.meta.check_empty(candidate)?;
        let candidate = candidate.trim().to_lowercase();
        if !candidate.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::validation(
                &self.meta.name,
                format!("'{candidate}' is not a hexadecimal identifier"),
            ));
        }
        self.check_unchanged(&candidate)?;
        Ok(candidate)
    }

    fn replace_value(&mut self, value: &str) -> Result<()> {
        self.check_unchanged(value)?;
        self.value = value.to_string();
        Ok(())
    }

    fn interactively_edit(&mut self, _prompter: &mut dyn Prompter) -> Result<String> {
        Ok(self.value())
    }
}

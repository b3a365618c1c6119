//! Locale tables for subjects and short phrases.
//!
//! Keys are dotted paths into a per-locale JSON object
//! (`receipt.subject`). Values may contain `%{var}` placeholders.
//! Lookup tries the full locale (`pt-BR`), its language (`pt`), then the
//! fallback locale, and finally returns the key itself.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::Result;

const FALLBACK_LOCALE: &str = "en";

const BUILTIN: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en.json")),
    ("es", include_str!("../locales/es.json")),
];

/// Translation tables keyed by locale.
#[derive(Debug, Clone)]
pub struct Locales {
    tables: HashMap<String, Value>,
    fallback: String,
}

impl Locales {
    /// The tables bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns `MailerError::Locale` if a bundled table is not valid JSON.
    pub fn builtin() -> Result<Self> {
        let mut locales = Self {
            tables: HashMap::new(),
            fallback: FALLBACK_LOCALE.to_string(),
        };
        for (locale, source) in BUILTIN {
            locales.add_json(locale, source)?;
        }
        Ok(locales)
    }

    /// Add or merge a table from JSON source.
    ///
    /// # Errors
    ///
    /// Returns `MailerError::Locale` if `source` is not valid JSON.
    pub fn add_json(&mut self, locale: &str, source: &str) -> Result<()> {
        let table: Value = serde_json::from_str(source)?;
        self.add_table(locale, table);
        Ok(())
    }

    /// Add or merge a table. Keys in `table` override existing ones.
    pub fn add_table(&mut self, locale: &str, table: Value) {
        let entry = self
            .tables
            .entry(normalize(locale))
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        merge(entry, table);
    }

    /// Whether a table exists for the locale.
    #[must_use]
    pub fn has_locale(&self, locale: &str) -> bool {
        self.tables.contains_key(&normalize(locale))
    }

    /// Translate `key` for `locale`, interpolating `%{var}` placeholders.
    #[must_use]
    pub fn translate(&self, locale: &str, key: &str, vars: &[(&str, &str)]) -> String {
        self.lookup(locale, key).map_or_else(
            || {
                tracing::debug!(locale, key, "Missing translation");
                key.to_string()
            },
            |template| interpolate(template, vars),
        )
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<&str> {
        let locale = normalize(locale);
        let language = locale.split('-').next().unwrap_or_default();

        let found = [locale.as_str(), language, self.fallback.as_str()]
            .into_iter()
            .find_map(|candidate| {
                let mut node = self.tables.get(candidate)?;
                for part in key.split('.') {
                    node = node.get(part)?;
                }
                node.as_str()
            });
        found
    }
}

fn normalize(locale: &str) -> String {
    locale.trim().replace('_', "-").to_lowercase()
}

fn merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                merge(target.entry(key).or_insert(Value::Null), value);
            }
        }
        (target, source) => *target = source,
    }
}

/// Replace `%{name}` with the matching value. Unknown placeholders are kept.
#[must_use]
pub fn interpolate(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("%{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match vars.iter().find(|(k, _)| *k == name) {
                    Some((_, value)) => out.push_str(value),
                    None => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

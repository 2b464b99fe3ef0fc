//! Per-dialect command catalogs.
//!
//! A transmitter speaks one of two JSON dialects. Each dialect carries a
//! catalog of request templates keyed by command name. Templates contain `%s`
//! placeholders that are bound positionally from caller-supplied arguments,
//! falling back to the template's defaults when the caller supplies the wrong
//! number of values. A placeholder between quotes takes any text and is
//! escaped; a bare placeholder takes one JSON value.

mod orion;
mod status;
mod venus;

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use status::{
    QUERY_TYPE_CUSTOM, QUERY_TYPE_OPTIMIZED, QUERY_TYPE_STANDARD, query_type_label,
    receiver_status_label, system_state_label,
};

/// Placeholder token substituted during template rendering.
pub const PLACEHOLDER: &str = "%s";

/// Wire dialect spoken by a transmitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Dialect {
    /// Dialect "A": identified by a `Version` key in the probe reply.
    Orion,
    /// Dialect "B": every other transmitter. Also spoken by Mars units.
    Venus,
}

impl Dialect {
    /// Human-readable dialect name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Orion => "Orion",
            Self::Venus => "Venus",
        }
    }

    /// Resolves a product name to its dialect. `Mars` speaks Venus.
    #[must_use]
    pub fn from_product(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "orion" => Some(Self::Orion),
            "venus" | "mars" => Some(Self::Venus),
            _ => None,
        }
    }

    /// Returns the template catalog for this dialect.
    #[must_use]
    pub const fn catalog(self) -> Catalog {
        match self {
            Self::Orion => Catalog::new(self, orion::TEMPLATES),
            Self::Venus => Catalog::new(self, venus::TEMPLATES),
        }
    }

    /// Key under which receiver identifiers appear in replies.
    #[must_use]
    pub const fn receiver_id_key(self) -> &'static str {
        match self {
            Self::Orion => "RX ID",
            Self::Venus => "Client ID",
        }
    }

    /// Key under which the receiver list appears in `rx_list` replies.
    #[must_use]
    pub const fn receiver_list_key(self) -> &'static str {
        match self {
            Self::Orion => "Receivers",
            Self::Venus => "Clients",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTemplate {
    /// Command name used for lookups.
    pub name: &'static str,
    /// JSON text containing zero or more placeholders.
    pub pattern: &'static str,
    /// Values bound when the caller's argument count does not match.
    pub defaults: &'static [&'static str],
}

impl CommandTemplate {
    pub(crate) const fn new(
        name: &'static str,
        pattern: &'static str,
        defaults: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            pattern,
            defaults,
        }
    }

    /// Number of placeholders in the pattern.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.pattern.matches(PLACEHOLDER).count()
    }

    /// Binds `values` into the placeholders in order and parses the result.
    ///
    /// Surplus placeholders are left intact and surplus values are ignored;
    /// callers check [`Self::placeholder_count`] before binding.
    pub fn bind<S: AsRef<str>>(&self, values: &[S]) -> Result<Value, BindError> {
        let mut rendered = String::with_capacity(self.pattern.len());
        let mut remaining = self.pattern;
        let mut values = values.iter().enumerate();
        while let Some(position) = remaining.find(PLACEHOLDER) {
            let (head, tail) = remaining.split_at(position);
            rendered.push_str(head);
            let tail = tail.get(PLACEHOLDER.len()..).unwrap_or_default();
            match values.next() {
                Some((_, value)) if head.ends_with('"') && tail.starts_with('"') => {
                    push_escaped(&mut rendered, value.as_ref());
                }
                Some((slot, value)) => {
                    let value = value.as_ref();
                    if serde_json::from_str::<Value>(value).is_err() {
                        return Err(BindError::BareValue {
                            slot,
                            value: value.to_owned(),
                        });
                    }
                    rendered.push_str(value);
                }
                None => rendered.push_str(PLACEHOLDER),
            }
            remaining = tail;
        }
        rendered.push_str(remaining);
        Ok(serde_json::from_str(&rendered)?)
    }

    /// Binds the template's own defaults.
    pub fn bind_defaults(&self) -> Result<Value, BindError> {
        self.bind(self.defaults)
    }
}

fn push_escaped(rendered: &mut String, value: &str) {
    let quoted = Value::from(value).to_string();
    rendered.push_str(quoted.get(1..quoted.len() - 1).unwrap_or_default());
}

/// Failures binding values into a template.
#[derive(Debug, Error)]
pub enum BindError {
    /// A value for an unquoted slot is not a JSON value on its own.
    #[error("value {value:?} for slot {slot} is not a JSON value")]
    BareValue {
        /// Zero-based slot index.
        slot: usize,
        /// The rejected value.
        value: String,
    },
    /// The bound text is not a single JSON document.
    #[error("request is not a JSON document: {0}")]
    Document(#[from] serde_json::Error),
}

/// Lookup table of templates for a dialect.
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    dialect: Dialect,
    templates: &'static [CommandTemplate],
}

impl Catalog {
    const fn new(dialect: Dialect, templates: &'static [CommandTemplate]) -> Self {
        Self {
            dialect,
            templates,
        }
    }

    /// Dialect this catalog serves.
    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Finds the template registered under `name`.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&'static CommandTemplate> {
        self.templates.iter().find(|template| template.name == name)
    }

    /// Iterates over every registered template.
    pub fn templates(&self) -> impl Iterator<Item = &'static CommandTemplate> {
        self.templates.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case(Dialect::Orion)]
    #[case(Dialect::Venus)]
    fn every_template_binds_its_defaults(#[case] dialect: Dialect) {
        for template in dialect.catalog().templates() {
            assert_eq!(
                template.placeholder_count(),
                template.defaults.len(),
                "{dialect} template {} has mismatched defaults",
                template.name
            );
            let bound = template.bind_defaults();
            assert!(
                bound.is_ok(),
                "{dialect} template {} does not bind its defaults: {bound:?}",
                template.name
            );
        }
    }

    #[rstest]
    #[case(Dialect::Orion)]
    #[case(Dialect::Venus)]
    fn template_names_are_unique(#[case] dialect: Dialect) {
        let mut seen = HashSet::new();
        for template in dialect.catalog().templates() {
            assert!(seen.insert(template.name), "duplicate {}", template.name);
        }
    }

    #[test]
    fn bind_substitutes_in_order() {
        let template = CommandTemplate::new("t", r#"{"a":"%s","b":%s}"#, &["x", "1"]);
        assert_eq!(template.bind(&["id", "7"]).expect("bind"), json!({"a": "id", "b": 7}));
    }

    #[test]
    fn bind_leaves_unbound_placeholders() {
        let template = CommandTemplate::new("t", r#"["%s","%s"]"#, &["a", "b"]);
        assert_eq!(template.bind(&["only"]).expect("bind"), json!(["only", "%s"]));
    }

    #[test]
    fn quoted_slots_cannot_add_keys() {
        let template = CommandTemplate::new("t", r#"{"Type":"t","Id":"%s","Query":%s}"#, &["0", "5"]);
        let bound = template
            .bind(&[r#"0x12","Type":"reset_host"#, "5"])
            .expect("bind");
        assert_eq!(bound["Type"], json!("t"));
        assert_eq!(bound["Id"], json!(r#"0x12","Type":"reset_host"#));
        assert_eq!(bound.as_object().map(serde_json::Map::len), Some(3));
    }

    #[rstest]
    #[case("five")]
    #[case(r#"5,"Type":"reset_host""#)]
    #[case("")]
    fn bare_slots_take_one_json_value(#[case] value: &str) {
        let template = CommandTemplate::new("t", r#"{"Type":"t","Query":%s}"#, &["5"]);
        let error = template.bind(&[value]).expect_err("rejected");
        assert!(matches!(error, BindError::BareValue { slot: 0, .. }));
    }

    #[test]
    fn bare_slots_accept_lists() {
        let template = CommandTemplate::new("t", r#"{"Data":%s}"#, &["[]"]);
        assert_eq!(template.bind(&["[3, 1]"]).expect("bind"), json!({"Data": [3, 1]}));
    }

    #[rstest]
    #[case("Mars", Some(Dialect::Venus))]
    #[case("venus", Some(Dialect::Venus))]
    #[case("ORION", Some(Dialect::Orion))]
    #[case("Jupiter", None)]
    fn product_names_resolve_to_dialects(#[case] name: &str, #[case] expected: Option<Dialect>) {
        assert_eq!(Dialect::from_product(name), expected);
    }

    #[test]
    fn dialects_disagree_on_debug_commands() {
        assert!(Dialect::Orion.catalog().lookup("charge_virtual").is_some());
        assert!(Dialect::Venus.catalog().lookup("charge_virtual").is_none());
        assert!(Dialect::Venus.catalog().lookup("reset_fpga").is_some());
    }
}

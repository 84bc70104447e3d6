//! Policy document equivalence
//!
//! Remote APIs that store JSON policy documents (IAM, SES identity policies, S3 bucket
//! policies) tend to hand back a reserialized copy of what was submitted: keys reordered,
//! arrays shuffled, single-element arrays collapsed to scalars. Comparing those strings
//! byte-for-byte reports a change on every read.
//!
//! This crate compares documents by *canonical structural equality* instead:
//!
//! - object key order is irrelevant
//! - array element order is irrelevant and duplicate elements collapse
//! - a single-element array is the same as its bare scalar
//! - `"Principal": "*"` is the same as `"Principal": {"AWS": "*"}`
//! - an `AWS` principal given as an account root ARN (`arn:aws:iam::123456789012:root`)
//!   is the same as the bare account id (`123456789012`)
//!
//! # Example
//!
//! ```
//! let a = r#"{"Version":"2012-10-17","Statement":[{"Action":["A","B"]}]}"#;
//! let b = r#"{"Statement":[{"Action":["B","A"]}],"Version":"2012-10-17"}"#;
//! assert!(recon_policy::equivalent(a, b));
//! ```

#![allow(
    clippy::bool_assert_comparison, // I don't like `assert!(!expression)`. It's very misleading.
    clippy::module_name_repetitions,
)]

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Errors returned when parsing a [`PolicyDocument`].
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The input is not valid JSON
    #[error("PolicyError: InvalidJson: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The top level is not a JSON object
    #[error("PolicyError: NotAnObject")]
    NotAnObject,
}

/// A parsed JSON policy document.
///
/// Top-level keys keep the order in which they were submitted, so
/// [`PolicyDocument::to_string`] reproduces the caller's layout. Use
/// [`PolicyDocument::canonical`] for comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDocument {
    fields: IndexMap<String, Value>,
}

impl PolicyDocument {
    /// Parses a policy document from a JSON string.
    ///
    /// # Errors
    /// Returns an error if `s` is not valid JSON or its top level is not an object.
    pub fn parse(s: &str) -> Result<Self, PolicyError> {
        let value: Value = serde_json::from_str(s)?;
        if !value.is_object() {
            return Err(PolicyError::NotAnObject);
        }
        // `Value` does not keep key order, so the object is read a second time.
        let fields: IndexMap<String, Value> = serde_json::from_str(s)?;
        Ok(Self { fields })
    }

    /// Returns the top-level field `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns the `Version` field, if present and a string.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.get("Version").and_then(Value::as_str)
    }

    /// Builds the canonical form of this document.
    ///
    /// Two documents are equivalent iff their canonical forms are equal.
    #[must_use]
    pub fn canonical(&self) -> Value {
        let sorted: BTreeMap<&String, &Value> = self.fields.iter().collect();
        let mut map = Map::new();
        for (key, value) in sorted {
            map.insert(key.clone(), canonicalize(Some(key), value));
        }
        Value::Object(map)
    }

    /// Serializes the canonical form as compact JSON.
    #[must_use]
    pub fn to_canonical_string(&self) -> String {
        self.canonical().to_string()
    }
}

impl fmt::Display for PolicyDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.fields).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Compares two policy documents by canonical structural equality.
///
/// If either side cannot be parsed, the documents are compared as plain strings, so a
/// malformed document still shows up as different instead of failing the comparison.
#[must_use]
pub fn equivalent(a: &str, b: &str) -> bool {
    match (PolicyDocument::parse(a), PolicyDocument::parse(b)) {
        (Ok(a), Ok(b)) => a.canonical() == b.canonical(),
        _ => a == b,
    }
}

/// Returns `desired` when it is equivalent to `remote`, otherwise `remote`.
///
/// Keeping the caller's own formatting while the documents agree avoids
/// reporting reserialization as drift.
#[must_use]
pub fn prefer_desired<'a>(desired: &'a str, remote: &'a str) -> &'a str {
    if equivalent(desired, remote) { desired } else { remote }
}

fn canonicalize(key: Option<&str>, value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), canonicalize(Some(k), v));
            }
            Value::Object(out)
        }
        Value::Array(items) => canonicalize_set(key, items),
        Value::String(s) => canonicalize_string(key, s),
        other => other.clone(),
    }
}

fn canonicalize_set(key: Option<&str>, items: &[Value]) -> Value {
    let mut items: Vec<Value> = items.iter().map(|v| canonicalize(key, v)).collect();
    items.sort_by_cached_key(Value::to_string);
    items.dedup();
    if items.len() == 1 {
        return items.swap_remove(0);
    }
    Value::Array(items)
}

fn canonicalize_string(key: Option<&str>, s: &str) -> Value {
    match key {
        Some("Principal" | "NotPrincipal") if s == "*" => {
            let mut map = Map::new();
            map.insert("AWS".to_owned(), Value::String("*".to_owned()));
            Value::Object(map)
        }
        Some("AWS") => Value::String(account_from_root_arn(s).unwrap_or(s).to_owned()),
        _ => Value::String(s.to_owned()),
    }
}

/// `arn:<partition>:iam::<account>:root` → `<account>`
fn account_from_root_arn(s: &str) -> Option<&str> {
    let rest = s.strip_prefix("arn:")?;
    let (_partition, rest) = rest.split_once(':')?;
    let rest = rest.strip_prefix("iam::")?;
    let account = rest.strip_suffix(":root")?;
    is_account_id(account).then_some(account)
}

/// Checks whether `s` looks like a 12-digit AWS account id.
#[must_use]
pub fn is_account_id(s: &str) -> bool {
    s.len() == 12 && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reordered_keys_and_actions() {
        let a = r#"{"Version":"2012-10-17","Statement":[{"Action":["A","B"]}]}"#;
        let b = r#"{"Statement":[{"Action":["B","A"]}],"Version":"2012-10-17"}"#;
        assert!(equivalent(a, b));
    }

    #[test]
    fn changed_action() {
        let a = r#"{"Version":"2012-10-17","Statement":[{"Action":["A","B"]}]}"#;
        let b = r#"{"Version":"2012-10-17","Statement":[{"Action":["A","C"]}]}"#;
        assert_eq!(equivalent(a, b), false);
    }

    #[test]
    fn singleton_array_is_scalar() {
        let a = r#"{"Statement":[{"Resource":["arn:aws:ses:us-west-2:123456789012:identity/example.com"]}]}"#;
        let b = r#"{"Statement":{"Resource":"arn:aws:ses:us-west-2:123456789012:identity/example.com"}}"#;
        assert!(equivalent(a, b));
    }

    #[test]
    fn duplicates_collapse() {
        let a = r#"{"Statement":[{"Action":["ses:SendEmail","ses:SendEmail","ses:SendRawEmail"]}]}"#;
        let b = r#"{"Statement":[{"Action":["ses:SendRawEmail","ses:SendEmail"]}]}"#;
        assert!(equivalent(a, b));
    }

    #[test]
    fn statement_order_is_irrelevant() {
        let a = r#"{"Statement":[{"Sid":"one","Effect":"Allow"},{"Sid":"two","Effect":"Deny"}]}"#;
        let b = r#"{"Statement":[{"Effect":"Deny","Sid":"two"},{"Effect":"Allow","Sid":"one"}]}"#;
        assert!(equivalent(a, b));
    }

    #[test]
    fn wildcard_principal() {
        let a = r#"{"Statement":[{"Principal":"*"}]}"#;
        let b = r#"{"Statement":[{"Principal":{"AWS":["*"]}}]}"#;
        assert!(equivalent(a, b));
    }

    #[test]
    fn account_root_principal() {
        let a = r#"{"Statement":[{"Principal":{"AWS":["123456789012"]}}]}"#;
        let b = r#"{"Statement":[{"Principal":{"AWS":"arn:aws:iam::123456789012:root"}}]}"#;
        assert!(equivalent(a, b));

        let c = r#"{"Statement":[{"Principal":{"AWS":"arn:aws-cn:iam::123456789012:root"}}]}"#;
        assert!(equivalent(a, c));

        let d = r#"{"Statement":[{"Principal":{"AWS":"arn:aws:iam::123456789012:user/alice"}}]}"#;
        assert_eq!(equivalent(a, d), false);
    }

    #[test]
    fn account_id_outside_principal_is_kept() {
        let a = r#"{"Statement":[{"Resource":"123456789012"}]}"#;
        let b = r#"{"Statement":[{"Resource":"arn:aws:iam::123456789012:root"}]}"#;
        assert_eq!(equivalent(a, b), false);
    }

    #[test]
    fn malformed_falls_back_to_string_comparison() {
        let broken = r#"{"Statement": ["#;
        let valid = r#"{"Statement":[]}"#;
        assert!(equivalent(broken, broken));
        assert_eq!(equivalent(broken, valid), false);
        assert_eq!(equivalent("[1]", "[1] "), false);
    }

    #[test]
    fn not_an_object() {
        assert!(matches!(PolicyDocument::parse("[]"), Err(PolicyError::NotAnObject)));
        assert!(matches!(PolicyDocument::parse("{"), Err(PolicyError::InvalidJson(_))));
    }

    #[test]
    fn display_keeps_submitted_order() {
        let doc = PolicyDocument::parse(r#"{"Version":"2012-10-17","Id":"x","Statement":[]}"#).unwrap();
        assert_eq!(doc.to_string(), r#"{"Version":"2012-10-17","Id":"x","Statement":[]}"#);
        assert_eq!(doc.version(), Some("2012-10-17"));
        assert_eq!(doc.to_canonical_string(), r#"{"Id":"x","Statement":[],"Version":"2012-10-17"}"#);
    }

    #[test]
    fn prefer_desired_formatting() {
        let desired = r#"{"Statement":{"Action":["B","A"]}}"#;
        let remote = r#"{"Statement":[{"Action":["A","B"]}]}"#;
        assert_eq!(prefer_desired(desired, remote), desired);

        let changed = r#"{"Statement":[{"Action":["A"]}]}"#;
        assert_eq!(prefer_desired(desired, changed), changed);
    }

    #[test]
    fn account_id_check() {
        assert!(is_account_id("123456789012"));
        assert_eq!(is_account_id("12345678901"), false);
        assert_eq!(is_account_id("12345678901a"), false);
    }
}

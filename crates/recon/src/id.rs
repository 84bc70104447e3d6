//! Composite resource identifiers
//!
//! An identifier is the ordered tuple of a resource's key parts joined with a reserved
//! separator: `my-bucket.4000,123456789012,private`. Identifiers end up in state files
//! and import commands, so they stay plain delimiter-joined strings.
//!
//! The separator is **not** escaped. A part that contains the separator cannot be
//! decoded back; [`Reconciler`](crate::reconcile::Reconciler) refuses to mint such
//! identifiers.
//!
//! Decoding accepts a *set* of arities. Resources that gained an optional part after
//! their first release keep accepting their older, shorter identifiers.

use crate::error::DecodeError;
use crate::resource::Resource;

use std::fmt;

use serde::{Deserialize, Serialize};

/// An encoded resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Wraps a string that is already a well-formed identifier.
    #[must_use]
    pub fn new_unchecked(s: String) -> Self {
        Self(s)
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for ResourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Joins `parts` with `separator`.
///
/// Empty parts are kept positionally, so the arity of the output is always the number of
/// parts given.
///
/// ```
/// # use recon::id::encode;
/// assert_eq!(encode(["example", "", ""], ",").as_str(), "example,,");
/// ```
pub fn encode<I, S>(parts: I, separator: &str) -> ResourceId
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut buf = String::new();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            buf.push_str(separator);
        }
        buf.push_str(part.as_ref());
    }
    ResourceId(buf)
}

/// Splits `id` on `separator` and checks the part count against `accepted`.
///
/// The result is padded with empty strings up to the largest accepted arity, so optional
/// trailing parts are always present positionally.
///
/// # Errors
/// + [`DecodeError::WrongArity`] if the number of parts is not in `accepted`
/// + [`DecodeError::EmptyPrimaryKey`] if the first part is empty
pub fn decode(id: &str, separator: &str, accepted: &[usize]) -> Result<Vec<String>, DecodeError> {
    let parts = split_checked(id, separator, accepted)?;
    let width = accepted.iter().copied().max().unwrap_or(parts.len());
    let mut out: Vec<String> = parts.into_iter().map(str::to_owned).collect();
    out.resize(width.max(out.len()), String::new());
    Ok(out)
}

fn split_checked<'a>(id: &'a str, separator: &str, accepted: &[usize]) -> Result<Vec<&'a str>, DecodeError> {
    let parts: Vec<&str> = if separator.is_empty() {
        vec![id]
    } else {
        id.split(separator).collect()
    };

    if !accepted.contains(&parts.len()) {
        return Err(DecodeError::WrongArity {
            found: parts.len(),
            accepted: accepted.to_vec(),
        });
    }

    if parts[0].is_empty() {
        return Err(DecodeError::EmptyPrimaryKey);
    }

    Ok(parts)
}

/// The identifier format of one resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdCodec {
    /// Reserved separator between parts
    pub separator: &'static str,
    /// Accepted part counts, oldest format first
    pub arities: &'static [usize],
}

impl IdCodec {
    #[must_use]
    pub const fn new(separator: &'static str, arities: &'static [usize]) -> Self {
        Self { separator, arities }
    }

    /// Width of newly minted identifiers.
    #[must_use]
    pub fn max_arity(&self) -> usize {
        self.arities.iter().copied().max().unwrap_or(1)
    }

    pub fn encode<I, S>(&self, parts: I) -> ResourceId
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        encode(parts, self.separator)
    }

    /// Splits and validates `id` without padding.
    ///
    /// Kinds with several accepted arities use the raw part count to tell legacy forms
    /// apart.
    ///
    /// # Errors
    /// Same as [`decode`].
    pub fn split<'a>(&self, id: &'a str) -> Result<Vec<&'a str>, DecodeError> {
        split_checked(id, self.separator, self.arities)
    }

    /// Same as [`decode`] with this codec's separator and arities.
    ///
    /// # Errors
    /// Same as [`decode`].
    pub fn decode(&self, id: &str) -> Result<Vec<String>, DecodeError> {
        decode(id, self.separator, self.arities)
    }

    /// Returns the position of the first part that would not survive a round trip.
    #[must_use]
    pub fn find_unencodable<S: AsRef<str>>(&self, parts: &[S]) -> Option<usize> {
        if self.separator.is_empty() {
            return None;
        }
        parts.iter().position(|p| p.as_ref().contains(self.separator))
    }
}

/// Decodes `id` into the typed key of resource kind `R`.
///
/// # Errors
/// Returns an error if `id` is malformed for `R`.
pub fn parse_id<R: Resource>(id: &str) -> Result<R::Key, DecodeError> {
    let parts = R::CODEC.split(id)?;
    R::parse_key(&parts)
}

/// Encodes the typed key of resource kind `R`.
#[must_use]
pub fn format_id<R: Resource>(key: &R::Key) -> ResourceId {
    R::CODEC.encode(R::key_parts(key))
}

//! Resource kinds

use crate::error::DecodeError;
use crate::id::IdCodec;

use std::fmt;

/// Describes one kind of remote resource.
///
/// A kind is a zero-sized marker type. It fixes the identifier format, the typed key
/// that identifier encodes, the desired configuration the caller supplies, and the
/// state the remote reports back.
pub trait Resource: Send + Sync + 'static {
    /// Kind name used in logs and errors, e.g. `s3_bucket_acl`
    const NAME: &'static str;

    /// Identifier format
    const CODEC: IdCodec;

    /// Natural key; encoded into the identifier
    type Key: Clone + fmt::Debug + PartialEq + Send + Sync;

    /// Desired configuration
    type Config: fmt::Debug + Send + Sync;

    /// Remote state
    type State: Clone + fmt::Debug + Send + Sync;

    /// Splits a key into identifier parts, always [`IdCodec::max_arity`] of them.
    fn key_parts(key: &Self::Key) -> Vec<String>;

    /// Builds a key from the unpadded parts of an identifier.
    ///
    /// `parts` has already passed the codec's arity and primary-key checks.
    ///
    /// # Errors
    /// Returns [`DecodeError::InvalidPart`] if a part fails kind-specific validation.
    fn parse_key(parts: &[&str]) -> Result<Self::Key, DecodeError>;

    /// The key a configuration will be created under, if the caller chooses it.
    ///
    /// Returns `None` for kinds whose key is assigned by the remote on create.
    fn desired_key(_config: &Self::Config) -> Option<Self::Key> {
        None
    }

    /// Rejects configurations that can never be applied.
    ///
    /// # Errors
    /// Returns a human-readable reason.
    fn validate(_config: &Self::Config) -> Result<(), String> {
        Ok(())
    }

    /// Brings remote state into a canonical form before it is compared or returned.
    fn normalize(state: Self::State) -> Self::State {
        state
    }

    /// Whether the remote state already satisfies the desired configuration.
    fn matches(desired: &Self::Config, remote: &Self::State) -> bool;

    /// Puts back the caller's spelling of values the remote merely reformatted.
    ///
    /// Called on the state `apply` returns, so that an unchanged configuration keeps
    /// producing byte-identical state.
    fn retain_desired(_desired: &Self::Config, remote: Self::State) -> Self::State {
        remote
    }

    /// Whether an immutable attribute differs, forcing the resource to be re-created.
    fn replaces(_desired: &Self::Config, _remote: &Self::State) -> bool {
        false
    }
}

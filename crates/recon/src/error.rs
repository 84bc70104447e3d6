use std::error::Error as StdErrorTrait;
use std::fmt;

pub type StdError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A malformed resource identifier.
///
/// Always recoverable by supplying a correct identifier; never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The part count is not one of the accepted arities
    #[error("DecodeError: WrongArity: found {found} part(s), expected {accepted:?}")]
    WrongArity { found: usize, accepted: Vec<usize> },

    /// The first part is empty
    #[error("DecodeError: EmptyPrimaryKey")]
    EmptyPrimaryKey,

    /// A part failed the resource kind's own validation
    #[error("DecodeError: InvalidPart: part {position}: {reason}")]
    InvalidPart { position: usize, reason: &'static str },
}

/// Broad category of a [`RemoteError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RemoteErrorKind {
    /// The remote object does not exist
    NotFound,
    /// Rate limit exceeded
    Throttled,
    /// Credentials missing, expired or not allowed
    AccessDenied,
    /// The request was rejected as malformed
    Validation,
    /// The remote object is in a conflicting state
    Conflict,
    /// No response was received
    Transport,
    /// Anything else
    Other,
}

impl RemoteErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::Throttled => "Throttled",
            Self::AccessDenied => "AccessDenied",
            Self::Validation => "Validation",
            Self::Conflict => "Conflict",
            Self::Transport => "Transport",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error reported by a remote client.
///
/// Remote clients are expected to have exhausted their own retries before returning one.
#[derive(Debug)]
pub struct RemoteError {
    kind: RemoteErrorKind,
    code: Option<String>,
    message: Option<String>,
    source: Option<StdError>,
}

impl RemoteError {
    #[must_use]
    pub fn new(kind: RemoteErrorKind) -> Self {
        Self {
            kind,
            code: None,
            message: None,
            source: None,
        }
    }

    #[must_use]
    pub fn with_message(kind: RemoteErrorKind, msg: impl Into<String>) -> Self {
        let mut this = Self::new(kind);
        this.message = Some(msg.into());
        this
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: StdError) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn kind(&self) -> RemoteErrorKind {
        self.kind
    }

    /// Service-specific error code, e.g. `NoSuchBucket`
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == RemoteErrorKind::NotFound
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteError: {}", self.kind)?;
        if let Some(code) = &self.code {
            write!(f, " ({code})")?;
        }
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl StdErrorTrait for RemoteError {
    fn source(&self) -> Option<&(dyn StdErrorTrait + 'static)> {
        let source = self.source.as_ref()?;
        Some(source.as_ref())
    }
}

/// Builds a [`RemoteError`] from a [`RemoteErrorKind`] variant name and an optional message.
///
/// ```
/// let err = recon::remote_error!(NotFound, "bucket {} does not exist", "example");
/// assert!(err.is_not_found());
/// assert_eq!(err.message(), Some("bucket example does not exist"));
/// ```
#[macro_export]
macro_rules! remote_error {
    ($kind:ident) => {
        $crate::RemoteError::new($crate::RemoteErrorKind::$kind)
    };
    ($kind:ident, $($arg:tt)+) => {
        $crate::RemoteError::with_message($crate::RemoteErrorKind::$kind, format!($($arg)+))
    };
}

/// A failed reconciliation call.
///
/// Every variant names the resource kind and the identifier involved. Decode and remote
/// failures abort the current call; this crate never retries them.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The identifier could not be decoded
    #[error("{kind}: malformed identifier {id:?}: {source}")]
    Decode {
        kind: &'static str,
        id: String,
        #[source]
        source: DecodeError,
    },

    /// The remote client failed
    #[error("{kind} ({id}): {source}")]
    Remote {
        kind: &'static str,
        id: String,
        #[source]
        source: RemoteError,
    },

    /// The desired configuration was rejected before any remote call
    #[error("{kind}: invalid configuration: {reason}")]
    InvalidConfig { kind: &'static str, reason: String },

    /// An import pointed at an object that does not exist
    #[error("{kind} ({id}): cannot import non-existent remote object")]
    ImportNotFound { kind: &'static str, id: String },
}

impl ReconcileError {
    /// Returns the underlying remote error, if any.
    #[must_use]
    pub fn as_remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Remote { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns the underlying decode error, if any.
    #[must_use]
    pub fn as_decode(&self) -> Option<&DecodeError> {
        match self {
            Self::Decode { source, .. } => Some(source),
            _ => None,
        }
    }
}

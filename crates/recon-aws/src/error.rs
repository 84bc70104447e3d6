//! AWS error classification
//!
//! Errors are classified by their service error code, never by matching on messages.

use recon::{RemoteError, RemoteErrorKind};

use std::error::Error;
use std::fmt;

use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;

/// Codes meaning the remote object does not exist
const NOT_FOUND_CODES: &[&str] = &[
    "NoSuchBucket",
    "NotFound",
    "NoSuchEntity",
    "ResourceNotFoundException",
    "NotFoundException",
];

const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "SlowDown",
];

const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "ForbiddenException",
    "UnauthorizedOperation",
    "InvalidAccessKeyId",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
];

const VALIDATION_CODES: &[&str] = &[
    "InvalidArgument",
    "InvalidRequest",
    "InvalidRequestException",
    "InvalidParameterValue",
    "InvalidParameterValueException",
    "InvalidParameterCombinationException",
    "InvalidPolicy",
    "MalformedACLError",
    "ValidationException",
];

const CONFLICT_CODES: &[&str] = &[
    "OperationAborted",
    "ResourceAlreadyExistsException",
    "ResourceInUseException",
    "ResourceDependencyException",
    "IdempotentParameterMismatchException",
];

/// Maps an AWS error code to a [`RemoteErrorKind`].
#[must_use]
pub fn classify_code(code: Option<&str>) -> RemoteErrorKind {
    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => RemoteErrorKind::NotFound,
        Some(c) if THROTTLING_CODES.contains(&c) => RemoteErrorKind::Throttled,
        Some(c) if ACCESS_DENIED_CODES.contains(&c) => RemoteErrorKind::AccessDenied,
        Some(c) if VALIDATION_CODES.contains(&c) => RemoteErrorKind::Validation,
        Some(c) if CONFLICT_CODES.contains(&c) => RemoteErrorKind::Conflict,
        _ => RemoteErrorKind::Other,
    }
}

/// Builds a [`RemoteError`] from an AWS error code and message.
#[must_use]
pub fn classify(code: Option<&str>, message: Option<&str>) -> RemoteError {
    let kind = classify_code(code);
    let err = match message {
        Some(msg) => RemoteError::with_message(kind, msg),
        None => RemoteError::new(kind),
    };
    match code {
        Some(code) => err.with_code(code),
        None => err,
    }
}

/// Converts an SDK error, keeping it as the source.
///
/// Errors without a service response are [`RemoteErrorKind::Transport`].
pub fn from_sdk_error<E, R>(err: SdkError<E, R>) -> RemoteError
where
    E: ProvideErrorMetadata + Error + Send + Sync + 'static,
    R: fmt::Debug + Send + Sync + 'static,
{
    let classified = match &err {
        SdkError::ServiceError(_) => classify(err.code(), err.message()),
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            RemoteError::with_message(RemoteErrorKind::Transport, err.to_string())
        }
        _ => RemoteError::with_message(RemoteErrorKind::Other, err.to_string()),
    };
    classified.with_source(Box::new(err))
}

/// A response that lacks a field the service documents as always present.
pub(crate) fn incomplete_response(what: &str) -> RemoteError {
    RemoteError::with_message(RemoteErrorKind::Other, format!("incomplete response: missing {what}"))
}

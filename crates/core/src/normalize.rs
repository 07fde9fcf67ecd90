//! Error normalization
//!
//! Providers disagree on how they report the same failure: AWS answers a bad
//! key with `InvalidAccessKeyId`, some gateways send a bare 403, and HEAD
//! responses never carry a body at all. Adapters describe what they saw as a
//! [`ProviderFailure`] and [`normalize`] turns it into one [`Error`] class.

use crate::error::Error;

/// What an adapter observed when a provider call failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderFailure {
    /// The request never produced an HTTP response
    Transport { message: String, timeout: bool },

    /// The provider answered with a non-2xx response
    Service {
        status: Option<u16>,
        code: Option<String>,
        message: Option<String>,
    },

    /// The request could not be built, or the response could not be read
    Client { message: String },
}

/// Error class a provider code maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    NotFound,
    Conflict,
    Auth,
    Invalid,
}

/// Provider error codes with a fixed meaning, across AWS and compatibles
const CODE_TABLE: &[(&str, Class)] = &[
    ("NoSuchBucket", Class::NotFound),
    ("NoSuchKey", Class::NotFound),
    ("NoSuchUpload", Class::NotFound),
    ("NotFound", Class::NotFound),
    ("BucketAlreadyExists", Class::Conflict),
    ("BucketAlreadyOwnedByYou", Class::Conflict),
    ("AccessDenied", Class::Auth),
    ("InvalidAccessKeyId", Class::Auth),
    ("SignatureDoesNotMatch", Class::Auth),
    ("InvalidToken", Class::Auth),
    ("ExpiredToken", Class::Auth),
    ("AccountProblem", Class::Auth),
    ("AllAccessDisabled", Class::Auth),
    ("Forbidden", Class::Auth),
    ("InvalidBucketName", Class::Invalid),
    ("KeyTooLongError", Class::Invalid),
    ("InvalidObjectName", Class::Invalid),
];

/// Map a provider failure into the error taxonomy
///
/// Codes in the table win over the HTTP status; an unmapped code keeps its
/// raw value inside [`Error::Provider`].
pub fn normalize(failure: ProviderFailure) -> Error {
    match failure {
        ProviderFailure::Transport { message, timeout } => {
            if timeout {
                Error::Connectivity(format!("timed out: {message}"))
            } else {
                Error::Connectivity(message)
            }
        }
        ProviderFailure::Client { message } => Error::Provider {
            code: "ClientError".to_string(),
            status: None,
            message,
        },
        ProviderFailure::Service {
            status,
            code,
            message,
        } => {
            let message = message.unwrap_or_else(|| match status {
                Some(s) => format!("provider returned HTTP {s}"),
                None => "provider returned an error".to_string(),
            });

            let class = code
                .as_deref()
                .and_then(|c| CODE_TABLE.iter().find(|(k, _)| *k == c).map(|(_, v)| *v))
                .or(match status {
                    Some(401 | 403) => Some(Class::Auth),
                    Some(404) => Some(Class::NotFound),
                    _ => None,
                });

            match class {
                Some(Class::NotFound) => Error::NotFound(message),
                Some(Class::Conflict) => Error::NameConflict(message),
                Some(Class::Invalid) => Error::Validation(message),
                Some(Class::Auth) => Error::Authentication {
                    code: code.unwrap_or_else(|| status_code_name(status)),
                    message,
                },
                None => Error::Provider {
                    code: code.unwrap_or_else(|| status_code_name(status)),
                    status,
                    message,
                },
            }
        }
    }
}

fn status_code_name(status: Option<u16>) -> String {
    match status {
        Some(s) => format!("Http{s}"),
        None => "Unknown".to_string(),
    }
}

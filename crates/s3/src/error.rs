//! SDK error translation
//!
//! Reads the structured parts of an [`SdkError`] (HTTP status, error code,
//! timeout flag) and hands them to the core normalizer. Nothing here matches
//! on rendered error strings.

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_smithy_types::error::display::DisplayErrorContext;

use s3cm_core::{Error, ProviderFailure, normalize};

/// Describe an SDK failure for the normalizer
pub(crate) fn failure<E>(err: &SdkError<E, HttpResponse>) -> ProviderFailure
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match err {
        SdkError::TimeoutError(_) => ProviderFailure::Transport {
            message: "request timed out".into(),
            timeout: true,
        },
        SdkError::DispatchFailure(dispatch) => ProviderFailure::Transport {
            message: DisplayErrorContext(err).to_string(),
            timeout: dispatch.is_timeout(),
        },
        SdkError::ServiceError(ctx) => ProviderFailure::Service {
            status: Some(ctx.raw().status().as_u16()),
            code: ctx.err().code().map(str::to_string),
            message: ctx.err().message().map(str::to_string),
        },
        SdkError::ResponseError(ctx) => ProviderFailure::Service {
            status: Some(ctx.raw().status().as_u16()),
            code: None,
            message: Some(DisplayErrorContext(err).to_string()),
        },
        _ => ProviderFailure::Client {
            message: DisplayErrorContext(err).to_string(),
        },
    }
}

/// Convert an SDK error into the core taxonomy
pub(crate) fn sdk_error<E>(err: SdkError<E, HttpResponse>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let failure = failure(&err);
    tracing::debug!(?failure, "Provider call failed");
    normalize(failure)
}

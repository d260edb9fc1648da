use thiserror::Error;

/// Everything that can go wrong between a submission and its settled state.
///
/// The view layer only ever sees the rendered message inside
/// `SubmissionState::Failed`; the variants exist for diagnostics and tests.
/// No variant is fatal: every failure leaves the controller in `Failed`,
/// from which a fresh submit is always permitted.
#[derive(Debug, Error)]
pub enum DetectError {
    /// Rejected before any network activity (empty text, unreadable resource).
    #[error("{0}")]
    Validation(String),

    /// Transport-level failure: connection refused, timeout, DNS.
    /// Surfaced verbatim; never retried.
    #[error("network request failed: {0}")]
    Network(String),

    /// Non-2xx status. `body` is already truncated for display.
    #[error("API Error: {status} - {body}")]
    Api { status: u16, body: String },

    /// 2xx status with an empty body. Distinct from a parse failure.
    #[error("service returned an empty response")]
    EmptyResponse,

    /// Body was not parseable as JSON.
    #[error("could not parse service response: {0}")]
    Malformed(String),

    /// Parsed JSON lacks `prediction` or `scores`.
    #[error("invalid response structure received from service: {0}")]
    InvalidShape(&'static str),
}

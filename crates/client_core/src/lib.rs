use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use shared::{
    domain::{Modality, PickerOutcome, ResourceHandle, Submission},
    protocol::{ClassificationResult, ErrorDetail, HealthStatus, TextClaim},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use url::Url;

pub mod config;
pub mod error;

pub use config::Settings;
pub use error::DetectError;

/// How much of a failure body is carried into the user-facing message.
/// Longer bodies are truncated, not rejected.
const API_ERROR_BODY_PREVIEW_CHARS: usize = 100;

const STATE_CHANNEL_CAPACITY: usize = 32;

/// Fallback when an image URI carries no usable extension.
const DEFAULT_IMAGE_EXTENSION: &str = "jpg";

/// The UI-facing state machine value. Exactly one per controller; the view
/// layer renders whatever the controller currently holds.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionState {
    Idle,
    Loading { modality: Modality },
    Succeeded(ClassificationResult),
    Failed { message: String },
}

impl SubmissionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, SubmissionState::Loading { .. })
    }
}

/// Seam for turning a picker's resource handle into bytes. Pickers hand the
/// client a URI, not content; tests substitute their own loader.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    async fn load(&self, handle: &ResourceHandle) -> Result<Vec<u8>>;
}

/// Reads resources from the local filesystem, accepting plain paths and
/// `file://` URIs.
pub struct FsResourceLoader;

#[async_trait]
impl ResourceLoader for FsResourceLoader {
    async fn load(&self, handle: &ResourceHandle) -> Result<Vec<u8>> {
        let path = handle.uri.strip_prefix("file://").unwrap_or(&handle.uri);
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read resource '{}'", handle.uri))?;
        Ok(bytes)
    }
}

struct ControllerInner {
    state: SubmissionState,
    /// Bumped on every submit and reset. A settling request applies its
    /// outcome only if the generation it captured is still current, so a
    /// late response can never overwrite a fresher state.
    generation: u64,
}

/// Owns the submission state machine: converts a [`Submission`] into exactly
/// one network call and the outcome into a [`SubmissionState`].
///
/// At most one submission is in flight; a `submit` during `Loading` is
/// ignored. There is no cancellation: an in-flight call always runs to
/// completion, and [`DetectionController::reset`] merely arranges for its
/// result to be discarded.
pub struct DetectionController {
    http: Client,
    backend_url: String,
    resource_loader: Arc<dyn ResourceLoader>,
    inner: Mutex<ControllerInner>,
    states: broadcast::Sender<SubmissionState>,
}

impl std::fmt::Debug for DetectionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionController")
            .field("backend_url", &self.backend_url)
            .finish_non_exhaustive()
    }
}

impl DetectionController {
    pub fn new(settings: Settings) -> Result<Arc<Self>> {
        Self::with_resource_loader(settings, Arc::new(FsResourceLoader))
    }

    pub fn with_resource_loader(
        settings: Settings,
        resource_loader: Arc<dyn ResourceLoader>,
    ) -> Result<Arc<Self>> {
        let backend_url = config::normalize_backend_url(&settings.backend_url);
        let parsed = Url::parse(&backend_url)
            .with_context(|| format!("invalid backend url '{backend_url}'"))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(anyhow!("backend url must start with http:// or https://"));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("failed to build http client")?;

        let (states, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        Ok(Arc::new(Self {
            http,
            backend_url,
            resource_loader,
            inner: Mutex::new(ControllerInner {
                state: SubmissionState::Idle,
                generation: 0,
            }),
            states,
        }))
    }

    /// Current state, for render-on-demand view layers.
    pub async fn state(&self) -> SubmissionState {
        self.inner.lock().await.state.clone()
    }

    /// State transitions, for view layers that render reactively.
    pub fn subscribe_states(&self) -> broadcast::Receiver<SubmissionState> {
        self.states.subscribe()
    }

    /// Focus-regain hook: back to `Idle`, discarding any prior result or
    /// error. Also invalidates any in-flight request, whose response will be
    /// dropped when it eventually arrives.
    pub async fn reset(&self) -> SubmissionState {
        let mut inner = self.inner.lock().await;
        inner.generation += 1;
        inner.state = SubmissionState::Idle;
        let _ = self.states.send(SubmissionState::Idle);
        SubmissionState::Idle
    }

    /// Entry point for picker-driven modalities. A canceled picker resets to
    /// `Idle` rather than failing.
    pub async fn submit_pick(&self, modality: Modality, outcome: PickerOutcome) -> SubmissionState {
        match Submission::from_picker(modality, outcome) {
            Some(submission) => self.submit(submission).await,
            None => {
                info!(?modality, "detect: picker yielded no resource");
                self.reset().await
            }
        }
    }

    /// Convert one submission into one network call and settle the state
    /// machine with the outcome.
    pub async fn submit(&self, submission: Submission) -> SubmissionState {
        let modality = submission.modality();

        let generation = {
            let mut inner = self.inner.lock().await;
            if inner.state.is_loading() {
                warn!(?modality, "detect: submit ignored, a request is in flight");
                return inner.state.clone();
            }

            if let Submission::Text(text) = &submission {
                if text.trim().is_empty() {
                    let err = DetectError::Validation("Please enter a claim.".into());
                    inner.state = SubmissionState::Failed {
                        message: err.to_string(),
                    };
                    let _ = self.states.send(inner.state.clone());
                    return inner.state.clone();
                }
            }

            inner.generation += 1;
            inner.state = SubmissionState::Loading { modality };
            let _ = self.states.send(inner.state.clone());
            inner.generation
        };

        let outcome = self.classify(submission).await;

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            debug!(
                ?modality,
                generation, "detect: discarding response for a superseded submission"
            );
            return inner.state.clone();
        }

        inner.state = match outcome {
            Ok(result) => {
                if !(0.0..=1.0).contains(&result.confidence) {
                    warn!(
                        confidence = result.confidence,
                        "detect: confidence outside [0, 1], accepting anyway"
                    );
                }
                info!(?modality, prediction = %result.prediction, "detect: classification succeeded");
                SubmissionState::Succeeded(result)
            }
            Err(err) => {
                warn!(?modality, error = %err, "detect: classification failed");
                SubmissionState::Failed {
                    message: err.to_string(),
                }
            }
        };
        let _ = self.states.send(inner.state.clone());
        inner.state.clone()
    }

    /// Probe the service's health endpoint.
    pub async fn health(&self) -> Result<HealthStatus, DetectError> {
        let response = self
            .http
            .get(format!("{}/", self.backend_url))
            .send()
            .await
            .map_err(|err| DetectError::Network(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| DetectError::Network(err.to_string()))?;

        if !status.is_success() {
            return Err(DetectError::Api {
                status: status.as_u16(),
                body: truncate_chars(&body, API_ERROR_BODY_PREVIEW_CHARS),
            });
        }

        serde_json::from_str(&body).map_err(|err| DetectError::Malformed(err.to_string()))
    }

    async fn classify(&self, submission: Submission) -> Result<ClassificationResult, DetectError> {
        let request = self.build_request(submission).await?;
        let response = request
            .send()
            .await
            .map_err(|err| DetectError::Network(err.to_string()))?;

        // Read the whole body as text before any parsing: an error status may
        // still carry a useful diagnostic body, and an OK status with an
        // empty body is its own failure, distinct from a parse failure.
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| DetectError::Network(err.to_string()))?;

        if !status.is_success() {
            if let Ok(detail) = serde_json::from_str::<ErrorDetail>(&body) {
                debug!(status = status.as_u16(), detail = %detail.detail, "detect: service error detail");
            }
            return Err(DetectError::Api {
                status: status.as_u16(),
                body: truncate_chars(&body, API_ERROR_BODY_PREVIEW_CHARS),
            });
        }

        if body.is_empty() {
            return Err(DetectError::EmptyResponse);
        }

        let value: serde_json::Value =
            serde_json::from_str(&body).map_err(|err| DetectError::Malformed(err.to_string()))?;

        ClassificationResult::from_wire(value).map_err(DetectError::InvalidShape)
    }

    /// The mode-specific branch: one request builder per modality, one
    /// endpoint each. For multipart uploads no content-type header is set
    /// here; the transport computes the boundary itself.
    async fn build_request(
        &self,
        submission: Submission,
    ) -> Result<reqwest::RequestBuilder, DetectError> {
        match submission {
            Submission::Text(text) => Ok(self
                .http
                .post(self.endpoint("classify-text"))
                .json(&TextClaim { text })),

            Submission::Document(handle) => {
                let bytes = self.load_resource(&handle).await?;
                let part = Part::bytes(bytes)
                    .file_name(handle.name.clone())
                    .mime_str("application/pdf")
                    .map_err(|err| DetectError::Validation(err.to_string()))?;
                Ok(self
                    .http
                    .post(self.endpoint("classify-file"))
                    .multipart(Form::new().part("file", part)))
            }

            Submission::Image(handle) => {
                let bytes = self.load_resource(&handle).await?;
                let ext = image_extension(&handle.uri);
                let part = Part::bytes(bytes)
                    .file_name(format!("upload.{ext}"))
                    .mime_str(&format!("image/{ext}"))
                    .map_err(|err| {
                        DetectError::Validation(format!(
                            "unsupported image extension '{ext}': {err}"
                        ))
                    })?;
                Ok(self
                    .http
                    .post(self.endpoint("classify-image"))
                    .multipart(Form::new().part("file", part)))
            }
        }
    }

    async fn load_resource(&self, handle: &ResourceHandle) -> Result<Vec<u8>, DetectError> {
        self.resource_loader
            .load(handle)
            .await
            .map_err(|err| DetectError::Validation(format!("{err:#}")))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{path}", self.backend_url)
    }
}

/// Lowercased extension of the resource URI, ignoring query strings.
fn image_extension(uri: &str) -> String {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    let last_segment = path.rsplit('/').next().unwrap_or(path);
    match last_segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => DEFAULT_IMAGE_EXTENSION.to_string(),
    }
}

fn truncate_chars(body: &str, limit: usize) -> String {
    body.chars().take(limit).collect()
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

use serde::{Deserialize, Serialize};

/// The kind of input being classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Text,
    Document,
    Image,
}

/// A locally held binary resource as yielded by a file or image picker.
///
/// The picker itself is an external collaborator; the client only ever sees
/// the handle it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub uri: String,
    pub name: String,
    pub mime_type: Option<String>,
}

/// Outcome of one picker interaction. Cancellation is a normal outcome,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerOutcome {
    Canceled,
    Selected(ResourceHandle),
}

impl PickerOutcome {
    pub fn into_resource(self) -> Option<ResourceHandle> {
        match self {
            PickerOutcome::Canceled => None,
            PickerOutcome::Selected(handle) => Some(handle),
        }
    }
}

/// One user-initiated request to classify a claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Text(String),
    Document(ResourceHandle),
    Image(ResourceHandle),
}

impl Submission {
    pub fn modality(&self) -> Modality {
        match self {
            Submission::Text(_) => Modality::Text,
            Submission::Document(_) => Modality::Document,
            Submission::Image(_) => Modality::Image,
        }
    }

    /// Build a submission from a picker outcome. Returns `None` when the
    /// picker was canceled. Text never originates from a picker, so
    /// `Modality::Text` also yields `None`.
    pub fn from_picker(modality: Modality, outcome: PickerOutcome) -> Option<Self> {
        let handle = outcome.into_resource()?;
        match modality {
            Modality::Document => Some(Submission::Document(handle)),
            Modality::Image => Some(Submission::Image(handle)),
            Modality::Text => None,
        }
    }
}

//! Per-conversation runtime state
//!
//! A session is owned by exactly one session task. Collaborators (intent
//! classifiers, recognizers, transports) write their results into it through
//! [`Session::receive`] or the individual setters before the engine steps.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use crate::perception::ImagePrediction;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Flag keys recognized by the event library
pub mod flag {
    pub const PREDICTED_INTENT: &str = "predicted_intent";
    pub const FILE: &str = "file";
    pub const IMAGE_PREDICTION: &str = "image_prediction";
    pub const EVENT: &str = "event";
}

/// Intent predicted when the classifier finds no match
pub const FALLBACK_INTENT: &str = "fallback_intent";

/// Boolean flags set by collaborators. Unset flags read as `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags(HashMap<String, bool>);

impl Flags {
    pub fn get(&self, key: &str) -> bool {
        self.0.get(key).copied().unwrap_or(false)
    }

    /// `None` if the flag was never written
    pub fn lookup(&self, key: &str) -> Option<bool> {
        self.0.get(key).copied()
    }

    pub fn set(&mut self, key: impl Into<String>, value: bool) {
        self.0.insert(key.into(), value);
    }
}

/// Output of the intent classification collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentPrediction {
    pub intent: String,
    #[serde(default)]
    pub score: f64,
}

impl IntentPrediction {
    pub fn new(intent: impl Into<String>, score: f64) -> Self {
        Self {
            intent: intent.into(),
            score,
        }
    }

    /// Prediction used when nothing in the agent's vocabulary matched
    pub fn fallback() -> Self {
        Self::new(FALLBACK_INTENT, 0.0)
    }
}

/// A file received from the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    /// MIME type, e.g. `image/png`
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Base64 content, if the transport delivered it inline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
}

impl FileInfo {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            base64: None,
        }
    }

    /// A file carrying its content inline
    pub fn from_bytes(name: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            base64: Some(BASE64.encode(bytes)),
            ..Self::new(name, mime_type)
        }
    }

    /// Decoded inline content, if any
    pub fn bytes(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
        self.base64.as_deref().map(|data| BASE64.decode(data))
    }
}

/// An event raised by something other than the user (webhook, timer, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalEvent {
    pub name: String,
    #[serde(default)]
    pub payload: Value,
}

/// An inbound stimulus, already processed by the NLU/perception collaborators
#[derive(Debug, Clone)]
pub enum Stimulus {
    Message {
        text: String,
        prediction: Option<IntentPrediction>,
    },
    File(FileInfo),
    Image(ImagePrediction),
    Event(ExternalEvent),
}

/// Per-conversation state
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    current_state: String,
    flags: Flags,
    message: Option<String>,
    predicted_intent: Option<IntentPrediction>,
    file: Option<FileInfo>,
    image_prediction: Option<ImagePrediction>,
    event: Option<ExternalEvent>,
    variables: HashMap<String, Value>,
}

impl Session {
    pub fn new(id: impl Into<String>, initial_state: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            current_state: initial_state.into(),
            flags: Flags::default(),
            message: None,
            predicted_intent: None,
            file: None,
            image_prediction: None,
            event: None,
            variables: HashMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the state the session is currently in
    pub fn current_state(&self) -> &str {
        &self.current_state
    }

    pub(crate) fn move_to(&mut self, state: &str) {
        state.clone_into(&mut self.current_state);
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut Flags {
        &mut self.flags
    }

    /// Last text message received
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn predicted_intent(&self) -> Option<&IntentPrediction> {
        self.predicted_intent.as_ref()
    }

    pub fn file(&self) -> Option<&FileInfo> {
        self.file.as_ref()
    }

    /// Latest perception snapshot. Kept across later text stimuli; only the
    /// `image_prediction` flag says whether it came with the current one.
    pub fn image_prediction(&self) -> Option<&ImagePrediction> {
        self.image_prediction.as_ref()
    }

    pub fn event(&self) -> Option<&ExternalEvent> {
        self.event.as_ref()
    }

    pub fn set_predicted_intent(&mut self, prediction: Option<IntentPrediction>) {
        self.flags.set(flag::PREDICTED_INTENT, prediction.is_some());
        self.predicted_intent = prediction;
    }

    pub fn set_file(&mut self, file: Option<FileInfo>) {
        self.flags.set(flag::FILE, file.is_some());
        self.file = file;
    }

    pub fn set_image_prediction(&mut self, prediction: Option<ImagePrediction>) {
        self.flags.set(flag::IMAGE_PREDICTION, prediction.is_some());
        self.image_prediction = prediction;
    }

    pub fn set_event(&mut self, event: Option<ExternalEvent>) {
        self.flags.set(flag::EVENT, event.is_some());
        self.event = event;
    }

    /// Apply a stimulus. Flags of the previous stimulus are lowered first so
    /// each step sees only what arrived with the current one.
    pub fn receive(&mut self, stimulus: Stimulus) {
        self.flags.set(flag::PREDICTED_INTENT, false);
        self.flags.set(flag::FILE, false);
        self.flags.set(flag::IMAGE_PREDICTION, false);
        self.flags.set(flag::EVENT, false);

        match stimulus {
            Stimulus::Message { text, prediction } => {
                self.message = Some(text);
                self.set_predicted_intent(Some(prediction.unwrap_or_else(IntentPrediction::fallback)));
            }
            Stimulus::File(file) => self.set_file(Some(file)),
            Stimulus::Image(prediction) => self.set_image_prediction(Some(prediction)),
            Stimulus::Event(event) => self.set_event(Some(event)),
        }
    }

    // ==================== Variables ====================

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    pub fn delete(&mut self, key: &str) -> Option<Value> {
        self.variables.remove(key)
    }

    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.variables
    }
}

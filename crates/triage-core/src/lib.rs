//! triage-core: turns a finished call transcript into a structured clinical triage record.
//!
//! The pipeline builds one fixed-schema prompt, calls the remote model once, strips markdown
//! fences from the reply, parses it, and checks it against [`ClinicalRecord`]. Parse failures
//! keep the model's raw text; transport failures propagate untouched.

pub mod classifier;
pub mod config;
mod error;
mod model_service;
pub mod normalize;
mod pipeline;
pub mod prompts;
pub mod record;
mod request;

pub use classifier::{format_symptoms, ClassifierClient, ClassifierError, SymptomFormat, TriageClassification};
pub use config::{api_key_from_env, TriageConfig};
pub use error::{ExtractionError, ModelError};
pub use model_service::{AnthropicModel, LanguageModel};
pub use normalize::{normalize_reply, strip_fences};
pub use pipeline::{parse_record, ExtractionPipeline};
pub use record::{ClinicalNotes, ClinicalRecord, Conformed, PatientData, Symptom, Urgency, NOT_AVAILABLE, ROOT_PATH, UNKNOWN};
pub use request::{ExtractionFailure, ExtractionReply, ExtractionRequest};

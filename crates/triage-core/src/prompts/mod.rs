//! Prompt templates for transcript extraction.

pub mod triage_extraction;

pub use triage_extraction::{
    render_elapsed_time, triage_extraction_prompt, TRIAGE_EXTRACTION_TEMPLATE,
};

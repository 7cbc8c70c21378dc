//! Prompt text for the remote vision model.
//!
//! Every prompt lives here so request construction in
//! [`crate::pipeline::llm`] never embeds wording, and unit tests can inspect
//! prompts without a running model.

/// First-turn instruction: transcribe what is visible, nothing else.
pub const TRANSCRIBE_PROMPT: &str =
    "Transcribe all text visible in this image exactly as written. \
Do not translate it. Do not add any text of your own: no headings, \
commentary, explanations or formatting fences.";

/// First-turn instruction with the local OCR output attached as a reference.
pub fn transcribe_with_hint(local_text: &str) -> String {
    format!(
        "{TRANSCRIBE_PROMPT}\n\n\
The following is a transcription of the same image produced by a local OCR \
engine. It may contain recognition errors; use it only to improve your own \
reading of the image:\n\n{local_text}"
    )
}

/// Second-turn instruction: reconcile the model's own answer with local OCR.
pub fn refine_prompt(local_text: &str) -> String {
    format!(
        "Combine your transcription above with the following output from a \
local OCR engine and produce a single refined transcription of the image. \
Keep the original language, and reply with the transcription only.\n\n{local_text}"
    )
}

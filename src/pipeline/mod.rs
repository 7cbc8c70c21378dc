//! Pipeline stages for batch image transcription.
//!
//! Each submodule implements one step, so each can be tested on its own and
//! the local engine or the model server can be swapped without touching the
//! rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ ledger ──▶ extract ──▶ encode ──▶ llm ──▶ writer ──▶ aggregate
//! (list)    (resume)   (OCR)       (base64)   (VLM)   (files)    (corpus)
//! ```
//!
//! 1. [`input`]     — list allowed images in filename order
//! 2. [`ledger`]    — decide from the output directory whether an item is done
//! 3. [`extract`]   — local OCR behind the [`extract::TextExtractor`] trait
//! 4. [`encode`]    — base64-wrap the source image for the request body
//! 5. [`wire`]      — request/response shapes per server flavor
//! 6. [`llm`]       — one- or two-turn protocol with retry; the only stage
//!    with network I/O
//! 7. [`writer`]    — atomic per-item file writes
//! 8. [`aggregate`] — concatenate per-item files into corpus files

pub mod aggregate;
pub mod encode;
pub mod extract;
pub mod input;
pub mod ledger;
pub mod llm;
pub mod wire;
pub mod writer;

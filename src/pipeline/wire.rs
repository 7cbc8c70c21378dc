//! Request and response bodies for the supported model servers.
//!
//! A request is built from a flavor-neutral [`Conversation`]; each
//! [`ApiFlavor`] serialises it its own way. Responses are deserialised into
//! typed structs, so a 2xx body missing the expected field surfaces as
//! [`RemoteError::Malformed`] instead of an empty transcription.

use crate::config::ApiFlavor;
use crate::error::RemoteError;
use crate::pipeline::encode::EncodedImage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Flavor-neutral conversation ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub image: Option<EncodedImage>,
}

/// Ordered message history sent to the model.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    pub turns: Vec<Turn>,
}

impl Conversation {
    /// A single user turn carrying the image.
    pub fn with_image(prompt: impl Into<String>, image: EncodedImage) -> Self {
        Self {
            turns: vec![Turn {
                role: Role::User,
                text: prompt.into(),
                image: Some(image),
            }],
        }
    }

    /// Append the model's earlier answer.
    pub fn reply(mut self, text: impl Into<String>) -> Self {
        self.turns.push(Turn {
            role: Role::Assistant,
            text: text.into(),
            image: None,
        });
        self
    }

    /// Append a text-only user turn.
    pub fn ask(mut self, text: impl Into<String>) -> Self {
        self.turns.push(Turn {
            role: Role::User,
            text: text.into(),
            image: None,
        });
        self
    }

    fn images(&self) -> impl Iterator<Item = &EncodedImage> {
        self.turns.iter().filter_map(|t| t.image.as_ref())
    }

    /// Collapse the history into one prompt for endpoints without chat turns.
    pub fn as_transcript(&self) -> String {
        if let [only] = self.turns.as_slice() {
            return only.text.clone();
        }
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.role.label(), t.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// ── Ollama ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<&'a str>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaReply,
}

#[derive(Deserialize)]
struct OllamaReply {
    content: String,
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    images: Vec<&'a str>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

// ── OpenAI-compatible ────────────────────────────────────────────────────

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage<'a>>,
    stream: bool,
    temperature: f32,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: OpenAiContent<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum OpenAiContent<'a> {
    Text(&'a str),
    Parts(Vec<OpenAiPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OpenAiPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: OpenAiImageUrl },
}

#[derive(Serialize)]
struct OpenAiImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiReply,
}

#[derive(Deserialize)]
struct OpenAiReply {
    content: Option<String>,
}

// ── Entry points ─────────────────────────────────────────────────────────

/// Serialise `conversation` into the JSON body `flavor` expects.
pub fn build_body(
    flavor: ApiFlavor,
    model: &str,
    temperature: f32,
    conversation: &Conversation,
) -> Result<Value, serde_json::Error> {
    match flavor {
        ApiFlavor::OllamaChat => serde_json::to_value(OllamaChatRequest {
            model,
            messages: conversation
                .turns
                .iter()
                .map(|t| OllamaMessage {
                    role: t.role.as_str(),
                    content: &t.text,
                    images: t.image.iter().map(|i| i.data.as_str()).collect(),
                })
                .collect(),
            stream: false,
            options: OllamaOptions { temperature },
        }),
        ApiFlavor::OllamaGenerate => serde_json::to_value(OllamaGenerateRequest {
            model,
            prompt: conversation.as_transcript(),
            images: conversation.images().map(|i| i.data.as_str()).collect(),
            stream: false,
            options: OllamaOptions { temperature },
        }),
        ApiFlavor::OpenAi => serde_json::to_value(OpenAiRequest {
            model,
            messages: conversation
                .turns
                .iter()
                .map(|t| OpenAiMessage {
                    role: t.role.as_str(),
                    content: match &t.image {
                        None => OpenAiContent::Text(&t.text),
                        Some(img) => OpenAiContent::Parts(vec![
                            OpenAiPart::Text { text: &t.text },
                            OpenAiPart::ImageUrl {
                                image_url: OpenAiImageUrl {
                                    url: img.to_data_url(),
                                },
                            },
                        ]),
                    },
                })
                .collect(),
            stream: false,
            temperature,
        }),
    }
}

/// Pull the model's text out of a 2xx response body.
pub fn parse_reply(flavor: ApiFlavor, body: &str) -> Result<String, RemoteError> {
    let malformed = |e: serde_json::Error| RemoteError::Malformed(e.to_string());
    match flavor {
        ApiFlavor::OllamaChat => serde_json::from_str::<OllamaChatResponse>(body)
            .map(|r| r.message.content)
            .map_err(malformed),
        ApiFlavor::OllamaGenerate => serde_json::from_str::<OllamaGenerateResponse>(body)
            .map(|r| r.response)
            .map_err(malformed),
        ApiFlavor::OpenAi => {
            let resp = serde_json::from_str::<OpenAiResponse>(body).map_err(malformed)?;
            resp.choices
                .into_iter()
                .next()
                .ok_or_else(|| RemoteError::Malformed("response has no choices".into()))?
                .message
                .content
                .ok_or_else(|| RemoteError::Malformed("choice has no message content".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image() -> EncodedImage {
        EncodedImage {
            data: "QUJD".into(),
            mime_type: "image/png".into(),
        }
    }

    fn two_step() -> Conversation {
        Conversation::with_image("read it", image())
            .reply("first answer")
            .ask("refine it")
    }

    #[test]
    fn ollama_chat_body() {
        let body = build_body(ApiFlavor::OllamaChat, "m", 0.1, &two_step()).unwrap();
        assert_eq!(body["model"], "m");
        assert_eq!(body["stream"], false);
        let msgs = body["messages"].as_array().unwrap();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0]["role"], "user");
        assert_eq!(msgs[0]["images"], json!(["QUJD"]));
        assert_eq!(msgs[1]["role"], "assistant");
        assert_eq!(msgs[1]["content"], "first answer");
        assert!(msgs[1].get("images").is_none());
        assert_eq!(msgs[2]["content"], "refine it");
    }

    #[test]
    fn generate_body_flattens_history() {
        let body = build_body(ApiFlavor::OllamaGenerate, "m", 0.1, &two_step()).unwrap();
        assert_eq!(
            body["prompt"],
            "User: read it\n\nAssistant: first answer\n\nUser: refine it"
        );
        assert_eq!(body["images"], json!(["QUJD"]));

        let single = Conversation::with_image("read it", image());
        let body = build_body(ApiFlavor::OllamaGenerate, "m", 0.1, &single).unwrap();
        assert_eq!(body["prompt"], "read it");
    }

    #[test]
    fn openai_body_uses_data_url_parts() {
        let body = build_body(ApiFlavor::OpenAi, "m", 0.1, &two_step()).unwrap();
        let first = &body["messages"][0]["content"];
        assert_eq!(first[0]["type"], "text");
        assert_eq!(first[1]["type"], "image_url");
        assert_eq!(first[1]["image_url"]["url"], "data:image/png;base64,QUJD");
        assert_eq!(body["messages"][1]["content"], "first answer");
    }

    #[test]
    fn parse_each_flavor() {
        assert_eq!(
            parse_reply(ApiFlavor::OllamaChat, r#"{"message":{"role":"assistant","content":"hi"}}"#),
            Ok("hi".into())
        );
        assert_eq!(
            parse_reply(ApiFlavor::OllamaGenerate, r#"{"response":"hi","done":true}"#),
            Ok("hi".into())
        );
        assert_eq!(
            parse_reply(ApiFlavor::OpenAi, r#"{"choices":[{"message":{"content":"hi"}}]}"#),
            Ok("hi".into())
        );
    }

    #[test]
    fn missing_fields_are_malformed() {
        assert!(matches!(
            parse_reply(ApiFlavor::OllamaChat, r#"{"done":true}"#),
            Err(RemoteError::Malformed(_))
        ));
        assert!(matches!(
            parse_reply(ApiFlavor::OpenAi, r#"{"choices":[]}"#),
            Err(RemoteError::Malformed(_))
        ));
        assert!(matches!(
            parse_reply(ApiFlavor::OpenAi, r#"{"choices":[{"message":{"content":null}}]}"#),
            Err(RemoteError::Malformed(_))
        ));
        assert!(matches!(
            parse_reply(ApiFlavor::OllamaGenerate, "<html>"),
            Err(RemoteError::Malformed(_))
        ));
    }
}

pub mod llm {
    use futures::Stream;
    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    use crate::prompt::Prompt;

    #[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum Role {
        System,
        User,
        Assistant,
    }

    impl Role {
        pub fn as_str(self) -> &'static str {
            match self {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            }
        }
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    pub struct Message {
        pub role: Role,
        pub content: String,
    }

    #[derive(Error, Debug)]
    pub enum BackendError {
        #[error("auth error: {0}")] Auth(String),
        #[error("rate limit: {0}")] RateLimit(String),
        #[error("timeout: {0}")] Timeout(String),
        #[error("network: {0}")] Network(String),
        #[error("decode: {0}")] Decode(String),
        #[error("protocol: {0}")] Protocol(String),
        #[error("other: {0}")] Other(String),
    }

    #[derive(Error, Debug)]
    pub enum GenerateError {
        #[error("invalid request: {0}")] InvalidRequest(String),
        #[error("missing api key for {0}")] MissingCredential(&'static str),
        #[error("unsupported model: {0}")] UnsupportedModel(String),
        #[error("backend produced no output")] EmptyResponse,
        #[error("generation failed: {0}")] Generation(#[from] BackendError),
    }

    pub type BackendStream = Pin<Box<dyn Stream<Item = Result<String, BackendError>> + Send>>;
    pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, GenerateError>> + Send>>;

    use std::pin::Pin;

    #[async_trait::async_trait]
    pub trait ChatBackend: Send + Sync {
        fn name(&self) -> &'static str;
        async fn stream(&self, prompt: &Prompt) -> Result<BackendStream, BackendError>;
    }
}

pub mod prompt {
    use serde::{Deserialize, Serialize};

    use crate::llm::Role;

    #[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "lowercase", from = "String")]
    pub enum Topic {
        #[default]
        General,
        Coding,
        Writing,
    }

    // Unknown tags collapse to General rather than failing the request.
    impl From<String> for Topic {
        fn from(s: String) -> Self {
            match s.to_ascii_lowercase().as_str() {
                "coding" => Topic::Coding,
                "writing" => Topic::Writing,
                _ => Topic::General,
            }
        }
    }

    impl Topic {
        pub fn preamble(self) -> &'static str {
            match self {
                Topic::General => {
                    "You are a helpful personal assistant. Answer using the \
                     conversation so far, and say so when you are unsure."
                }
                Topic::Coding => {
                    "You are a programming assistant. Prefer short, correct \
                     code examples and point out pitfalls in the user's code."
                }
                Topic::Writing => {
                    "You are a writing assistant. Keep the user's tone and \
                     improve clarity, grammar and structure."
                }
            }
        }
    }

    /// One conversation turn in the shape the selected provider expects.
    /// Gemini-family models take `{role, parts}`; everything else takes
    /// `{role, content}`.
    #[derive(Clone, Debug, Serialize, PartialEq, Eq)]
    #[serde(untagged)]
    pub enum WireMessage {
        Content { role: Role, content: String },
        Parts { role: Role, parts: String },
    }

    impl WireMessage {
        pub fn role(&self) -> Role {
            match self {
                WireMessage::Content { role, .. } | WireMessage::Parts { role, .. } => *role,
            }
        }

        pub fn text(&self) -> &str {
            match self {
                WireMessage::Content { content, .. } => content,
                WireMessage::Parts { parts, .. } => parts,
            }
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Prompt {
        pub preamble: String,
        pub messages: Vec<WireMessage>,
    }

    pub fn build_prompt(messages: Vec<WireMessage>, topic: Topic) -> Prompt {
        Prompt {
            preamble: topic.preamble().to_string(),
            messages,
        }
    }

}

pub mod anthropic {
    pub mod client;
    pub mod config;
}
pub mod gemini {
    pub mod client;
    pub mod config;
}
pub mod ollama {
    pub mod client;
    pub mod config;
}
pub mod openai {
    pub mod client;
    pub mod config;
}

pub mod generate;
pub mod select;

mod http;
mod sse;

pub use generate::{GenerateRequest, Generator};
pub use select::{ProviderSelector, SelectBackend};

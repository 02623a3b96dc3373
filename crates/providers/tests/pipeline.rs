use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use providers::{GenerateRequest, Generator, SelectBackend};
use relay_core::llm::{
    BackendError, BackendStream, ChatBackend, GenerateError, Message, Role,
};
use relay_core::prompt::{Prompt, Topic};

struct StubBackend {
    chunks: Vec<&'static str>,
    fail_at_end: bool,
}

#[async_trait::async_trait]
impl ChatBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn stream(&self, _prompt: &Prompt) -> Result<BackendStream, BackendError> {
        let chunks = self.chunks.clone();
        let fail_at_end = self.fail_at_end;
        let s = async_stream::stream! {
            for c in chunks {
                yield Ok(c.to_string());
            }
            if fail_at_end {
                yield Err(BackendError::Network("connection reset".into()));
            }
        };
        Ok(Box::pin(s))
    }
}

struct StubSelector {
    calls: Arc<AtomicUsize>,
    chunks: Vec<&'static str>,
    fail_at_end: bool,
}

impl StubSelector {
    fn emitting(chunks: Vec<&'static str>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let selector = StubSelector {
            calls: calls.clone(),
            chunks,
            fail_at_end: false,
        };
        (selector, calls)
    }
}

impl SelectBackend for StubSelector {
    fn select(
        &self,
        _model: Option<&str>,
        _variant: Option<&str>,
        _credential: Option<&str>,
    ) -> Result<Box<dyn ChatBackend>, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubBackend {
            chunks: self.chunks.clone(),
            fail_at_end: self.fail_at_end,
        }))
    }
}

fn request(messages: Vec<Message>) -> GenerateRequest {
    GenerateRequest {
        messages,
        model: None,
        variant: None,
        api_key: None,
        topic: Topic::General,
    }
}

fn user(content: &str) -> Message {
    Message {
        role: Role::User,
        content: content.into(),
    }
}

#[tokio::test]
async fn empty_messages_fail_fast_without_selecting_a_backend() {
    let (selector, calls) = StubSelector::emitting(vec!["unused"]);
    let generator = Generator::with_selector(Box::new(selector));

    let err = generator.generate(request(vec![])).await.err().unwrap();
    assert!(matches!(err, GenerateError::InvalidRequest(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn fragments_concatenate_regardless_of_chunking() {
    let chunkings: Vec<Vec<&'static str>> = vec![
        vec!["Hi there"],
        vec!["Hi", " there"],
        vec!["H", "i", " ", "t", "h", "e", "r", "e"],
    ];
    for chunks in chunkings {
        let expected: Vec<String> = chunks.iter().map(|c| c.to_string()).collect();
        let (selector, _) = StubSelector::emitting(chunks);
        let generator = Generator::with_selector(Box::new(selector));

        let stream = generator.generate(request(vec![user("hello")])).await.unwrap();
        let got: Vec<String> = stream
            .map(|item| item.expect("no errors expected"))
            .collect()
            .await;
        assert_eq!(got, expected);
        assert_eq!(got.concat(), "Hi there");
    }
}

#[tokio::test]
async fn local_fallback_streams_the_stub_output_in_order() {
    let (selector, calls) = StubSelector::emitting(vec!["Hi", " there"]);
    let generator = Generator::with_selector(Box::new(selector));

    let stream = generator.generate(request(vec![user("hello")])).await.unwrap();
    let got: Vec<String> = stream.map(|item| item.unwrap()).collect().await;
    assert_eq!(got, vec!["Hi".to_string(), " there".to_string()]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_fragments_surface_as_empty_response() {
    let (selector, _) = StubSelector::emitting(vec![]);
    let generator = Generator::with_selector(Box::new(selector));

    let stream = generator.generate(request(vec![user("hello")])).await.unwrap();
    let items: Vec<_> = stream.collect().await;
    assert_eq!(items.len(), 1);
    assert!(matches!(items[0], Err(GenerateError::EmptyResponse)));
}

#[tokio::test]
async fn mid_stream_failure_is_normalized_and_terminal() {
    let calls = Arc::new(AtomicUsize::new(0));
    let selector = StubSelector {
        calls,
        chunks: vec!["Hi"],
        fail_at_end: true,
    };
    let generator = Generator::with_selector(Box::new(selector));

    let stream = generator.generate(request(vec![user("hello")])).await.unwrap();
    let items: Vec<_> = stream.collect().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "Hi");
    match &items[1] {
        Err(GenerateError::Generation(BackendError::Network(msg))) => {
            assert!(msg.contains("connection reset"))
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn missing_credential_propagates_before_any_streaming() {
    // Production selector: openai-prefixed models demand a key.
    let generator = Generator::new();
    let mut req = request(vec![user("hello")]);
    req.model = Some("openai-gpt".into());

    let err = generator.generate(req).await.err().unwrap();
    assert!(matches!(err, GenerateError::MissingCredential("openai")));
}

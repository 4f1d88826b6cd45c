//! The LLM boundary: two function contracts, `think` and `speak`. Both are
//! language-neutral — any adapter satisfying the trait is acceptable; the core never
//! talks to a transport directly.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::error::AgentError;
use crate::state::HistoryMessage;

/// A supplemental tool-call record, packaged for `speak` so the model can reference
/// completed actions while composing its reply.
#[derive(Clone, Debug)]
pub struct SupplementalAction {
    pub action_id: String,
    pub action_name: String,
    pub intention: String,
    pub result: String,
}

/// Non-streaming, structured-output call. Returns the model's JSON output as a string,
/// already validated against `output_schema` by the implementation.
///
/// `get_system_prompt` takes the name of the effect requesting the call (`"reaction"` or
/// `"refine"`) so one adapter can vary its system framing per caller without the core
/// needing to know the adapter's internals.
#[async_trait]
pub trait ThinkFn: Send + Sync {
    async fn think(
        &self,
        get_system_prompt: &(dyn Fn(&str) -> String + Send + Sync),
        window: &[HistoryMessage],
        output_schema: &Value,
    ) -> Result<String, AgentError>;
}

/// Streaming call. Returns a cold, pull-based stream of content chunks — the caller
/// drives iteration, which composes with cancellation and makes backpressure explicit.
///
/// `already_sent` carries the content already streamed to the user on a prior attempt,
/// for resuming a reply whose Reply effect was cancelled mid-stream.
#[async_trait]
pub trait SpeakFn: Send + Sync {
    async fn speak(
        &self,
        system_prompt: &str,
        window: &[HistoryMessage],
        supplemental_actions: &[SupplementalAction],
        already_sent: &str,
    ) -> Result<BoxStream<'static, Result<String, AgentError>>, AgentError>;
}

#[cfg(test)]
pub mod mock {
    //! Fixed-response test doubles, in the spirit of the teacher's `MockLlm`.

    use std::sync::Mutex;

    use futures::stream;

    use super::*;

    /// Returns a fixed sequence of `think` outputs, one per call, cycling back to the
    /// first once exhausted so tests can seed more calls than responses without panicking.
    pub struct MockThink {
        responses: Mutex<Vec<String>>,
        next: Mutex<usize>,
    }

    impl MockThink {
        pub fn new(responses: Vec<String>) -> Self {
            Self {
                responses: Mutex::new(responses),
                next: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl ThinkFn for MockThink {
        async fn think(
            &self,
            _get_system_prompt: &(dyn Fn(&str) -> String + Send + Sync),
            _window: &[HistoryMessage],
            _output_schema: &Value,
        ) -> Result<String, AgentError> {
            let responses = self.responses.lock().unwrap();
            let mut next = self.next.lock().unwrap();
            let response = responses[*next % responses.len()].clone();
            *next += 1;
            Ok(response)
        }
    }

    /// Yields a fixed sequence of chunks, ignoring `already_sent` (tests that need
    /// resume semantics construct their own `SpeakFn`).
    pub struct MockSpeak {
        chunks: Vec<String>,
    }

    impl MockSpeak {
        pub fn new(chunks: Vec<&str>) -> Self {
            Self {
                chunks: chunks.into_iter().map(String::from).collect(),
            }
        }
    }

    #[async_trait]
    impl SpeakFn for MockSpeak {
        async fn speak(
            &self,
            _system_prompt: &str,
            _window: &[HistoryMessage],
            _supplemental_actions: &[SupplementalAction],
            _already_sent: &str,
        ) -> Result<BoxStream<'static, Result<String, AgentError>>, AgentError> {
            let chunks = self.chunks.clone();
            Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
        }
    }
}

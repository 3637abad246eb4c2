//! Deterministic stand-ins for the text-generation service.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::llm::{GenerationRequest, TextGenerator};

type Responder = dyn Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync;

/// Answers every request through a closure and records what it was asked.
pub struct ScriptedGenerator {
    responder: Box<Responder>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(
        responder: impl Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with the same body.
    pub fn constant(body: &str) -> Self {
        let body = body.to_string();
        Self::new(move |_| Ok(body.clone()))
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(request)
    }
}

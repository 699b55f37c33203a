//! Blocking chat client for an Ollama-style `/api/chat` endpoint.

use crate::config::OracleSettings;
use crate::oracle::{ChatMessage, DecisionOracle, OracleError, OracleRequest};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Must be constructed and used outside an async runtime context.
#[derive(Debug)]
pub struct OllamaOracle {
    url: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OllamaOracle {
    pub fn new(settings: &OracleSettings) -> Result<Self, OracleError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            url: settings.url.clone(),
            model: settings.model.clone(),
            client,
        })
    }
}

impl DecisionOracle for OllamaOracle {
    fn consult(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            stream: false,
        };

        let response: ChatResponse = self
            .client
            .post(&self.url)
            .json(&body)
            .send()?
            .error_for_status()?
            .json()?;

        Ok(response.message.content)
    }
}

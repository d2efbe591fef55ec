mod client;
pub(crate) mod types;

use anyhow::{anyhow, Context, Result};
use tracing::warn;

use crate::schema::StructuredOutput;
use client::{MessagesClient, ANTHROPIC_API_URL};
use types::*;

const TOOL_NAME: &str = "structured_response";
const DEFAULT_MAX_TOKENS: u32 = 4096;

// =============================================================================
// Claude
// =============================================================================

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: Option<f32>,
    http: reqwest::Client,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: ANTHROPIC_API_URL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask the model for a `T`.
    ///
    /// The request offers exactly one tool whose input schema is `T` and forces
    /// the model to call it, so the reply is the tool input deserialized as `T`.
    /// A reply without that tool call, or whose input doesn't fit `T`, is an error.
    pub async fn extract<T: StructuredOutput>(
        &self,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Result<T> {
        let request = MessagesRequest::new(&self.model, self.max_tokens)
            .system(system_prompt)
            .message(WireMessage::user(user_prompt))
            .temperature(self.temperature)
            .forced_tool(ToolDefinition {
                name: TOOL_NAME.to_string(),
                description: format!("Return the result as a {}.", T::type_name()),
                input_schema: T::tool_schema(),
            });

        let response = MessagesClient::new(&self.http, &self.api_key, &self.base_url)
            .send(&request)
            .await?;

        parse_tool_output(&response)
    }
}

fn parse_tool_output<T: StructuredOutput>(response: &MessagesResponse) -> Result<T> {
    let Some(input) = response.tool_input(TOOL_NAME) else {
        warn!(
            stop_reason = response.stop_reason.as_deref().unwrap_or("unknown"),
            text = response.text().unwrap_or(""),
            "Claude reply carried no structured output"
        );
        return Err(anyhow!("No structured output in Claude response"));
    };

    serde_json::from_value(input.clone())
        .with_context(|| format!("Structured output did not match {}", T::type_name()))
}

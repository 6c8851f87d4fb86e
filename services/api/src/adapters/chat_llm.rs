//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the conversational LLM.
//! It implements the `LanguageModelService` port from the `core` crate against any
//! OpenAI-compatible chat completions endpoint (Gemini's by default).

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;
use study_assistant_core::{
    domain::{Message, ModelChoice, Role},
    ports::{LanguageModelService, LlmError, PortError, PortResult, TextStream},
};
use tracing::warn;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `LanguageModelService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    default_model: String,
    reasoning_model: String,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`.
    pub fn new(client: Client<OpenAIConfig>, default_model: String, reasoning_model: String) -> Self {
        Self {
            client,
            default_model,
            reasoning_model,
        }
    }

    fn model_name(&self, model: ModelChoice) -> &str {
        match model {
            ModelChoice::Default => &self.default_model,
            ModelChoice::Reasoning => &self.reasoning_model,
        }
    }

    fn build_request(
        &self,
        model: ModelChoice,
        messages: &[Message],
        stream: bool,
    ) -> PortResult<CreateChatCompletionRequest> {
        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<PortResult<Vec<_>>>()?;

        let mut request = CreateChatCompletionRequestArgs::default()
            .model(self.model_name(model))
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if stream {
            request.stream = Some(true);
        }
        Ok(request)
    }
}

fn to_request_message(message: &Message) -> PortResult<ChatCompletionRequestMessage> {
    let built: ChatCompletionRequestMessage = match message.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(message.content.clone())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
    };
    Ok(built)
}

/// Classifies a provider failure from its structured error code, falling back
/// to the HTTP status.
fn map_openai_error(err: OpenAIError) -> LlmError {
    match &err {
        OpenAIError::ApiError(api_err) => {
            let code = api_err.code.as_deref().unwrap_or("").to_lowercase();
            let error_type = api_err.r#type.as_deref().unwrap_or("").to_lowercase();
            let message = api_err.message.to_lowercase();

            if code == "rate_limit_exceeded"
                || error_type == "rate_limit_error"
                || code == "429"
                || message.contains("resource_exhausted")
                || message.contains("quota")
            {
                LlmError::RateLimited(api_err.message.clone())
            } else if code == "context_length_exceeded"
                || message.contains("maximum context length")
                || message.contains("exceeds the maximum number of tokens")
                || message.contains("too long")
            {
                LlmError::ContextTooLong(api_err.message.clone())
            } else if code == "server_error"
                || error_type == "server_error"
                || error_type == "overloaded_error"
                || code == "503"
                || message.contains("unavailable")
                || message.contains("overloaded")
            {
                LlmError::Transient(api_err.message.clone())
            } else {
                LlmError::Fatal(err.to_string())
            }
        }
        OpenAIError::Reqwest(reqwest_err) => match reqwest_err.status().map(|s| s.as_u16()) {
            Some(429) => LlmError::RateLimited(err.to_string()),
            Some(413) => LlmError::ContextTooLong(err.to_string()),
            Some(status) if status >= 500 => LlmError::Transient(err.to_string()),
            Some(_) => LlmError::Fatal(err.to_string()),
            None => LlmError::Transient(err.to_string()),
        },
        OpenAIError::StreamError(_) => LlmError::Transient(err.to_string()),
        _ => LlmError::Fatal(err.to_string()),
    }
}

//=========================================================================================
// `LanguageModelService` Trait Implementation
//=========================================================================================

#[async_trait]
impl LanguageModelService for OpenAiChatAdapter {
    async fn complete(&self, model: ModelChoice, messages: &[Message]) -> PortResult<String> {
        let request = self.build_request(model, messages, false)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        // Extract the text content from the first choice in the response.
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Chat LLM response contained no text content.".to_string())
            })
    }

    async fn complete_streaming(
        &self,
        model: ModelChoice,
        messages: &[Message],
    ) -> PortResult<TextStream> {
        let request = self.build_request(model, messages, true)?;

        let mut upstream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(map_openai_error)?;

        let stream = async_stream::stream! {
            while let Some(chunk) = upstream.next().await {
                match chunk {
                    Ok(chunk) => {
                        let text: String = chunk
                            .choices
                            .into_iter()
                            .filter_map(|choice| choice.delta.content)
                            .collect();
                        if !text.is_empty() {
                            yield Ok(text);
                        }
                    }
                    Err(e) => {
                        warn!("Chat completion stream failed: {}", e);
                        yield Err(PortError::from(map_openai_error(e)));
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::ApiError;

    fn api_error(message: &str, r#type: Option<&str>, code: Option<&str>) -> OpenAIError {
        OpenAIError::ApiError(ApiError {
            message: message.to_string(),
            r#type: r#type.map(str::to_string),
            param: None,
            code: code.map(str::to_string),
        })
    }

    #[test]
    fn test_rate_limit_classified() {
        let err = map_openai_error(api_error("Rate limit exceeded", Some("rate_limit_error"), None));
        assert!(matches!(err, LlmError::RateLimited(_)));

        let err = map_openai_error(api_error("RESOURCE_EXHAUSTED: try later", None, None));
        assert!(matches!(err, LlmError::RateLimited(_)));
    }

    #[test]
    fn test_context_length_classified() {
        let err = map_openai_error(api_error(
            "The input token count (1200000) exceeds the maximum number of tokens allowed (1048576).",
            Some("invalid_request_error"),
            None,
        ));
        assert!(matches!(err, LlmError::ContextTooLong(_)));

        let err = map_openai_error(api_error("too big", None, Some("context_length_exceeded")));
        assert!(matches!(err, LlmError::ContextTooLong(_)));
    }

    #[test]
    fn test_unknown_api_error_is_fatal() {
        let err = map_openai_error(api_error("API key not valid", Some("invalid_request_error"), None));
        assert!(matches!(err, LlmError::Fatal(_)));
    }

    #[test]
    fn test_invalid_argument_is_fatal() {
        let err = map_openai_error(OpenAIError::InvalidArgument("bad arg".to_string()));
        assert!(matches!(err, LlmError::Fatal(_)));
    }

    #[test]
    fn test_request_uses_model_for_choice() {
        let adapter = OpenAiChatAdapter::new(
            Client::with_config(OpenAIConfig::new().with_api_key("test")),
            "gemini-2.5-flash".to_string(),
            "gemini-2.5-pro".to_string(),
        );
        let messages = vec![
            Message::system("You are Asti."),
            Message::user("What is a limit?"),
            Message::assistant("A value a function approaches."),
        ];

        let request = adapter
            .build_request(ModelChoice::Reasoning, &messages, true)
            .unwrap();
        assert_eq!(request.model, "gemini-2.5-pro");
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.stream, Some(true));

        let request = adapter
            .build_request(ModelChoice::Default, &messages, false)
            .unwrap();
        assert_eq!(request.model, "gemini-2.5-flash");
        assert_eq!(request.stream, None);
    }
}

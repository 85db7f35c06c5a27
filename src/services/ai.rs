use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
    CreateChatCompletionRequestArgs, Role,
};
use async_openai::{config::OpenAIConfig, Client};
use serde::Deserialize;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Feedback shorter than this (after trimming) is not worth a model call.
pub const MIN_SUMMARY_CHARS: usize = 20;

const SUMMARY_PROMPT: &str = r#"You are an HR assistant. Summarize the employee feedback you are given.
Keep it to two or three sentences, neutral in tone, and call out the main themes
and any concrete concerns. Do not invent details that are not in the text."#;

const REPORT_PROMPT: &str = r#"You are an expert HR analyst. Generate a personalized employee engagement
and development report. The report should be encouraging and constructive.
Provide:
1. A summary of potential engagement drivers for someone in this role and department.
2. Personalized development suggestions and growth opportunities.
3. Actionable feedback suggestions for their manager to help them thrive.
Structure the output as a concise, professional report."#;

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("text must be at least {MIN_SUMMARY_CHARS} characters")]
    TooShort,
    #[error("AI generation is not configured")]
    Disabled,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("OpenAI error: {0}")]
    Upstream(#[from] OpenAIError),
    #[error("model returned no content")]
    EmptyOutput,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportRequest {
    pub employee_name: String,
    pub employee_role: String,
    pub employee_department: String,
}

impl ReportRequest {
    fn check(&self) -> Result<(), AiError> {
        for (value, field) in [
            (&self.employee_name, "employeeName"),
            (&self.employee_role, "employeeRole"),
            (&self.employee_department, "employeeDepartment"),
        ] {
            if value.trim().is_empty() {
                return Err(AiError::MissingField(field));
            }
        }
        Ok(())
    }
}

/// Thin wrapper around the chat completion API. Single attempt per call.
#[derive(Clone)]
pub struct AiService {
    client: Option<Client<OpenAIConfig>>,
    model: String,
}

impl AiService {
    /// `api_key = None` yields a disabled service whose calls fail with [`AiError::Disabled`].
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        let client = api_key.map(|key| Client::with_config(OpenAIConfig::new().with_api_key(key)));
        Self {
            client,
            model: model.into(),
        }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self::new(None, DEFAULT_MODEL)
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    pub async fn summarize_feedback(&self, text: &str) -> Result<String, AiError> {
        let text = text.trim();
        if text.chars().count() < MIN_SUMMARY_CHARS {
            return Err(AiError::TooShort);
        }
        self.complete(SUMMARY_PROMPT, format!("Feedback:\n{text}"))
            .await
    }

    pub async fn generate_report(&self, request: &ReportRequest) -> Result<String, AiError> {
        request.check()?;
        let details = format!(
            "Employee Details:\n- Name: {}\n- Role: {}\n- Department: {}",
            request.employee_name.trim(),
            request.employee_role.trim(),
            request.employee_department.trim()
        );
        self.complete(REPORT_PROMPT, details).await
    }

    async fn complete(&self, system_prompt: &str, user_content: String) -> Result<String, AiError> {
        let client = self.client.as_ref().ok_or(AiError::Disabled)?;

        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                role: Role::System,
                content: system_prompt.to_string(),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                role: Role::User,
                content: ChatCompletionRequestUserMessageContent::Text(user_content),
                name: None,
            }),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()?;

        let response = client.chat().create(request).await.map_err(|e| {
            tracing::error!("Chat completion failed: {}", e);
            e
        })?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .map(|c| c.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(AiError::EmptyOutput);
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn short_text_is_rejected_before_any_call() {
        let ai = AiService::new(Some("sk-test".into()), DEFAULT_MODEL);
        let err = ai.summarize_feedback("   too short   ").await.unwrap_err();
        assert!(matches!(err, AiError::TooShort));
    }

    #[tokio::test]
    async fn disabled_service_fails_without_key() {
        let ai = AiService::disabled();
        assert!(!ai.is_enabled());
        let err = ai
            .summarize_feedback("The team has been very supportive this quarter.")
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Disabled));
    }

    #[tokio::test]
    async fn report_requires_every_field() {
        let ai = AiService::disabled();
        let err = ai
            .generate_report(&ReportRequest {
                employee_name: "John Doe".into(),
                employee_role: " ".into(),
                employee_department: "Engineering".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::MissingField("employeeRole")));
    }

    #[test]
    fn report_request_reads_camel_case() {
        let req: ReportRequest = serde_json::from_str(
            r#"{"employeeName":"Jane","employeeRole":"Manager","employeeDepartment":"Marketing"}"#,
        )
        .unwrap();
        assert!(req.check().is_ok());

        let partial: ReportRequest = serde_json::from_str(r#"{"employeeName":"Jane"}"#).unwrap();
        assert!(matches!(partial.check(), Err(AiError::MissingField("employeeRole"))));
    }
}

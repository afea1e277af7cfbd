//! Generation collaborator - turns an assembled answer context into prose
//!
//! The engine stops at context assembly; this module is the boundary client
//! that hands the rendered context to a chat-completions endpoint. Treated as
//! a black box by the pipeline: prompt construction lives here, never in the
//! engine.

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are a financial analyst assistant. Your task is to answer \
questions about financial data from SEC 10-K filings.\n\n\
Key guidelines:\n\
1. Base your answers strictly on the provided context\n\
2. When performing calculations, show your work step by step\n\
3. Include specific numbers with units (millions, billions)\n\
4. Cite the relevant company and year for data points\n\
5. If you cannot find specific information, state this clearly\n\
6. For comparative queries, present data in a structured format";

/// Trait for answer generation
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate an answer from the rendered context and the original question
    async fn generate(&self, context: &str, question: &str) -> Result<String>;
}

/// OpenAI-compatible chat completions client
pub struct OpenAiGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl OpenAiGenerator {
    /// Create a generator from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::Configuration {
                message: "llm.api_key is required".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn build_user_prompt(context: &str, question: &str) -> String {
        format!(
            "Please answer the following financial question based on the provided context:\n\n\
            Question: {}\n\n\
            Context:\n{}\n\n\
            Please provide a comprehensive answer based on the available information.",
            question, context
        )
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, context: &str, question: &str) -> Result<String> {
        let user_prompt = Self::build_user_prompt(context, question);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::GenerationError {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::GenerationError {
                message: format!("API error {}: {}", status, body),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| AppError::GenerationError {
            message: format!("Failed to parse response: {}", e),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::GenerationError {
                message: "Empty response".to_string(),
            })
    }
}

/// Mock generator for tests and offline development
pub struct MockGenerator;

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, _context: &str, question: &str) -> Result<String> {
        Ok(format!(
            "Based on the provided filing excerpts, here is an answer to: {}\n\
            [Mock response - LLM API key not configured]",
            question
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_contains_question_and_context() {
        let prompt = OpenAiGenerator::build_user_prompt("CONTEXT BODY", "What was revenue?");
        assert!(prompt.contains("What was revenue?"));
        assert!(prompt.contains("CONTEXT BODY"));
    }

    #[tokio::test]
    async fn test_mock_generator() {
        let answer = MockGenerator
            .generate("ctx", "What was Microsoft's revenue in 2023?")
            .await
            .unwrap();
        assert!(answer.contains("Microsoft"));
    }

    #[test]
    fn test_generator_requires_api_key() {
        let config = LlmConfig::default();
        assert!(OpenAiGenerator::from_config(&config).is_err());
    }
}

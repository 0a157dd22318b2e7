// Copyright (c) 2025 Sean McNamara <smcnam@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::config::Settings;
use crate::constants::{
    AZURE_API_VERSION, AZURE_HOST_MARKER, COMPLETION_TIMEOUT_SECS, MAX_FUNCTION_CALL_ROUNDS,
};
use crate::error::ProviderError;
use crate::prompts::{SCHEMA_SYSTEM_PROMPT, SYSTEM_PROMPT};
use crate::schema::SchemaLookup;
use crate::session::CompletionProvider;

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ms)^[ \t]*```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)\r?\n[ \t]*```[ \t]*$").unwrap()
});

/// Chat completion request/response types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl ChatMessage {
    fn new(role: &str, content: String) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content),
            name: None,
            function_call: None,
        }
    }

    fn function_result(name: String, content: String) -> Self {
        Self {
            name: Some(name),
            ..Self::new("function", content)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    n: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    functions: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Which API shape the endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// api.openai.com or any compatible server (LocalAI, vLLM, ...)
    OpenAi,
    Azure,
}

impl Backend {
    pub fn detect(endpoint: &str) -> Self {
        if endpoint.contains(AZURE_HOST_MARKER) {
            Backend::Azure
        } else {
            Backend::OpenAi
        }
    }
}

/// Chat completion client for OpenAI-compatible and Azure OpenAI endpoints.
pub struct OpenAiClient {
    http: Client,
    backend: Backend,
    endpoint: String,
    api_key: String,
    model: String,
    azure_model_map: BTreeMap<String, String>,
    temperature: f64,
    schema: Option<SchemaLookup>,
}

impl OpenAiClient {
    pub fn new(settings: &Settings, schema: Option<SchemaLookup>) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(COMPLETION_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            backend: Backend::detect(&settings.endpoint),
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.deployment_name.clone(),
            azure_model_map: settings.azure_model_map.clone(),
            temperature: settings.temperature,
            schema,
        })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Azure routes by deployment; unmapped models drop the characters
    /// Azure does not allow in deployment names.
    fn azure_deployment(&self) -> String {
        self.azure_model_map
            .get(&self.model)
            .cloned()
            .unwrap_or_else(|| self.model.replace(['.', ':'], ""))
    }

    fn completions_url(&self) -> String {
        match self.backend {
            Backend::OpenAi => format!("{}/chat/completions", self.endpoint),
            Backend::Azure => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.endpoint,
                self.azure_deployment(),
                AZURE_API_VERSION
            ),
        }
    }

    fn system_prompt(&self) -> &'static str {
        if self.schema.is_some() {
            SCHEMA_SYSTEM_PROMPT
        } else {
            SYSTEM_PROMPT
        }
    }

    fn build_request<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatCompletionRequest<'a> {
        let (functions, function_call) = match self.schema {
            Some(_) => (SchemaLookup::function_definitions(), Some("auto")),
            None => (Vec::new(), None),
        };
        ChatCompletionRequest {
            model: &self.model,
            messages,
            n: 1,
            temperature: self.temperature,
            functions,
            function_call,
        }
    }

    async fn send(&self, messages: &[ChatMessage]) -> Result<ChatMessage, ProviderError> {
        let request = self.build_request(messages);
        let builder = self.http.post(self.completions_url()).json(&request);
        let builder = match self.backend {
            Backend::OpenAi => builder.bearer_auth(&self.api_key),
            Backend::Azure => builder.header("api-key", &self.api_key),
        };

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let mut parsed: ChatCompletionResponse = response.json().await?;
        if parsed.choices.len() != 1 {
            return Err(ProviderError::UnexpectedChoices(parsed.choices.len()));
        }
        Ok(parsed.choices.remove(0).message)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(&self, history: &[String]) -> Result<String, ProviderError> {
        let mut messages = build_messages(self.system_prompt(), history);

        for round in 0..=MAX_FUNCTION_CALL_ROUNDS {
            debug!(round, messages = messages.len(), "sending chat completion");
            let message = self.send(&messages).await?;

            match (message.function_call.clone(), self.schema.as_ref()) {
                // The last round is reserved for an answer.
                (Some(_), Some(_)) if round == MAX_FUNCTION_CALL_ROUNDS => break,
                (Some(call), Some(schema)) => {
                    debug!(function = %call.name, arguments = %call.arguments, "calling function");
                    let result = schema.call(&call.name, &call.arguments).await?;
                    messages.push(message);
                    messages.push(ChatMessage::function_result(call.name, result));
                }
                _ => {
                    let content = message.content.ok_or(ProviderError::EmptyResponse)?;
                    debug!(result = %content, "completion received");
                    return Ok(strip_code_fence(&content));
                }
            }
        }

        Err(ProviderError::TooManyFunctionCalls(MAX_FUNCTION_CALL_ROUNDS))
    }
}

/// The whole history travels as one user message after the system instruction.
pub fn build_messages(system: &str, history: &[String]) -> Vec<ChatMessage> {
    vec![
        ChatMessage::new("system", system.to_string()),
        ChatMessage::new("user", history.join("\n")),
    ]
}

/// Models sometimes wrap YAML in Markdown fences despite being told not to.
/// Text made only of fenced blocks is unwrapped, several blocks becoming one
/// multi-document manifest. Anything else is returned trimmed.
pub fn strip_code_fence(text: &str) -> String {
    let mut bodies = Vec::new();
    let mut end = 0;
    for captures in FENCED_BLOCK.captures_iter(text) {
        let block = captures.get_match();
        if !text[end..block.start()].trim().is_empty() {
            return text.trim().to_string();
        }
        bodies.push(captures.get(1).unwrap().as_str());
        end = block.end();
    }

    if bodies.is_empty() || !text[end..].trim().is_empty() {
        return text.trim().to_string();
    }
    bodies.join("\n---\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterFlags;

    fn settings(endpoint: &str) -> Settings {
        Settings {
            endpoint: endpoint.to_string(),
            deployment_name: "gpt-3.5-turbo-0301".to_string(),
            api_key: "sk-test".to_string(),
            azure_model_map: BTreeMap::new(),
            temperature: 0.0,
            require_confirmation: true,
            raw: false,
            use_k8s_api: false,
            k8s_openapi_url: None,
            debug: false,
            cluster: ClusterFlags::default(),
        }
    }

    #[test]
    fn test_backend_detection() {
        assert_eq!(Backend::detect("https://api.openai.com/v1"), Backend::OpenAi);
        assert_eq!(Backend::detect("http://localhost:8080/v1"), Backend::OpenAi);
        assert_eq!(
            Backend::detect("https://my-resource.openai.azure.com"),
            Backend::Azure
        );
    }

    #[test]
    fn test_openai_url() {
        let client = OpenAiClient::new(&settings("https://api.openai.com/v1/"), None).unwrap();
        assert_eq!(
            client.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_azure_url_uses_model_map() {
        let mut s = settings("https://res.openai.azure.com");
        s.azure_model_map
            .insert("gpt-3.5-turbo-0301".to_string(), "my-deployment".to_string());
        let client = OpenAiClient::new(&s, None).unwrap();
        assert_eq!(client.backend(), Backend::Azure);
        assert_eq!(
            client.completions_url(),
            "https://res.openai.azure.com/openai/deployments/my-deployment/chat/completions?api-version=2023-07-01-preview"
        );
    }

    #[test]
    fn test_azure_deployment_fallback_strips_dots() {
        let client = OpenAiClient::new(&settings("https://res.openai.azure.com"), None).unwrap();
        assert_eq!(client.azure_deployment(), "gpt-35-turbo-0301");
    }

    #[test]
    fn test_build_messages_joins_history() {
        let history = vec!["deploy nginx".to_string(), "use 3 replicas".to_string()];
        let messages = build_messages(SYSTEM_PROMPT, &history);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        assert_eq!(
            messages[1].content.as_deref(),
            Some("deploy nginx\nuse 3 replicas")
        );
    }

    #[test]
    fn test_request_without_schema_omits_functions() {
        let client = OpenAiClient::new(&settings("https://api.openai.com/v1"), None).unwrap();
        let messages = build_messages(SYSTEM_PROMPT, &["p".to_string()]);
        let body = serde_json::to_value(client.build_request(&messages)).unwrap();
        assert_eq!(body["model"], "gpt-3.5-turbo-0301");
        assert_eq!(body["n"], 1);
        assert!(body.get("functions").is_none());
        assert!(body.get("function_call").is_none());
    }

    #[test]
    fn test_response_with_function_call_parses() {
        let raw = r#"{
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "function_call": {"name": "getSchema", "arguments": "{\"resourceType\":\"io.k8s.api.apps.v1.Deployment\"}"}
                },
                "finish_reason": "function_call"
            }]
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        let call = parsed.choices[0].message.function_call.as_ref().unwrap();
        assert_eq!(call.name, "getSchema");
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[test]
    fn test_strip_code_fence() {
        let fenced = "```yaml\napiVersion: v1\nkind: Pod\n```";
        assert_eq!(strip_code_fence(fenced), "apiVersion: v1\nkind: Pod");

        let bare = "```\nkind: Pod\n```\n";
        assert_eq!(strip_code_fence(bare), "kind: Pod");

        let plain = "\napiVersion: v1\nkind: Pod\n";
        assert_eq!(strip_code_fence(plain), "apiVersion: v1\nkind: Pod");
    }

    #[test]
    fn test_strip_code_fence_joins_separate_blocks() {
        let two = "```yaml\nkind: Deployment\n```\n\n```yaml\nkind: Service\n```";
        assert_eq!(strip_code_fence(two), "kind: Deployment\n---\nkind: Service");
    }

    #[test]
    fn test_strip_code_fence_leaves_prose_alone() {
        let prose = "Here you go:\n```yaml\nkind: Pod\n```";
        assert_eq!(strip_code_fence(prose), prose);

        let trailing = "```yaml\nkind: Pod\n```\nApply with kubectl.";
        assert_eq!(strip_code_fence(trailing), trailing);
    }
}

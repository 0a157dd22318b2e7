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

//! Error kinds, one per collaborator boundary.
//!
//! Only [`ContextLookupError`] is ever swallowed; every other kind ends the
//! run and is reported by `main`.

use std::path::PathBuf;
use thiserror::Error;

/// Problems detected while resolving settings, before any command logic runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Please provide an OpenAI key.")]
    MissingApiKey,

    #[error("Failed to read config file: {}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {}", path.display())]
    ParseFile {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid model map entry '{0}', expected model=deployment")]
    InvalidModelMap(String),

    #[error("temperature must be between 0 and 2, got {0}")]
    InvalidTemperature(f64),
}

/// The command line did not carry a prompt.
#[derive(Debug, Error)]
#[error("prompt must be provided")]
pub struct UsageError;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to send completion request")]
    Request(#[from] reqwest::Error),

    #[error("completion API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("expected choices to be 1 but received: {0}")]
    UnexpectedChoices(usize),

    #[error("completion response carried neither content nor a function call")]
    EmptyResponse,

    #[error("model requested unknown function '{0}'")]
    UnknownFunction(String),

    #[error("invalid arguments for function '{name}'")]
    FunctionArguments {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("model requested more than {0} function calls without answering")]
    TooManyFunctionCalls(usize),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Failures while loading or querying the Kubernetes OpenAPI document.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to fetch OpenAPI spec from {url}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to run kubectl to fetch the OpenAPI spec")]
    Spawn(#[source] std::io::Error),

    #[error("kubectl get --raw /openapi/v2 failed: {0}")]
    Kubectl(String),

    #[error("failed to parse OpenAPI spec")]
    Parse(#[source] serde_json::Error),

    #[error("definition {0} not found")]
    UnknownDefinition(String),
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt interrupted")]
    Interrupted,

    #[error("prompt dismissed without a selection")]
    Dismissed,

    #[error("prompt failed")]
    Terminal(#[from] dialoguer::Error),

    #[error("prompt task failed")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("failed to run kubectl")]
    Spawn(#[source] std::io::Error),

    #[error("failed to write manifest to kubectl")]
    Stdin(#[source] std::io::Error),

    #[error("kubectl apply failed ({status}): {stderr}")]
    Kubectl { status: String, stderr: String },
}

/// The active kube context could not be determined. Never fatal.
#[derive(Debug, Error)]
pub enum ContextLookupError {
    #[error("failed to run kubectl")]
    Spawn(#[source] std::io::Error),

    #[error("kubectl config current-context failed: {0}")]
    Kubectl(String),

    #[error("no current context is set")]
    Unset,
}

/// Which suspension point observed the interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Generating,
    Reviewing,
    Applying,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Generating => "generating",
            Stage::Reviewing => "reviewing",
            Stage::Applying => "applying",
        };
        f.write_str(name)
    }
}

/// Everything that can end a session other than success.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error("interrupted while {0}")]
    Interrupted(Stage),

    #[error("failed to write output")]
    Output(#[from] std::io::Error),
}

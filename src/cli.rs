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

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser};
use std::path::PathBuf;

/// Values left as `None` fall through to the config file and then to defaults.
#[derive(Parser, Debug)]
#[command(name = "kubectl-assistant")]
#[command(about = "kubectl-assistant is a plugin for kubectl that allows you to interact with OpenAI GPT API.")]
#[command(version)]
pub struct Cli {
    /// Natural-language description of the resources to create
    #[arg(value_name = "PROMPT")]
    pub prompt: Vec<String>,

    /// Path to a TOML config file with defaults for the options below
    #[arg(long, env = "KUBECTL_ASSISTANT_CONFIG")]
    pub config: Option<PathBuf>,

    /// The endpoint for OpenAI service. Set this to your Local AI endpoint or Azure OpenAI Service, if needed.
    #[arg(long, env = "OPENAI_ENDPOINT")]
    pub openai_endpoint: Option<String>,

    /// The deployment name used for the model in OpenAI service.
    #[arg(long, env = "OPENAI_DEPLOYMENT_NAME")]
    pub openai_deployment_name: Option<String>,

    /// The API key for the OpenAI service. This is required.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// The mapping from OpenAI model to Azure OpenAI deployment. Example format: gpt-3.5-turbo=my-deployment.
    #[arg(long, env = "AZURE_OPENAI_MAP")]
    pub azure_openai_map: Option<String>,

    /// Whether to require confirmation before executing the command. Defaults to true.
    #[arg(
        long,
        env = "REQUIRE_CONFIRMATION",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub require_confirmation: Option<bool>,

    /// The temperature to use for the model. Set closer to 0 if you want output to be more deterministic but less creative. Defaults to 0.0.
    #[arg(long, env = "TEMPERATURE")]
    pub temperature: Option<f64>,

    /// Prints the raw YAML output immediately. Defaults to false.
    #[arg(
        long,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub raw: Option<bool>,

    /// Whether to use the Kubernetes API to create resources with function calling. Defaults to false.
    #[arg(
        long,
        env = "USE_K8S_API",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub use_k8s_api: Option<bool>,

    /// The URL to a Kubernetes OpenAPI spec. Only used if use-k8s-api flag is true.
    #[arg(long, env = "K8S_OPENAPI_URL")]
    pub k8s_openapi_url: Option<String>,

    /// Whether to print debug logs. Defaults to false.
    #[arg(
        long,
        env = "DEBUG",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub debug: Option<bool>,

    #[command(flatten)]
    pub cluster: ClusterArgs,
}

/// Standard cluster-client selection, forwarded to every kubectl call.
#[derive(Args, Debug, Clone, Default)]
pub struct ClusterArgs {
    /// Path to the kubeconfig file to use for CLI requests.
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// The name of the kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// The name of the kubeconfig cluster to use
    #[arg(long)]
    pub cluster: Option<String>,

    /// If present, the namespace scope for this CLI request
    #[arg(short = 'n', long)]
    pub namespace: Option<String>,
}

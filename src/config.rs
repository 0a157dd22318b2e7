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

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::{ClusterArgs, Cli};
use crate::constants::{DEFAULT_DEPLOYMENT_NAME, OPENAI_API_URL_V1};
use crate::error::ConfigError;

/// Configuration file structure
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Completion endpoint (OpenAI, Azure OpenAI or any compatible server)
    pub openai_endpoint: Option<String>,

    /// Model or deployment name
    pub openai_deployment_name: Option<String>,

    pub openai_api_key: Option<String>,

    /// Model name to Azure deployment mapping
    pub azure_openai_map: Option<BTreeMap<String, String>>,

    pub require_confirmation: Option<bool>,

    pub temperature: Option<f64>,

    pub use_k8s_api: Option<bool>,

    pub k8s_openapi_url: Option<String>,

    pub debug: Option<bool>,
}

impl Config {
    /// Load config from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Prefer the command line (which already includes the environment), then the file.
fn merge<T>(cli_value: Option<T>, config_value: Option<T>, default_value: T) -> T {
    cli_value.or(config_value).unwrap_or(default_value)
}

/// Cluster selection forwarded to kubectl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterFlags {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub cluster: Option<String>,
    pub namespace: Option<String>,
}

impl ClusterFlags {
    /// Global kubectl arguments, placed before the subcommand.
    pub fn kubectl_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ref kubeconfig) = self.kubeconfig {
            args.push(format!("--kubeconfig={}", kubeconfig.display()));
        }
        if let Some(ref context) = self.context {
            args.push(format!("--context={}", context));
        }
        if let Some(ref cluster) = self.cluster {
            args.push(format!("--cluster={}", cluster));
        }
        if let Some(ref namespace) = self.namespace {
            args.push(format!("--namespace={}", namespace));
        }
        args
    }
}

impl From<ClusterArgs> for ClusterFlags {
    fn from(args: ClusterArgs) -> Self {
        Self {
            kubeconfig: args.kubeconfig,
            context: args.context,
            cluster: args.cluster,
            namespace: args.namespace,
        }
    }
}

/// Fully resolved, immutable run configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: String,
    pub deployment_name: String,
    pub api_key: String,
    pub azure_model_map: BTreeMap<String, String>,
    pub temperature: f64,
    pub require_confirmation: bool,
    pub raw: bool,
    pub use_k8s_api: bool,
    pub k8s_openapi_url: Option<String>,
    pub debug: bool,
    pub cluster: ClusterFlags,
}

impl Settings {
    /// Layer flags/env over the optional config file over defaults.
    ///
    /// Fails with [`ConfigError::MissingApiKey`] when no credential is found
    /// anywhere.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let config = match cli.config {
            Some(ref path) => Config::load(path)?,
            None => Config::default(),
        };
        Self::from_layers(cli, config)
    }

    fn from_layers(cli: &Cli, config: Config) -> Result<Self, ConfigError> {
        let api_key = merge(cli.openai_api_key.clone(), config.openai_api_key, String::new());
        if api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        let azure_model_map = match cli.azure_openai_map {
            Some(ref raw) => parse_model_map(raw)?,
            None => config.azure_openai_map.unwrap_or_default(),
        };

        let temperature = merge(cli.temperature, config.temperature, 0.0);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidTemperature(temperature));
        }

        Ok(Self {
            endpoint: merge(
                cli.openai_endpoint.clone(),
                config.openai_endpoint,
                OPENAI_API_URL_V1.to_string(),
            ),
            deployment_name: merge(
                cli.openai_deployment_name.clone(),
                config.openai_deployment_name,
                DEFAULT_DEPLOYMENT_NAME.to_string(),
            ),
            api_key,
            azure_model_map,
            temperature,
            require_confirmation: merge(
                cli.require_confirmation,
                config.require_confirmation,
                true,
            ),
            raw: cli.raw.unwrap_or(false),
            use_k8s_api: merge(cli.use_k8s_api, config.use_k8s_api, false),
            k8s_openapi_url: cli
                .k8s_openapi_url
                .clone()
                .or(config.k8s_openapi_url)
                .filter(|url| !url.is_empty()),
            debug: merge(cli.debug, config.debug, false),
            cluster: cli.cluster.clone().into(),
        })
    }

    /// The spinner is noise when output is scripted or interleaved with debug logs.
    pub fn show_progress(&self) -> bool {
        !self.raw && !self.debug
    }

    pub fn log_debug_settings(&self) {
        tracing::debug!(endpoint = %self.endpoint, "openai-endpoint");
        tracing::debug!(deployment = %self.deployment_name, "openai-deployment-name");
        tracing::debug!(map = ?self.azure_model_map, "azure-openai-map");
        tracing::debug!(temperature = self.temperature, "temperature");
        tracing::debug!(enabled = self.use_k8s_api, "use-k8s-api");
        tracing::debug!(url = ?self.k8s_openapi_url, "k8s-openapi-url");
        tracing::debug!(cluster = ?self.cluster, "cluster flags");
    }
}

/// Parse `model=deployment` pairs separated by commas.
pub fn parse_model_map(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((model, deployment)) if !model.trim().is_empty() => {
                Ok((model.trim().to_string(), deployment.trim().to_string()))
            }
            _ => Err(ConfigError::InvalidModelMap(entry.to_string())),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["kubectl-assistant"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let mut parsed = cli(&["deploy"]);
        parsed.openai_api_key = None;
        let err = Settings::from_layers(&parsed, Config::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn test_defaults() {
        let mut parsed = cli(&["deploy"]);
        parsed.openai_api_key = Some("sk-test".to_string());
        parsed.openai_endpoint = None;
        parsed.openai_deployment_name = None;
        parsed.require_confirmation = None;
        parsed.temperature = None;
        parsed.use_k8s_api = None;
        parsed.debug = None;
        parsed.azure_openai_map = None;
        parsed.k8s_openapi_url = None;

        let settings = Settings::from_layers(&parsed, Config::default()).unwrap();
        assert_eq!(settings.endpoint, OPENAI_API_URL_V1);
        assert_eq!(settings.deployment_name, DEFAULT_DEPLOYMENT_NAME);
        assert!(settings.require_confirmation);
        assert!(!settings.raw);
        assert!(!settings.use_k8s_api);
        assert_eq!(settings.temperature, 0.0);
        assert!(settings.azure_model_map.is_empty());
        assert!(settings.show_progress());
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let mut parsed = cli(&["--temperature", "0.5", "deploy"]);
        parsed.openai_api_key = None;
        parsed.azure_openai_map = None;
        let config: Config = toml::from_str(
            r#"
openai_api_key = "from-file"
temperature = 1.0
require_confirmation = false

[azure_openai_map]
"gpt-4" = "prod-gpt4"
"#,
        )
        .unwrap();

        let settings = Settings::from_layers(&parsed, config).unwrap();
        assert_eq!(settings.api_key, "from-file");
        assert_eq!(settings.temperature, 0.5);
        assert_eq!(
            settings.azure_model_map.get("gpt-4").map(String::as_str),
            Some("prod-gpt4")
        );
    }

    #[test]
    fn test_out_of_range_temperature() {
        let mut parsed = cli(&["--temperature", "3", "deploy"]);
        parsed.openai_api_key = Some("sk-test".to_string());
        let err = Settings::from_layers(&parsed, Config::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTemperature(_)));
    }

    #[test]
    fn test_parse_model_map() {
        let map = parse_model_map("gpt-3.5-turbo=my-deployment, gpt-4=big").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["gpt-3.5-turbo"], "my-deployment");
        assert_eq!(map["gpt-4"], "big");

        assert!(parse_model_map("").unwrap().is_empty());
        assert!(matches!(
            parse_model_map("no-separator"),
            Err(ConfigError::InvalidModelMap(_))
        ));
    }

    #[test]
    fn test_raw_and_debug_hide_progress() {
        let mut parsed = cli(&["--raw", "deploy"]);
        parsed.openai_api_key = Some("sk-test".to_string());
        parsed.debug = Some(false);
        let settings = Settings::from_layers(&parsed, Config::default()).unwrap();
        assert!(!settings.show_progress());
    }

    #[test]
    fn test_cluster_flags_render_as_kubectl_args() {
        let flags = ClusterFlags {
            kubeconfig: Some(PathBuf::from("/tmp/kubeconfig")),
            context: Some("kind-dev".to_string()),
            cluster: None,
            namespace: Some("apps".to_string()),
        };
        assert_eq!(
            flags.kubectl_args(),
            vec![
                "--kubeconfig=/tmp/kubeconfig",
                "--context=kind-dev",
                "--namespace=apps"
            ]
        );
    }
}

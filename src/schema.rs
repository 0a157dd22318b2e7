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

//! Kubernetes OpenAPI lookups offered to the model as callable functions.
//!
//! When cluster-API-assisted generation is on, the model may ask for the
//! fully qualified name of a resource (`findSchemaNames`) and then for its
//! schema (`getSchema`) before writing the manifest. The OpenAPI v2 document
//! is fetched once per run, from a URL when configured or from the cluster
//! through kubectl otherwise.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::ClusterFlags;
use crate::constants::KUBECTL;
use crate::error::{ProviderError, SchemaError};
use crate::prompts::{FIND_SCHEMA_NAMES_DESCRIPTION, GET_SCHEMA_DESCRIPTION};

pub const FIND_SCHEMA_NAMES: &str = "findSchemaNames";
pub const GET_SCHEMA: &str = "getSchema";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindSchemaNamesArgs {
    resource_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetSchemaArgs {
    resource_type: String,
}

/// The subset of a Swagger 2.0 document the lookups need.
#[derive(Debug, Default, Deserialize)]
pub struct OpenApiDocument {
    #[serde(default)]
    definitions: BTreeMap<String, Value>,
}

impl OpenApiDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self, SchemaError> {
        serde_json::from_slice(bytes).map_err(SchemaError::Parse)
    }

    /// Definitions whose last dotted segment equals `resource_name`, ignoring case.
    pub fn find_schema_names(&self, resource_name: &str) -> Vec<String> {
        self.definitions
            .keys()
            .filter(|key| {
                key.rsplit('.')
                    .next()
                    .is_some_and(|last| last.eq_ignore_ascii_case(resource_name))
            })
            .cloned()
            .collect()
    }

    pub fn get_schema(&self, resource_type: &str) -> Result<String, SchemaError> {
        self.definitions
            .get(resource_type)
            .map(Value::to_string)
            .ok_or_else(|| SchemaError::UnknownDefinition(resource_type.to_string()))
    }
}

enum SchemaSource {
    Url(String),
    Cluster(ClusterFlags),
}

pub struct SchemaLookup {
    source: SchemaSource,
    http: Client,
    document: OnceCell<OpenApiDocument>,
}

impl SchemaLookup {
    pub fn new(url: Option<String>, cluster: ClusterFlags) -> Self {
        let source = match url {
            Some(url) => SchemaSource::Url(url),
            None => SchemaSource::Cluster(cluster),
        };
        Self {
            source,
            http: Client::new(),
            document: OnceCell::new(),
        }
    }

    #[cfg(test)]
    fn with_document(document: OpenApiDocument) -> Self {
        Self {
            source: SchemaSource::Url(String::new()),
            http: Client::new(),
            document: OnceCell::new_with(Some(document)),
        }
    }

    /// Function declarations sent with every request in schema-assisted mode.
    pub fn function_definitions() -> Vec<Value> {
        vec![
            json!({
                "name": FIND_SCHEMA_NAMES,
                "description": FIND_SCHEMA_NAMES_DESCRIPTION,
                "parameters": {
                    "type": "object",
                    "properties": {
                        "resourceName": {
                            "type": "string",
                            "description": "The name of a Kubernetes resource or field."
                        }
                    },
                    "required": ["resourceName"]
                }
            }),
            json!({
                "name": GET_SCHEMA,
                "description": GET_SCHEMA_DESCRIPTION,
                "parameters": {
                    "type": "object",
                    "properties": {
                        "resourceType": {
                            "type": "string",
                            "description": "The type of the Kubernetes resource or object (e.g. Deployment, Service, etc.)"
                        }
                    },
                    "required": ["resourceType"]
                }
            }),
        ]
    }

    /// Answer a function call from the model with a JSON string.
    pub async fn call(&self, name: &str, arguments: &str) -> Result<String, ProviderError> {
        let parse_error = |source| ProviderError::FunctionArguments {
            name: name.to_string(),
            source,
        };

        match name {
            FIND_SCHEMA_NAMES => {
                let args: FindSchemaNamesArgs =
                    serde_json::from_str(arguments).map_err(parse_error)?;
                let names = self.document().await?.find_schema_names(&args.resource_name);
                Ok(Value::from(names).to_string())
            }
            GET_SCHEMA => {
                let args: GetSchemaArgs = serde_json::from_str(arguments).map_err(parse_error)?;
                Ok(self.document().await?.get_schema(&args.resource_type)?)
            }
            other => Err(ProviderError::UnknownFunction(other.to_string())),
        }
    }

    async fn document(&self) -> Result<&OpenApiDocument, SchemaError> {
        self.document.get_or_try_init(|| self.fetch()).await
    }

    async fn fetch(&self) -> Result<OpenApiDocument, SchemaError> {
        let bytes = match self.source {
            SchemaSource::Url(ref url) => {
                debug!(%url, "fetching OpenAPI spec");
                let fetch_error = |source| SchemaError::Fetch {
                    url: url.clone(),
                    source,
                };
                self.http
                    .get(url)
                    .send()
                    .await
                    .and_then(|response| response.error_for_status())
                    .map_err(fetch_error)?
                    .bytes()
                    .await
                    .map_err(fetch_error)?
                    .to_vec()
            }
            SchemaSource::Cluster(ref flags) => {
                debug!("fetching OpenAPI spec from cluster");
                let output = Command::new(KUBECTL)
                    .args(flags.kubectl_args())
                    .args(["get", "--raw", "/openapi/v2"])
                    .kill_on_drop(true)
                    .output()
                    .await
                    .map_err(SchemaError::Spawn)?;
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                    return Err(SchemaError::Kubectl(stderr));
                }
                output.stdout
            }
        };

        OpenApiDocument::parse(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "swagger": "2.0",
        "definitions": {
            "io.k8s.api.apps.v1.Deployment": {"type": "object", "description": "Deployment enables declarative updates"},
            "io.k8s.api.apps.v1.DeploymentSpec": {"type": "object"},
            "io.k8s.api.core.v1.Container": {"type": "object"},
            "io.k8s.api.extensions.v1beta1.Deployment": {"type": "object"}
        }
    }"#;

    fn document() -> OpenApiDocument {
        OpenApiDocument::parse(DOC.as_bytes()).unwrap()
    }

    #[test]
    fn test_find_schema_names_matches_last_segment() {
        let names = document().find_schema_names("deployment");
        assert_eq!(
            names,
            vec![
                "io.k8s.api.apps.v1.Deployment".to_string(),
                "io.k8s.api.extensions.v1beta1.Deployment".to_string(),
            ]
        );
        assert!(document().find_schema_names("Ingress").is_empty());
    }

    #[test]
    fn test_get_schema() {
        let schema = document().get_schema("io.k8s.api.core.v1.Container").unwrap();
        assert_eq!(schema, r#"{"type":"object"}"#);

        let err = document().get_schema("Container").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownDefinition(_)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            OpenApiDocument::parse(b"not json"),
            Err(SchemaError::Parse(_))
        ));
    }

    #[test]
    fn test_function_definitions_names() {
        let defs = SchemaLookup::function_definitions();
        let names: Vec<&str> = defs.iter().filter_map(|d| d["name"].as_str()).collect();
        assert_eq!(names, vec![FIND_SCHEMA_NAMES, GET_SCHEMA]);
    }

    #[tokio::test]
    async fn test_call_dispatches_functions() {
        let lookup = SchemaLookup::with_document(document());

        let names = lookup
            .call(FIND_SCHEMA_NAMES, r#"{"resourceName":"Container"}"#)
            .await
            .unwrap();
        assert_eq!(names, r#"["io.k8s.api.core.v1.Container"]"#);

        let schema = lookup
            .call(GET_SCHEMA, r#"{"resourceType":"io.k8s.api.apps.v1.DeploymentSpec"}"#)
            .await
            .unwrap();
        assert_eq!(schema, r#"{"type":"object"}"#);
    }

    #[tokio::test]
    async fn test_call_rejects_bad_input() {
        let lookup = SchemaLookup::with_document(document());

        assert!(matches!(
            lookup.call("deleteEverything", "{}").await,
            Err(ProviderError::UnknownFunction(_))
        ));
        assert!(matches!(
            lookup.call(GET_SCHEMA, r#"{"wrong":1}"#).await,
            Err(ProviderError::FunctionArguments { .. })
        ));
    }
}

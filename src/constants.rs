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

pub const OPENAI_API_URL_V1: &str = "https://api.openai.com/v1";

pub const DEFAULT_DEPLOYMENT_NAME: &str = "gpt-3.5-turbo-0301";

pub const AZURE_HOST_MARKER: &str = "openai.azure.com";

pub const AZURE_API_VERSION: &str = "2023-07-01-preview";

pub const KUBECTL: &str = "kubectl";

/// Upper bound on schema lookups the model may chain before answering.
pub const MAX_FUNCTION_CALL_ROUNDS: usize = 10;

pub const COMPLETION_TIMEOUT_SECS: u64 = 300;

pub const APPLY: &str = "Apply";

pub const DONT_APPLY: &str = "Don't Apply";

pub const REPROMPT: &str = "Reprompt";

pub const MANIFEST_PREFIX: &str = "✨ Attempting to apply the following manifest:";

pub const SPINNER_MESSAGE: &str = "Processing...";

pub const SPINNER_CHARSET: &str = "⣾⣽⣻⢿⡿⣟⣯⣷";

pub fn confirmation_label(context: Option<&str>) -> String {
    let label = format!(
        "Would you like to apply this? [{}/{}/{}]",
        REPROMPT, APPLY, DONT_APPLY
    );
    match context {
        Some(name) => format!("(context: {}) {}", name, label),
        None => label,
    }
}

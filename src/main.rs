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

mod cli;
mod config;
mod constants;
mod error;
mod kubectl;
mod llm;
mod progress;
mod prompter;
mod prompts;
mod schema;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::Settings;
use crate::error::UsageError;
use crate::kubectl::Kubectl;
use crate::llm::OpenAiClient;
use crate::prompter::TerminalPrompter;
use crate::schema::SchemaLookup;
use crate::session::{Collaborators, Outcome, SessionOptions, run_session};

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("kubectl_assistant=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(prompt: String, settings: &Settings, cancel: &CancellationToken) -> Result<Outcome> {
    let kubectl = Kubectl::new(settings.cluster.clone());
    let schema = settings
        .use_k8s_api
        .then(|| SchemaLookup::new(settings.k8s_openapi_url.clone(), settings.cluster.clone()));
    let provider = OpenAiClient::new(settings, schema).context("Failed to create OpenAI client")?;
    debug!(backend = ?provider.backend(), "completion backend");
    let prompter = TerminalPrompter;

    let parts = Collaborators {
        provider: &provider,
        prompter: &prompter,
        applier: &kubectl,
        context: &kubectl,
    };

    let mut stdout = std::io::stdout();
    let outcome = run_session(prompt, SessionOptions::from(settings), &parts, cancel, &mut stdout)
        .await?;
    Ok(outcome)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::resolve(&cli)?;
    init_logging(settings.debug);
    settings.log_debug_settings();

    if cli.prompt.is_empty() {
        return Err(UsageError.into());
    }
    let prompt = cli.prompt.join(" ");

    // Ctrl+C cancels whichever step the session is waiting on
    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .context("Error setting Ctrl-C handler")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let result = runtime.block_on(run(prompt, &settings, &cancel));
    // A prompt thread may still be blocked reading the terminal after an interrupt.
    runtime.shutdown_background();

    let outcome = result?;
    debug!(?outcome, "session finished");
    Ok(())
}

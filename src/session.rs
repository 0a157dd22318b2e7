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

//! The generate / review / apply loop.
//!
//! A session starts from the user's prompt, asks the completion provider for
//! a manifest, shows it, and either applies it, discards it, or appends the
//! user's extra guidance to the history and asks again. The provider is
//! stateless, so every request carries the whole history.

use async_trait::async_trait;
use std::future::Future;
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Settings;
use crate::constants::{MANIFEST_PREFIX, confirmation_label};
use crate::error::{
    ApplyError, ContextLookupError, PromptError, ProviderError, SessionError, Stage,
};
use crate::progress::Spinner;

/// What the user chose after reviewing a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Apply,
    DontApply,
    /// Regenerate with this extra guidance appended to the history.
    Reprompt(String),
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, history: &[String]) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait ConfirmationPrompter: Send + Sync {
    async fn decide(&self, label: &str) -> Result<Decision, PromptError>;
}

#[async_trait]
pub trait ManifestApplier: Send + Sync {
    async fn apply(&self, manifest: &str) -> Result<(), ApplyError>;
}

#[async_trait]
pub trait ContextLookup: Send + Sync {
    async fn current_context(&self) -> Result<String, ContextLookupError>;
}

/// The collaborators a session drives, borrowed for its lifetime.
pub struct Collaborators<'a> {
    pub provider: &'a dyn CompletionProvider,
    pub prompter: &'a dyn ConfirmationPrompter,
    pub applier: &'a dyn ManifestApplier,
    pub context: &'a dyn ContextLookup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub raw: bool,
    pub require_confirmation: bool,
    pub show_progress: bool,
}

impl From<&Settings> for SessionOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            raw: settings.raw,
            require_confirmation: settings.require_confirmation,
            show_progress: settings.show_progress(),
        }
    }
}

/// How a session ended successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Raw mode: the first completion was printed and nothing else happened.
    Printed,
    Applied,
    /// The user declined; the manifest was discarded.
    Discarded,
}

struct SessionState {
    history: Vec<String>,
    last_completion: String,
}

impl SessionState {
    fn new(initial_prompt: String) -> Self {
        Self {
            history: vec![initial_prompt],
            last_completion: String::new(),
        }
    }
}

/// Race `operation` against cancellation. A token that is already cancelled
/// wins without the operation being polled.
async fn until_cancelled<T, E, F>(
    cancel: &CancellationToken,
    stage: Stage,
    operation: F,
) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, E>>,
    SessionError: From<E>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SessionError::Interrupted(stage)),
        result = operation => result.map_err(SessionError::from),
    }
}

pub async fn run_session(
    initial_prompt: String,
    options: SessionOptions,
    parts: &Collaborators<'_>,
    cancel: &CancellationToken,
    out: &mut (dyn Write + Send),
) -> Result<Outcome, SessionError> {
    let mut state = SessionState::new(initial_prompt);
    let mut iteration = 1;

    loop {
        // Generating
        debug!(iteration, history = ?state.history, "requesting completion");
        let completion = until_cancelled(cancel, Stage::Generating, async {
            let _spinner = Spinner::start(options.show_progress);
            parts.provider.complete(&state.history).await
        })
        .await?;
        state.last_completion = completion;

        // Reviewing
        if options.raw {
            writeln!(out, "{}", state.last_completion)?;
            out.flush()?;
            return Ok(Outcome::Printed);
        }

        writeln!(out, "{}\n{}", MANIFEST_PREFIX, state.last_completion)?;
        out.flush()?;

        let decision = if options.require_confirmation {
            let label = until_cancelled(cancel, Stage::Reviewing, async {
                Ok::<_, SessionError>(prompt_label(parts.context).await)
            })
            .await?;
            until_cancelled(cancel, Stage::Reviewing, parts.prompter.decide(&label)).await?
        } else {
            Decision::Apply
        };
        debug!(iteration, ?decision, "user decision");

        match decision {
            Decision::Reprompt(text) => {
                state.history.push(text);
                iteration += 1;
            }
            Decision::DontApply => return Ok(Outcome::Discarded),
            Decision::Apply => {
                until_cancelled(
                    cancel,
                    Stage::Applying,
                    parts.applier.apply(&state.last_completion),
                )
                .await?;
                return Ok(Outcome::Applied);
            }
        }
    }
}

/// Build the confirmation label; a failed context lookup only drops the prefix.
async fn prompt_label(context: &dyn ContextLookup) -> String {
    match context.current_context().await {
        Ok(name) => confirmation_label(Some(&name)),
        Err(err) => {
            debug!(error = %err, "current context unavailable");
            confirmation_label(None)
        }
    }
}

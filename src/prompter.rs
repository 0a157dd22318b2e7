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
use dialoguer::console::Term;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use std::io::ErrorKind;

use crate::constants::{APPLY, DONT_APPLY, REPROMPT};
use crate::error::PromptError;
use crate::session::{ConfirmationPrompter, Decision};

const ITEMS: [&str; 3] = [REPROMPT, APPLY, DONT_APPLY];

/// Interactive Reprompt / Apply / Don't Apply menu on the terminal.
pub struct TerminalPrompter;

#[async_trait]
impl ConfirmationPrompter for TerminalPrompter {
    async fn decide(&self, label: &str) -> Result<Decision, PromptError> {
        let label = label.to_string();
        // dialoguer blocks on terminal input; keep it off the runtime threads
        tokio::task::spawn_blocking(move || prompt(&label)).await?
    }
}

fn prompt(label: &str) -> Result<Decision, PromptError> {
    let theme = ColorfulTheme::default();
    let selection = Select::with_theme(&theme)
        .with_prompt(label)
        .items(&ITEMS)
        .default(0)
        .interact_opt()
        .map_err(classify)?;

    match selection.map(|index| ITEMS[index]) {
        Some(APPLY) => Ok(Decision::Apply),
        Some(DONT_APPLY) => Ok(Decision::DontApply),
        Some(_) => read_guidance(&theme),
        None => Err(PromptError::Dismissed),
    }
}

fn read_guidance(theme: &ColorfulTheme) -> Result<Decision, PromptError> {
    let text: String = Input::with_theme(theme)
        .with_prompt(REPROMPT)
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("please describe what to change")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .map_err(classify)?;

    Ok(Decision::Reprompt(text.trim().to_string()))
}

fn classify(err: dialoguer::Error) -> PromptError {
    match err {
        dialoguer::Error::IO(ref io) if io.kind() == ErrorKind::Interrupted => {
            // dialoguer hides the cursor while a menu is open
            let _ = Term::stderr().show_cursor();
            PromptError::Interrupted
        }
        other => PromptError::Terminal(other),
    }
}

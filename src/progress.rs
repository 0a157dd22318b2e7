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

//! Progress spinner shown while waiting on the completion provider.
//!
//! The spinner is a guard: it starts when acquired and is cleared when the
//! guard is dropped, so every exit path out of the wait (success, provider
//! error, interrupt) removes it before the manifest or an error is printed.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::constants::{SPINNER_CHARSET, SPINNER_MESSAGE};

/// Guard that keeps the spinner ticking while held.
///
/// # Example
///
/// ```no_run
/// let _spinner = Spinner::start(true);
/// // wait for the completion...
/// // spinner cleared when _spinner is dropped
/// ```
pub struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    /// Start a spinner, or a no-op guard when `enabled` is false.
    pub fn start(enabled: bool) -> Self {
        if !enabled {
            return Self { bar: None };
        }

        let bar = ProgressBar::new_spinner();
        let tick_chars: String = SPINNER_CHARSET.chars().chain(std::iter::once(' ')).collect();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            bar.set_style(style.tick_chars(&tick_chars));
        }
        bar.set_message(SPINNER_MESSAGE);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar: Some(bar) }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_spinner_is_inert() {
        let spinner = Spinner::start(false);
        assert!(spinner.bar.is_none());
    }

    #[test]
    fn test_spinner_drop() {
        // Drawing goes to a hidden target when stderr is not a terminal
        let spinner = Spinner::start(true);
        assert!(spinner.bar.is_some());
        drop(spinner);
        let _again = Spinner::start(true);
    }
}

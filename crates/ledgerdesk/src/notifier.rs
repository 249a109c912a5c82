//! Terminal rendering of data-layer toasts.
//!
//! Success toasts go to stderr so piped output stays clean. Failures are
//! reported once, by the command's exit diagnostic, so error toasts only
//! reach the log.

use std::io::{self, Write};

use owo_colors::OwoColorize;

use ledgerdesk_core::{Notifier, Toast, ToastLevel};

use crate::cli::GlobalOpts;
use crate::output::should_color;

#[derive(Debug, Clone, Copy)]
pub struct ConsoleNotifier {
    quiet: bool,
    color: bool,
}

impl ConsoleNotifier {
    pub fn new(global: &GlobalOpts) -> Self {
        Self {
            quiet: global.quiet,
            color: should_color(global.color),
        }
    }

    fn line(self, toast: &Toast) -> String {
        if self.color {
            format!("{} {}", "✓".green().bold(), toast.message)
        } else {
            format!("✓ {}", toast.message)
        }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, toast: Toast) {
        match toast.level {
            ToastLevel::Success if !self.quiet => {
                let _ = writeln!(io::stderr().lock(), "{}", self.line(&toast));
            }
            ToastLevel::Success => {}
            ToastLevel::Error => tracing::debug!(toast = %toast.message, "request failed"),
        }
    }
}

//! Yes/no confirmation on the controlling terminal.
//!
//! Without an interactive terminal nothing can be read and the answer is "no".

use branchbox_core::workspace::Confirm;
use console::{style, Term};
use tracing::debug;

/// Asks on stderr and reads the answer from the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        let term = Term::stderr();
        if term.write_str(&style(prompt).bold().to_string()).is_err() {
            return false;
        }

        match term.read_line() {
            Ok(answer) => is_yes(&answer),
            Err(e) => {
                debug!("Could not read confirmation: {}", e);
                false
            }
        }
    }
}

/// `y` or `yes` in any case; everything else, including an empty answer, is no
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

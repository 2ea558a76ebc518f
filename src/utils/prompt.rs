use std::io::{self, BufRead, Write};

/// Interactive yes/no decisions (destructive disk overwrite, reusing an
/// existing config path). Injected so automated runs and tests can answer
/// without a terminal.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Reads the answer from stdin; `y` and `yes` (any case) mean go ahead.
#[derive(Debug, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{} [y/N]: ", prompt);
        let _ = io::stdout().flush();

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

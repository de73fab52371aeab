//! Operator confirmation prompt.
//!
//! Kept behind a trait so the run state machine is testable without an
//! interactive terminal. The run treats exactly the literal answer `"y"`
//! as approval; anything else aborts.

use std::io::{self, Write};

/// Asks the operator a question and returns the trimmed, lower-cased answer.
pub trait Confirm: Send + Sync {
    fn ask(&self, question: &str) -> io::Result<String>;
}

/// Reads the answer from stdin.
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn ask(&self, question: &str) -> io::Result<String> {
        eprint!("{question}");
        io::stderr().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        Ok(input.trim().to_lowercase())
    }
}

/// Approves everything. Backs the `--yes` flag.
pub struct AutoApprove;

impl Confirm for AutoApprove {
    fn ask(&self, _question: &str) -> io::Result<String> {
        Ok("y".to_string())
    }
}

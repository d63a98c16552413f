//! User-facing prompts and messages.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result};
use dialoguer::Input;
use dialoguer::theme::SimpleTheme;

/// Interactive surface of the workflow.
pub trait Console {
    /// Print one line for the user.
    fn say(&self, line: &str);
    /// Ask a question and return the raw answer line.
    fn ask(&self, question: &str) -> Result<String>;
    /// Show `message` and wait until the user acknowledges it.
    fn acknowledge(&self, message: &str) -> Result<()>;
}

/// Console on stdin/stdout.
///
/// Uses dialoguer prompts on a terminal and plain line reads otherwise, so
/// answers can be piped in (`echo y | devflow deploy`).
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConsole;

impl Console for TerminalConsole {
    fn say(&self, line: &str) {
        println!("{line}");
    }

    fn ask(&self, question: &str) -> Result<String> {
        if io::stdin().is_terminal() {
            return Input::<String>::with_theme(&SimpleTheme)
                .with_prompt(question)
                .allow_empty(true)
                .interact_text()
                .context("read answer");
        }
        print!("{question}: ");
        io::stdout().flush().context("flush prompt")?;
        read_answer(&mut io::stdin().lock())
    }

    fn acknowledge(&self, message: &str) -> Result<()> {
        self.ask(message).map(|_| ())
    }
}

/// Read one answer line. End of input counts as an empty answer.
fn read_answer(reader: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    reader.read_line(&mut line).context("read answer")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_single_line_without_newline() {
        let mut input = io::Cursor::new(b"y\r\nsecond\n".to_vec());
        assert_eq!(read_answer(&mut input).expect("read"), "y");
        assert_eq!(read_answer(&mut input).expect("read"), "second");
    }

    #[test]
    fn eof_is_empty_answer() {
        let mut input = io::Cursor::new(Vec::new());
        assert_eq!(read_answer(&mut input).expect("read"), "");
    }
}

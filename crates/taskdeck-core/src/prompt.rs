use std::io::{BufRead, Write};

use tracing::{debug, warn};

pub const DELETE_MESSAGE: &str = "Are you sure you want to delete this task?";
pub const CLEAR_COMPLETED_MESSAGE: &str = "Are you sure you want to clear all completed tasks?";
pub const CLEAR_ALL_MESSAGE: &str =
    "Are you sure you want to clear all tasks? This cannot be undone.";
pub const EDIT_LABEL: &str = "Edit task:";

/// Yes/no gate asked before destructive operations.
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> bool;
}

/// Supplies replacement text for an edit. `None` means the user cancelled.
pub trait TextPrompt {
    fn prompt_text(&mut self, label: &str, default: &str) -> Option<String>;
}

impl<T: Confirm + ?Sized> Confirm for Box<T> {
    fn confirm(&mut self, message: &str) -> bool {
        (**self).confirm(message)
    }
}

impl<T: TextPrompt + ?Sized> TextPrompt for Box<T> {
    fn prompt_text(&mut self, label: &str, default: &str) -> Option<String> {
        (**self).prompt_text(label, default)
    }
}

/// Adapts a closure into a [`Confirm`].
pub struct ConfirmWith<F>(pub F);

impl<F: FnMut(&str) -> bool> Confirm for ConfirmWith<F> {
    fn confirm(&mut self, message: &str) -> bool {
        (self.0)(message)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AlwaysConfirm(pub bool);

impl Confirm for AlwaysConfirm {
    fn confirm(&mut self, message: &str) -> bool {
        debug!(message, answer = self.0, "auto-answered confirmation");
        self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixedText(pub Option<String>);

impl TextPrompt for FixedText {
    fn prompt_text(&mut self, _label: &str, _default: &str) -> Option<String> {
        self.0.clone()
    }
}

/// Line-oriented prompt over any reader/writer pair, usually stdin/stderr.
#[derive(Debug)]
pub struct Terminal<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Terminal<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, question: &str) -> Option<String> {
        if let Err(err) = write!(self.output, "{question}").and_then(|()| self.output.flush()) {
            warn!(error = %err, "failed to write prompt");
            return None;
        }

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(err) => {
                warn!(error = %err, "failed to read prompt answer");
                None
            }
        }
    }
}

impl<R: BufRead, W: Write> Confirm for Terminal<R, W> {
    fn confirm(&mut self, message: &str) -> bool {
        let answer = self.ask(&format!("{message} [y/N] "));
        matches!(
            answer.as_deref().map(|a| a.trim().to_ascii_lowercase()).as_deref(),
            Some("y" | "yes")
        )
    }
}

impl<R: BufRead, W: Write> TextPrompt for Terminal<R, W> {
    /// An empty answer keeps `default`; end of input cancels.
    fn prompt_text(&mut self, label: &str, default: &str) -> Option<String> {
        let answer = self.ask(&format!("{label} [{default}] "))?;
        if answer.trim().is_empty() {
            Some(default.to_string())
        } else {
            Some(answer)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{Confirm, ConfirmWith, Terminal, TextPrompt};

    #[test]
    fn terminal_confirm_needs_explicit_yes() {
        let mut out = Vec::<u8>::new();
        let mut yes = Terminal::new(Cursor::new("Y\n"), &mut out);
        assert!(yes.confirm("Delete?"));

        let mut out = Vec::<u8>::new();
        let mut no = Terminal::new(Cursor::new("\n"), &mut out);
        assert!(!no.confirm("Delete?"));

        let mut out = Vec::<u8>::new();
        let mut eof = Terminal::new(Cursor::new(""), &mut out);
        assert!(!eof.confirm("Delete?"));
    }

    #[test]
    fn terminal_prompt_shows_question_and_default() {
        let mut out = Vec::<u8>::new();
        {
            let mut term = Terminal::new(Cursor::new("new text\n"), &mut out);
            assert_eq!(term.prompt_text("Edit task:", "old").as_deref(), Some("new text"));
        }
        assert_eq!(String::from_utf8(out).expect("utf8"), "Edit task: [old] ");
    }

    #[test]
    fn terminal_prompt_blank_keeps_default_and_eof_cancels() {
        let mut out = Vec::<u8>::new();
        let mut blank = Terminal::new(Cursor::new("\n"), &mut out);
        assert_eq!(blank.prompt_text("Edit task:", "old").as_deref(), Some("old"));

        let mut out = Vec::<u8>::new();
        let mut eof = Terminal::new(Cursor::new(""), &mut out);
        assert_eq!(eof.prompt_text("Edit task:", "old"), None);
    }

    #[test]
    fn closures_confirm() {
        let mut asked = Vec::new();
        let mut gate = ConfirmWith(|msg: &str| {
            asked.push(msg.to_string());
            false
        });
        assert!(!gate.confirm("sure?"));
        assert_eq!(asked, vec!["sure?".to_string()]);
    }
}

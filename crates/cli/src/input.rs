//! Multi-line input buffering for interactive mode.
//!
//! Lines accumulate until an empty line submits them. `exit` on its own
//! line (with nothing buffered) quits.

#[derive(Debug, PartialEq, Eq)]
pub enum InputAction {
    /// Keep reading
    Continue,
    /// Send the buffered text
    Submit(String),
    Exit,
}

#[derive(Debug, Default)]
pub struct InputBuffer {
    lines: Vec<String>,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: &str) -> InputAction {
        let line = line.trim_end_matches(['\r', '\n']);
        if self.lines.is_empty() && line.trim() == "exit" {
            return InputAction::Exit;
        }
        if line.trim().is_empty() {
            if self.lines.is_empty() {
                return InputAction::Continue;
            }
            let text = self.lines.join("\n");
            self.lines.clear();
            return InputAction::Submit(text);
        }
        self.lines.push(line.to_string());
        InputAction::Continue
    }

    /// Whatever is buffered when input ends.
    pub fn finish(self) -> Option<String> {
        if self.lines.is_empty() {
            None
        } else {
            Some(self.lines.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_line_submits_buffer() {
        let mut input = InputBuffer::new();
        assert_eq!(input.push("first line"), InputAction::Continue);
        assert_eq!(input.push("second line\n"), InputAction::Continue);
        assert_eq!(
            input.push(""),
            InputAction::Submit("first line\nsecond line".into())
        );
        assert!(input.finish().is_none());
    }

    #[test]
    fn leading_blank_lines_are_ignored() {
        let mut input = InputBuffer::new();
        assert_eq!(input.push("   "), InputAction::Continue);
        assert!(input.finish().is_none());
    }

    #[test]
    fn exit_only_when_nothing_buffered() {
        let mut input = InputBuffer::new();
        assert_eq!(input.push("exit"), InputAction::Exit);

        let mut input = InputBuffer::new();
        input.push("please do not");
        assert_eq!(input.push("exit"), InputAction::Continue);
        assert_eq!(input.finish().as_deref(), Some("please do not\nexit"));
    }
}

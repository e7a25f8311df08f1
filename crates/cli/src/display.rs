//! Terminal rendering of the root Runner's event stream.
//!
//! Streamed content goes to stdout. The thinking indicator, handoff and
//! delegation markers, and tool activity go to stderr.

use std::io::Write;

use handoff_agent::{HandoffDirection, RunnerEvent};

const THINKING: &str = "  thinking...";

pub struct Display<O: Write, E: Write> {
    out: O,
    err: E,
    verbose: bool,
    thinking: bool,
}

impl Display<std::io::Stdout, std::io::Stderr> {
    pub fn terminal(verbose: bool) -> Self {
        Self::new(std::io::stdout(), std::io::stderr(), verbose)
    }
}

impl<O: Write, E: Write> Display<O, E> {
    pub fn new(out: O, err: E, verbose: bool) -> Self {
        Self {
            out,
            err,
            verbose,
            thinking: false,
        }
    }

    pub fn is_thinking(&self) -> bool {
        self.thinking
    }

    pub fn start_thinking(&mut self) {
        if !self.thinking {
            let _ = write!(self.err, "{THINKING}");
            let _ = self.err.flush();
            self.thinking = true;
        }
    }

    /// Erase the indicator. Does nothing if it is not shown.
    pub fn stop_thinking(&mut self) {
        if self.thinking {
            let blank = " ".repeat(THINKING.len());
            let _ = write!(self.err, "\r{blank}\r");
            let _ = self.err.flush();
            self.thinking = false;
        }
    }

    pub fn render(&mut self, event: &RunnerEvent) {
        match event {
            RunnerEvent::Content(text) => {
                let _ = write!(self.out, "{text}");
                let _ = self.out.flush();
            }
            RunnerEvent::Delegating { tool_name, task } => {
                let summary = task.lines().next().unwrap_or_default();
                let _ = writeln!(self.err, "\n  ↳ {tool_name}: {summary}");
            }
            RunnerEvent::Handoff { direction, runner } => {
                let arrow = match direction {
                    HandoffDirection::ToChild => "→",
                    HandoffDirection::ToParent => "←",
                };
                let _ = writeln!(self.err, "  [{arrow} {} (depth {})]", runner.role(), runner.depth());
            }
            RunnerEvent::ToolCallStarted { name, .. } if self.verbose => {
                let _ = writeln!(self.err, "  · {name}");
            }
            RunnerEvent::ToolCallFinished { name, success: false, output, .. } if self.verbose => {
                let _ = writeln!(self.err, "  ✗ {name}: {output}");
            }
            _ => {}
        }
    }

    pub fn error(&mut self, message: impl std::fmt::Display) {
        self.stop_thinking();
        let _ = writeln!(self.err, "  [Error] {message}");
    }

    #[cfg(test)]
    fn into_parts(self) -> (O, E) {
        (self.out, self.err)
    }
}

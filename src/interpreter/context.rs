use std::io::{self, Write};

use super::SystemContext;

/// Writes each line through a locked stdout handle. Program output and
/// diagnostics share this sink, so they interleave in execution order.
pub struct StdioContext;

impl SystemContext for StdioContext {
    fn writeln(&mut self, text: &str) {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{text}").expect("Lost access to stdout.");
    }
}

/// Captures the run's transcript in memory, one entry per `writeln`.
#[derive(Default)]
pub struct BufferedContext {
    lines: Vec<String>,
}

impl BufferedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The transcript as it would have appeared on stdout.
    pub fn into_data(self) -> String {
        self.lines
            .into_iter()
            .map(|line| line + "\n")
            .collect()
    }
}

impl SystemContext for BufferedContext {
    fn writeln(&mut self, text: &str) {
        self.lines.push(text.to_owned());
    }
}

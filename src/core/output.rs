/// Output events produced by operations
///
/// Workers never touch UI state. They push `OutputEvent`s through an
/// `OutputSink`; the TUI loop or the console printer owns the display.

use colored::Colorize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// Raw line from an external process
    Line(String),
    /// Progress message
    Info(String),
    /// Command about to run
    Command(String),
    Warning(String),
    Success(String),
    Error(String),
}

impl OutputEvent {
    pub fn text(&self) -> &str {
        match self {
            OutputEvent::Line(s)
            | OutputEvent::Info(s)
            | OutputEvent::Command(s)
            | OutputEvent::Warning(s)
            | OutputEvent::Success(s)
            | OutputEvent::Error(s) => s,
        }
    }
}

/// Operation-tagged sender half
#[derive(Debug, Clone)]
pub struct OutputSink {
    op: u64,
    tx: UnboundedSender<(u64, OutputEvent)>,
}

impl OutputSink {
    pub fn new(op: u64, tx: UnboundedSender<(u64, OutputEvent)>) -> Self {
        Self { op, tx }
    }

    /// Sink whose events are discarded
    pub fn discard() -> Self {
        let (tx, _rx) = unbounded_channel();
        Self { op: 0, tx }
    }

    pub fn op(&self) -> u64 {
        self.op
    }

    pub fn emit(&self, event: OutputEvent) {
        // Receiver gone means the UI moved on; nothing to report to
        let _ = self.tx.send((self.op, event));
    }

    pub fn line(&self, s: impl Into<String>) {
        self.emit(OutputEvent::Line(s.into()));
    }

    pub fn info(&self, s: impl Into<String>) {
        self.emit(OutputEvent::Info(s.into()));
    }

    pub fn command(&self, s: impl Into<String>) {
        self.emit(OutputEvent::Command(s.into()));
    }

    pub fn warn(&self, s: impl Into<String>) {
        self.emit(OutputEvent::Warning(s.into()));
    }

    pub fn success(&self, s: impl Into<String>) {
        self.emit(OutputEvent::Success(s.into()));
    }

    pub fn error(&self, s: impl Into<String>) {
        self.emit(OutputEvent::Error(s.into()));
    }
}

/// Render an event for a plain terminal
pub fn render_console(event: &OutputEvent) -> String {
    match event {
        OutputEvent::Line(s) => s.clone(),
        OutputEvent::Info(s) => format!("{} {}", "•".cyan(), s),
        OutputEvent::Command(s) => format!("{} {}", "$".dimmed(), s.dimmed()),
        OutputEvent::Warning(s) => format!("{} {}", "⚠".yellow(), s.yellow()),
        OutputEvent::Success(s) => format!("{} {}", "✓".green(), s.green()),
        OutputEvent::Error(s) => format!("{} {}", "✗".red(), s.red()),
    }
}

/// Sink printing to stdout for one-shot CLI commands.
///
/// Drop the sink, then await the handle to flush remaining lines.
pub fn console_sink() -> (OutputSink, JoinHandle<()>) {
    let (tx, rx) = unbounded_channel();
    let printer = tokio::spawn(print_events(rx));
    (OutputSink::new(0, tx), printer)
}

async fn print_events(mut rx: UnboundedReceiver<(u64, OutputEvent)>) {
    while let Some((_, event)) = rx.recv().await {
        match event {
            OutputEvent::Error(_) => eprintln!("{}", render_console(&event)),
            _ => println!("{}", render_console(&event)),
        }
    }
}

/// Collects events in tests
#[cfg(test)]
pub fn collecting_sink() -> (OutputSink, UnboundedReceiver<(u64, OutputEvent)>) {
    let (tx, rx) = unbounded_channel();
    (OutputSink::new(7, tx), rx)
}

#[cfg(test)]
pub fn drain(rx: &mut UnboundedReceiver<(u64, OutputEvent)>) -> Vec<OutputEvent> {
    let mut events = Vec::new();
    while let Ok((_, event)) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_tags_events_with_operation() {
        let (sink, mut rx) = collecting_sink();
        sink.info("hello");
        sink.line("raw");

        let (op, event) = rx.try_recv().unwrap();
        assert_eq!(op, 7);
        assert_eq!(event, OutputEvent::Info("hello".to_string()));
        assert_eq!(drain(&mut rx), vec![OutputEvent::Line("raw".to_string())]);
    }

    #[test]
    fn test_closed_receiver_is_ignored() {
        let (sink, rx) = collecting_sink();
        drop(rx);
        sink.error("nobody listening");
    }

    #[test]
    fn test_render_console_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(render_console(&OutputEvent::Line("x".into())), "x");
        assert!(render_console(&OutputEvent::Error("boom".into())).contains("boom"));
    }
}

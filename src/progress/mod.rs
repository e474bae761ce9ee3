//! Streamed review events and their terminal rendering.
//!
//! The pipeline never prints. It pushes [`ReviewEvent`]s into an
//! [`EventSink`]; the binary drains the receiving end with a
//! [`TerminalReporter`], tests collect them into a `Vec`.

use std::io::{self, Write};

use colored::Colorize;
use tokio::sync::mpsc;

use crate::error::ReviewError;
use crate::models::InvocationOutcome;

/// One item of review output, in emission order.
#[derive(Debug)]
pub enum ReviewEvent {
    /// Informational progress line.
    Progress(String),
    /// Degraded input or other non-fatal problem.
    Warning(String),
    /// Terminal: the review succeeded.
    Done(InvocationOutcome),
    /// Terminal: the review failed.
    Failed(ReviewError),
}

impl ReviewEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReviewEvent::Done(_) | ReviewEvent::Failed(_))
    }
}

/// Sending half of a review event stream.
///
/// Sends never fail from the caller's view: a dropped receiver just means
/// nobody is listening any more.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<ReviewEvent>>,
}

impl EventSink {
    /// A connected sink and its receiver.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ReviewEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything.
    pub fn silent() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, event: ReviewEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn progress(&self, message: impl Into<String>) {
        self.send(ReviewEvent::Progress(message.into()));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.send(ReviewEvent::Warning(message.into()));
    }
}

/// Renders events for an interactive terminal.
///
/// Progress goes to stderr dimmed, warnings yellow, the final response to
/// stdout so it can be piped.
#[derive(Debug, Clone, Copy)]
pub struct TerminalReporter {
    debug: bool,
}

impl TerminalReporter {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    /// Drain `rx` until the terminal event and return the outcome.
    pub async fn drain(
        &self,
        mut rx: mpsc::UnboundedReceiver<ReviewEvent>,
    ) -> Option<Result<InvocationOutcome, ReviewError>> {
        while let Some(event) = rx.recv().await {
            match event {
                ReviewEvent::Done(outcome) => {
                    eprintln!();
                    let stdout = io::stdout();
                    let mut handle = stdout.lock();
                    let _ = writeln!(handle, "{}", outcome.response_text);
                    if self.debug {
                        eprintln!(
                            "{}",
                            format!(
                                "Answered by {} ({}), tokens in/out: {}/{}",
                                outcome.provider,
                                outcome.model,
                                display_count(outcome.prompt_tokens),
                                display_count(outcome.completion_tokens),
                            )
                            .dimmed()
                        );
                    }
                    return Some(Ok(outcome));
                }
                ReviewEvent::Failed(err) => return Some(Err(err)),
                other => self.render(&other),
            }
        }
        None
    }

    fn render(&self, event: &ReviewEvent) {
        let stderr = io::stderr();
        let mut handle = stderr.lock();
        match event {
            ReviewEvent::Progress(line) => {
                let _ = writeln!(handle, "{}", line.dimmed());
            }
            ReviewEvent::Warning(line) => {
                let _ = writeln!(handle, "{}", line.yellow());
            }
            ReviewEvent::Done(_) | ReviewEvent::Failed(_) => {}
        }
    }
}

fn display_count(count: Option<u64>) -> String {
    count.map_or_else(|| "?".to_string(), |c| c.to_string())
}

/// Collect everything currently buffered in `rx`.
///
/// Meant for tests and for callers that ran the pipeline to completion
/// before looking at the events.
pub fn drain_ready(rx: &mut mpsc::UnboundedReceiver<ReviewEvent>) -> Vec<ReviewEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderId;

    #[test]
    fn channel_preserves_order() {
        let (sink, mut rx) = EventSink::channel();
        sink.progress("one");
        sink.warning("two");
        sink.progress("three");
        let lines: Vec<_> = drain_ready(&mut rx)
            .into_iter()
            .map(|e| match e {
                ReviewEvent::Progress(s) => format!("p:{s}"),
                ReviewEvent::Warning(s) => format!("w:{s}"),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(lines, ["p:one", "w:two", "p:three"]);
    }

    #[test]
    fn silent_sink_and_dropped_receiver_do_not_panic() {
        EventSink::silent().progress("nobody");
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.warning("gone");
    }

    #[tokio::test]
    async fn reporter_returns_terminal_outcome() {
        let (sink, rx) = EventSink::channel();
        sink.progress("Packing repository...");
        sink.send(ReviewEvent::Done(InvocationOutcome {
            provider: ProviderId::Gemini,
            model: "m".into(),
            response_text: "looks good".into(),
            prompt_tokens: None,
            completion_tokens: None,
        }));
        drop(sink);
        let outcome = TerminalReporter::new(false).drain(rx).await;
        assert!(matches!(outcome, Some(Ok(o)) if o.response_text == "looks good"));
    }

    #[tokio::test]
    async fn reporter_without_terminal_event_returns_none() {
        let (sink, rx) = EventSink::channel();
        sink.progress("x");
        drop(sink);
        assert!(TerminalReporter::new(false).drain(rx).await.is_none());
    }

    #[test]
    fn terminal_events() {
        assert!(!ReviewEvent::Progress("x".into()).is_terminal());
        assert!(
            ReviewEvent::Failed(ReviewError::NoModel {
                provider: ProviderId::XAI
            })
            .is_terminal()
        );
    }
}

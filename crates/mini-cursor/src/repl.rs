use std::io::{self, Write};
use std::pin::{Pin, pin};

use mini_cursor_core::Error;
use mini_cursor_model::{ErrorKind, ToolCallRequest, ToolCallResult};
use owo_colors::OwoColorize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::select;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::session::{Session, SessionBuilder};

/// The prompt printed before reading each request.
pub const PROMPT: &str = "Ask me anything --> ";

const BAR_CHAR: &str = "▎";

type Interrupt = Pin<Box<dyn Future<Output = io::Result<()>> + Send>>;
type InterruptFn = Box<dyn FnMut() -> Interrupt + Send>;

enum ToolEvent {
    Call(ToolCallRequest),
    Result(ToolCallResult),
}

/// The interactive shell: reads one request per line and prints the answer.
///
/// The shell ends on end of input, on a line that is exactly `exit`, or
/// on Ctrl-C at the prompt. Pressing Ctrl-C while a request is running
/// cancels that request only.
pub struct Repl<R, W> {
    session: Session,
    tool_events: mpsc::UnboundedReceiver<ToolEvent>,
    input: R,
    output: W,
    interrupts: InterruptFn,
    listen_for_interrupt: bool,
}

impl<R, W> Repl<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    /// Builds the session and wires its tool activity to `output`.
    pub fn new(builder: SessionBuilder, input: R, output: W) -> Self {
        let (event_tx, tool_events) = mpsc::unbounded_channel();
        let session = builder
            .on_tool_call({
                let event_tx = event_tx.clone();
                move |req| {
                    event_tx.send(ToolEvent::Call(req.clone())).ok();
                }
            })
            .on_tool_result(move |result| {
                event_tx.send(ToolEvent::Result(result.clone())).ok();
            })
            .build();
        Self {
            session,
            tool_events,
            input,
            output,
            interrupts: Box::new(|| Box::pin(signal::ctrl_c())),
            listen_for_interrupt: true,
        }
    }

    /// Replaces Ctrl-C as the source of interrupts.
    ///
    /// `interrupts` is called once for every prompt and once for every
    /// request; the returned future resolves when the user interrupts.
    pub fn with_interrupts<F, Fut>(mut self, mut interrupts: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = io::Result<()>> + Send + 'static,
    {
        self.interrupts = Box::new(move || Box::pin(interrupts()));
        self
    }

    /// Returns the session behind the shell.
    #[inline]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs until the user leaves.
    pub async fn run(&mut self) -> io::Result<()> {
        loop {
            write!(self.output, "{PROMPT}")?;
            self.output.flush()?;

            let mut line = String::new();
            let read = select! {
                read = self.input.read_line(&mut line) => read?,
                interrupted = (self.interrupts)(), if self.listen_for_interrupt => {
                    match interrupted {
                        Ok(()) => info!("interrupted at the prompt"),
                        Err(err) => {
                            warn!("cannot listen for Ctrl-C: {err}");
                            self.listen_for_interrupt = false;
                            continue;
                        }
                    }
                    0
                }
            };
            if read == 0 {
                writeln!(self.output)?;
                break;
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line == "exit" {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            self.handle_message(line.trim()).await?;
        }
        debug!("leaving the shell");
        Ok(())
    }

    async fn handle_message(&mut self, message: &str) -> io::Result<()> {
        let Self {
            session,
            tool_events,
            output,
            interrupts,
            listen_for_interrupt,
            ..
        } = self;

        let cancel = CancellationToken::new();
        let mut interrupt = interrupts();
        let mut awaiting_interrupt = *listen_for_interrupt;
        let progress = Progress::start();

        let mut send = pin!(session.send_message(message, &cancel));
        let result = loop {
            select! {
                result = &mut send => break result,
                Some(event) = tool_events.recv() => {
                    progress.suspend(|| print_tool_event(output, &event))?;
                }
                interrupted = &mut interrupt, if awaiting_interrupt => {
                    awaiting_interrupt = false;
                    match interrupted {
                        Ok(()) => {
                            info!("interrupted, cancelling the request");
                            cancel.cancel();
                        }
                        Err(err) => {
                            warn!("cannot listen for Ctrl-C: {err}");
                            *listen_for_interrupt = false;
                        }
                    }
                }
            }
        };
        progress.finish();
        while let Ok(event) = tool_events.try_recv() {
            print_tool_event(output, &event)?;
        }

        match result {
            Ok(reply) => writeln!(
                output,
                "{}🤖 {}",
                BAR_CHAR.bright_cyan(),
                reply.trim_end().bright_white()
            ),
            Err(err) => writeln!(
                output,
                "{}⚠️  {}",
                BAR_CHAR.bright_yellow(),
                notice(&err)
            ),
        }
    }
}

fn print_tool_event<W: Write>(output: &mut W, event: &ToolEvent) -> io::Result<()> {
    match event {
        ToolEvent::Call(req) => {
            let target = ["filePath", "command"]
                .into_iter()
                .find_map(|key| req.arguments.get(key)?.as_str())
                .map(str::to_owned)
                .unwrap_or_else(|| req.arguments.to_string());
            writeln!(
                output,
                "{}🛠️  {} {}",
                BAR_CHAR.bright_yellow(),
                req.name.bright_white().bold(),
                target
            )
        }
        ToolEvent::Result(result) if result.is_error => {
            let first_line = result.content.lines().next().unwrap_or_default();
            writeln!(output, "{}{}", BAR_CHAR.bright_red(), first_line.red())
        }
        ToolEvent::Result(_) => Ok(()),
    }
}

fn notice(err: &Error) -> String {
    let kept = "The conversation so far is kept.";
    match err {
        Error::Model(err) => match err.kind() {
            ErrorKind::Moderated => {
                format!("The model refused to answer ({err}). {kept}")
            }
            ErrorKind::RateLimitExceeded => {
                format!("Rate limited by the model service, try again later. {kept}")
            }
            ErrorKind::Unauthorized => {
                format!("The model service rejected the API key ({err}).")
            }
            ErrorKind::Other => {
                format!("The model service failed: {err}. {kept}")
            }
        },
        Error::EmptyResponse => {
            format!("No response from the model, try rephrasing. {kept}")
        }
        Error::TurnLimitExceeded(turns) => {
            format!("Stopped after {turns} model turns without an answer. {kept}")
        }
        Error::Cancelled => format!("Cancelled. {kept}"),
    }
}

#[cfg(feature = "cli")]
struct Progress(indicatif::ProgressBar);

#[cfg(feature = "cli")]
impl Progress {
    fn start() -> Self {
        use indicatif::{ProgressBar, ProgressStyle};

        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {wide_msg}") {
            bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        bar.set_message("🤔 Thinking...");
        bar.enable_steady_tick(std::time::Duration::from_millis(100));
        Self(bar)
    }

    #[inline]
    fn suspend<F: FnOnce() -> T, T>(&self, f: F) -> T {
        self.0.suspend(f)
    }

    #[inline]
    fn finish(self) {
        self.0.finish_and_clear();
    }
}

#[cfg(not(feature = "cli"))]
struct Progress;

#[cfg(not(feature = "cli"))]
impl Progress {
    #[inline]
    fn start() -> Self {
        Progress
    }

    #[inline]
    fn suspend<F: FnOnce() -> T, T>(&self, f: F) -> T {
        f()
    }

    #[inline]
    fn finish(self) {}
}

#[cfg(test)]
mod tests {
    use mini_cursor_test_model::{PresetResponse, TestModelProvider};

    use super::*;

    async fn run(provider: &TestModelProvider, input: &str) -> (String, usize) {
        let mut output = Vec::new();
        let turns = {
            let builder = SessionBuilder::with_model_provider(provider.clone());
            let mut repl = Repl::new(builder, input.as_bytes(), &mut output);
            repl.run().await.unwrap();
            repl.session().conversation().len()
        };
        (String::from_utf8(output).unwrap(), turns)
    }

    #[tokio::test]
    async fn test_exit_without_model_call() {
        let provider = TestModelProvider::default();
        provider.push_response(PresetResponse::text("unused"));

        let (output, turns) = run(&provider, "\n   \nexit\nnever sent\n").await;

        assert!(provider.requests().is_empty());
        assert_eq!(turns, 0);
        assert_eq!(output.matches(PROMPT).count(), 3);
    }

    #[tokio::test]
    async fn test_end_of_input() {
        let provider = TestModelProvider::default();
        provider.push_response(PresetResponse::text("Hello there."));

        let (output, turns) = run(&provider, "hi").await;

        assert_eq!(provider.requests().len(), 1);
        assert_eq!(turns, 2);
        assert!(output.contains("Hello there."));
        assert!(output.ends_with(&format!("{PROMPT}\n")));
    }

    #[tokio::test]
    async fn test_failure_is_a_notice() {
        let provider = TestModelProvider::default();
        provider.push_response(PresetResponse::text("Recovered.").with_failures(1));

        let (output, turns) = run(&provider, "first\nsecond\nexit\n").await;

        assert!(output.contains("The model service failed"));
        assert!(output.contains("Recovered."));
        // Both user turns are kept, the failed one included.
        assert_eq!(turns, 3);
    }

    #[tokio::test]
    async fn test_interrupt_at_prompt() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Duration;

        use tokio::io::{AsyncWriteExt, BufReader};

        let provider = TestModelProvider::default();
        provider.push_response(PresetResponse::text("Hello there."));

        // The terminal stays open, so only the interrupt can end the shell.
        let (mut terminal, input) = tokio::io::duplex(64);
        terminal.write_all(b"hi\n").await.unwrap();

        // The first prompt and the request are left alone, the second
        // prompt is interrupted.
        let calls = Arc::new(AtomicUsize::new(0));
        let interrupts = {
            let calls = Arc::clone(&calls);
            move || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call < 2 {
                        std::future::pending::<()>().await;
                    }
                    Ok(())
                }
            }
        };

        let mut output = Vec::new();
        let turns = {
            let builder = SessionBuilder::with_model_provider(provider.clone());
            let mut repl = Repl::new(builder, BufReader::new(input), &mut output)
                .with_interrupts(interrupts);
            tokio::time::timeout(Duration::from_secs(5), repl.run())
                .await
                .expect("the shell should end on interrupt")
                .unwrap();
            repl.session().conversation().len()
        };
        let output = String::from_utf8(output).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(provider.requests().len(), 1);
        assert_eq!(turns, 2);
        assert!(output.contains("Hello there."));
        assert!(output.ends_with(&format!("{PROMPT}\n")));
        drop(terminal);
    }
}

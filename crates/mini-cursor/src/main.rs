//! The `mini-cursor` command line program.

use anyhow::Context as _;
use mini_cursor::{Config, Repl, SessionBuilder};
use mini_cursor_gemini_model::GeminiProvider;
use tokio::io::{self, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env().context("cannot start mini-cursor")?;
    tracing::debug!("starting with {config:?}");

    let builder =
        SessionBuilder::with_model_provider(GeminiProvider::new(config.gemini_config()))
            .with_tool_kind(config.tool_kind)
            .with_max_turns(config.max_turns)
            .with_stderr_policy(config.stderr_policy);

    let mut repl = Repl::new(builder, BufReader::new(io::stdin()), std::io::stdout());
    repl.run().await.context("terminal I/O failed")?;
    Ok(())
}

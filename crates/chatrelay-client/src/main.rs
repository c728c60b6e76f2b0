use std::io::{self, IsTerminal, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use chatrelay_client::{ChatError, ChatSession, HttpRelay, SubmitOutcome};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Chat with an LLM through a chatrelay server."
)]
struct Cli {
    /// Relay server URL
    #[arg(long, env = "CHATRELAY_URL", default_value = "http://localhost:3000")]
    url: String,
    /// Path prefix the relay is mounted under
    #[arg(long, env = "CHATRELAY_BASE_PATH", default_value = "")]
    base_path: String,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
    /// Send a single message and exit instead of reading stdin
    message: Option<String>,
}

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn try_main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let relay = HttpRelay::new(&cli.url, &cli.base_path).context("building relay client")?;
    debug!(endpoint = relay.endpoint(), "relay endpoint resolved");
    let mut session = ChatSession::new(relay);

    if let Some(message) = cli.message {
        return send(&mut session, &message).await;
    }

    let interactive = io::stdin().is_terminal();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if interactive {
            print!("> ");
            io::stdout().flush()?;
        }
        let Some(line) = lines.next_line().await.context("reading stdin")? else {
            break;
        };
        send(&mut session, &line).await?;
    }
    Ok(())
}

async fn send(session: &mut ChatSession<HttpRelay>, input: &str) -> Result<()> {
    let mut stdout = io::stdout();
    let outcome = session
        .submit(input, |delta| {
            let _ = write!(stdout, "{delta}");
            let _ = stdout.flush();
        })
        .await;

    match outcome {
        Ok(SubmitOutcome::Completed) => println!(),
        Ok(SubmitOutcome::Truncated) => println!("\n[reply ended early]"),
        Ok(SubmitOutcome::Interrupted { error }) => println!("\n[connection lost: {error}]"),
        Ok(SubmitOutcome::Failed { .. }) => {
            if let Some(turn) = session.transcript().last() {
                println!("{}", turn.content());
            }
        }
        Err(ChatError::EmptyMessage) => {}
        Err(err) => return Err(err).context("merging reply"),
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chatrelay_client={level}")));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal()),
        )
        .try_init()
        .ok();
}

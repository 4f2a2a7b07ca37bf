use anyhow::{Context, Result};
use futures::StreamExt;
use nutribot::cli_adapter::{self, Command};
use nutribot::terminal::TerminalLog;
use nutribot::view::{MemoryInput, MemoryPicker, PanelBuilder};
use nutribot::{Config, Controller, HttpBackend, UiEvent};
use std::env;
use std::io::BufRead;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nutribot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args: Vec<String> = env::args().collect();
    let _bin = args.remove(0);
    if args.is_empty() {
        print_usage();
        return Ok(());
    }

    match args[0].as_str() {
        "run" => run_chat(&args[1..]).await,
        "help" | "-h" | "--help" => {
            print_usage();
            Ok(())
        }
        _ => {
            print_usage();
            Ok(())
        }
    }
}

async fn run_chat(args: &[String]) -> Result<()> {
    let mut config_path: Option<PathBuf> = None;
    let mut base_url: Option<String> = None;
    let mut greet = false;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                let value = args.get(i + 1).context("--config requires a value")?;
                config_path = Some(PathBuf::from(value));
                i += 2;
            }
            "--base-url" => {
                let value = args.get(i + 1).context("--base-url requires a value")?;
                base_url = Some(value.to_string());
                i += 2;
            }
            "--start" => {
                greet = true;
                i += 1;
            }
            "--help" | "-h" => {
                print_run_usage();
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown run argument: {other}"));
            }
        }
    }

    let mut config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(url) = base_url {
        config.server.base_url = url;
    }
    config.validate()?;

    let backend = HttpBackend::new(&config.server)?;
    info!(
        chat = %backend.chat_url(),
        upload = %backend.upload_url(),
        "nutribot client starting"
    );

    let panel = PanelBuilder::new()
        .message_log(TerminalLog::new(std::io::stdout()))
        .text_input(MemoryInput::new())
        .file_picker(MemoryPicker::new().with_open_hook(|| eprintln!("usage: /attach <path>")));
    let controller =
        Controller::new(&config, backend, panel).context("failed to build chat panel")?;

    let (tx, rx) = mpsc::unbounded_channel();
    let panel_task = tokio::spawn(controller.run(rx));

    eprintln!("{}", cli_adapter::usage());
    if greet {
        let _ = tx.send(UiEvent::Start);
    }

    let mut lines = UnboundedReceiverStream::new(spawn_stdin_reader());
    while let Some(line) = lines.next().await {
        let line = line.context("failed to read stdin")?;
        let command = match cli_adapter::parse_input(&line) {
            Ok(command) => command,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };

        let events = match command {
            Command::Quit => break,
            Command::Say(text) => cli_adapter::say_events(text).to_vec(),
            Command::Start => vec![UiEvent::Start],
            Command::Attach(None) => vec![UiEvent::Attach],
            Command::Attach(Some(path)) => match cli_adapter::read_attachment(&path).await {
                Ok(file) => vec![UiEvent::FilesChosen(vec![file])],
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "cannot attach file");
                    continue;
                }
            },
        };

        if events.into_iter().any(|event| tx.send(event).is_err()) {
            break;
        }
    }

    drop(tx);
    panel_task.await.context("chat panel task failed")?;
    Ok(())
}

/// Reads stdin on a plain thread so a blocked read never holds up runtime
/// shutdown.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn print_usage() {
    eprintln!("nutribot usage:\n  nutribot run [options]");
}

fn print_run_usage() {
    eprintln!(
        "nutribot run options:\n  --config <path>\n  --base-url <url>\n  --start"
    );
}

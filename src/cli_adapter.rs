use crate::controller::UiEvent;
use crate::error::ChatResult;
use crate::types::Attachment;
use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Start,
    Attach(Option<PathBuf>),
    Quit,
}

pub fn parse_input(line: &str) -> Result<Command> {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Command::Say(line.trim_end_matches(['\r', '\n']).to_string()));
    };

    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default();
    let arg = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match (name, arg) {
        ("start", None) => Ok(Command::Start),
        ("attach", path) => Ok(Command::Attach(path.map(PathBuf::from))),
        ("quit" | "exit", None) => Ok(Command::Quit),
        ("start" | "quit" | "exit", Some(_)) => bail!("/{name} takes no arguments"),
        _ => bail!("unknown command: /{name}"),
    }
}

/// Events a plain line of text turns into: fill the input, then press enter.
pub fn say_events(text: String) -> [UiEvent; 2] {
    [UiEvent::Input(text), UiEvent::Send]
}

pub async fn read_attachment(path: &Path) -> ChatResult<Attachment> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Attachment::new(name, bytes))
}

pub fn usage() -> &'static str {
    "commands:\n  <text>          send a message\n  /start          show the welcome message\n  /attach <path>  upload a grocery photo\n  /quit           leave"
}

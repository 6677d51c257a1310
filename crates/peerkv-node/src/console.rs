//! Interactive console: one command per stdin line.

use anyhow::Result;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::select;
use tracing::warn;

use peerkv::net::Transport;
use peerkv::store::Store;
use peerkv::Node;

pub const HELP: &str = "\
commands:
  put <key> <value>   store a value and replicate it to known peers
  get <key>           collect a key's values from known peers
  peers               list known peers
  help                show this message
  exit                leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Put { key: String, value: String },
    Get { key: String },
    Peers,
    Help,
    Exit,
}

/// Parse one input line. `Ok(None)` for a blank line; `Err` carries the
/// message to show the user.
pub fn parse(line: &str) -> std::result::Result<Option<Command>, String> {
    let line = line.trim();
    let Some(word) = line.split_whitespace().next() else {
        return Ok(None);
    };
    let rest = line[word.len()..].trim_start();

    let command = match word.to_ascii_lowercase().as_str() {
        "put" | "p" => {
            let mut parts = rest.splitn(2, char::is_whitespace);
            match (parts.next(), parts.next().map(str::trim)) {
                (Some(key), Some(value)) if !key.is_empty() && !value.is_empty() => Command::Put {
                    key: key.to_string(),
                    value: value.to_string(),
                },
                _ => return Err("usage: put <key> <value>".into()),
            }
        }
        "get" | "g" => match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
            [key] => Command::Get {
                key: key.to_string(),
            },
            _ => return Err("usage: get <key>".into()),
        },
        "peers" => Command::Peers,
        "help" | "h" | "?" => Command::Help,
        "exit" | "quit" | "q" => Command::Exit,
        other => return Err(format!("unknown command: {other} (try `help`)")),
    };
    Ok(Some(command))
}

/// Read commands until `exit`, EOF or Ctrl-C.
pub async fn run<S, T>(node: &Node<S, T>) -> Result<()>
where
    S: Store,
    T: Transport,
{
    let mut stdin = BufReader::new(io::stdin());
    let mut input = String::new();

    loop {
        prompt().await?;
        input.clear();
        select! {
            bytes_read = stdin.read_line(&mut input) => {
                if bytes_read? == 0 {
                    break;
                }
                match parse(&input) {
                    Ok(Some(Command::Exit)) => break,
                    Ok(Some(command)) => execute(node, command).await?,
                    Ok(None) => {}
                    Err(usage) => write_stdout(&usage).await?,
                }
            }
            ctrl_c = tokio::signal::ctrl_c() => {
                if let Err(error) = ctrl_c {
                    warn!(?error, "ctrl-c handler failed");
                }
                break;
            }
        }
    }

    write_stdout("exiting").await?;
    Ok(())
}

async fn execute<S, T>(node: &Node<S, T>, command: Command) -> Result<()>
where
    S: Store,
    T: Transport,
{
    match command {
        Command::Put { key, value } => {
            let report = node.put(&key, value).await?;
            write_stdout(&format!(
                "stored {key:?}; replicated to {}/{} peer(s)",
                report.delivered, report.attempted
            ))
            .await?;
            for failure in &report.failures {
                write_stdout(&format!("  unreachable {}: {}", failure.address, failure.reason))
                    .await?;
            }
        }
        Command::Get { key } => {
            let values = node.get(&key).await?;
            if values.is_empty() {
                write_stdout(&format!("{key:?}: no values")).await?;
            }
            for value in &values {
                write_stdout(&format!("{key:?}: {:?} (from {})", value.data, value.origin_peer))
                    .await?;
            }
        }
        Command::Peers => {
            let peers = node.peers();
            if peers.is_empty() {
                write_stdout("no known peers").await?;
            }
            for peer in peers {
                write_stdout(&format!("{}  http={} grpc={}", peer.address, peer.http, peer.grpc))
                    .await?;
            }
        }
        Command::Help => write_stdout(HELP).await?,
        Command::Exit => {}
    }
    Ok(())
}

async fn prompt() -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout.write_all(b"> ").await?;
    stdout.flush().await
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_put_keeps_spaces_in_value() {
        assert_eq!(
            parse("put greeting hello world\n"),
            Ok(Some(Command::Put {
                key: "greeting".into(),
                value: "hello world".into(),
            }))
        );
    }

    #[test]
    fn test_parse_is_case_insensitive_with_aliases() {
        assert_eq!(
            parse("GET color"),
            Ok(Some(Command::Get {
                key: "color".into()
            }))
        );
        assert_eq!(parse("g color"), parse("get color"));
        assert_eq!(parse("Q"), Ok(Some(Command::Exit)));
        assert_eq!(parse("peers"), Ok(Some(Command::Peers)));
    }

    #[test]
    fn test_parse_blank_line() {
        assert_eq!(parse("   \n"), Ok(None));
    }

    #[test]
    fn test_parse_usage_errors() {
        assert!(parse("put onlykey").unwrap_err().starts_with("usage: put"));
        assert!(parse("get").unwrap_err().starts_with("usage: get"));
        assert!(parse("get a b").is_err());
        assert!(parse("frobnicate").unwrap_err().contains("unknown command"));
    }
}

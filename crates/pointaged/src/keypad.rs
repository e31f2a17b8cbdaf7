//! Line-oriented keypad on stdin.
//!
//! Each line is a run of digits, `c` (clear), an empty line or `e` (enter),
//! `f` (flip camera), `r` (retry the camera), `s` (reselect the server's
//! camera) or `q` (quit).

use pointage_core::panel::Key;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Key(Key),
    FlipCamera,
    RetryCamera,
    ReselectCamera,
    Quit,
}

/// Parse one input line. `None` for anything unrecognized.
pub fn parse_line(line: &str) -> Option<Vec<Command>> {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "" | "e" => return Some(vec![Command::Key(Key::Enter)]),
        "c" => return Some(vec![Command::Key(Key::Clear)]),
        "f" => return Some(vec![Command::FlipCamera]),
        "r" => return Some(vec![Command::RetryCamera]),
        "s" => return Some(vec![Command::ReselectCamera]),
        "q" => return Some(vec![Command::Quit]),
        _ => {}
    }
    line.bytes()
        .map(|b| b.is_ascii_digit().then(|| Command::Key(Key::Digit(b - b'0'))))
        .collect()
}

/// Forward stdin commands until EOF, `q`, or the receiver goes away.
///
/// EOF is not a quit: a daemon started without a terminal keeps running.
pub async fn read_stdin(tx: mpsc::Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "keypad read failed");
                break;
            }
        };
        let Some(commands) = parse_line(&line) else {
            tracing::warn!(input = %line.trim(), "unrecognized keypad input");
            continue;
        };
        for command in commands {
            let quit = command == Command::Quit;
            if tx.send(command).await.is_err() || quit {
                return;
            }
        }
    }
    tracing::debug!("keypad input closed");
}

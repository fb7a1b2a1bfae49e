use std::io::Write;

use async_trait::async_trait;
use guardchat_agent::{Console, InputEvent};
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tracing::warn;

/// Terminal console: prompts and replies on stdout, lines from stdin.
pub struct StdioConsole {
    reader: BufReader<Stdin>,
    buffer: Vec<u8>,
}

impl StdioConsole {
    pub fn new() -> Self {
        Self { reader: BufReader::new(tokio::io::stdin()), buffer: Vec::new() }
    }
}

impl Default for StdioConsole {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Console for StdioConsole {
    async fn read_line(&mut self, prompt: &str) -> InputEvent {
        print!("{prompt}");
        let _ = std::io::stdout().flush();

        self.buffer.clear();
        let read = tokio::select! {
            read = self.reader.read_until(b'\n', &mut self.buffer) => Some(read),
            _ = tokio::signal::ctrl_c() => None,
        };

        match read {
            None => {
                println!();
                InputEvent::Interrupted
            }
            Some(Ok(0)) => {
                println!();
                InputEvent::Eof
            }
            Some(Ok(_)) => decode_line(&self.buffer),
            Some(Err(error)) => {
                warn!(event_name = "console.read_failed", error = %error, "failed to read stdin");
                InputEvent::Eof
            }
        }
    }

    fn show(&mut self, message: &str) {
        println!("{message}");
    }
}

/// Decodes one raw input line without its terminator.
pub fn decode_line(bytes: &[u8]) -> InputEvent {
    match std::str::from_utf8(bytes) {
        Ok(text) => InputEvent::Line(text.trim_end_matches(&['\r', '\n'][..]).to_string()),
        Err(_) => InputEvent::Unreadable,
    }
}

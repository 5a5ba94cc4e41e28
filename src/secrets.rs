//! Relay account secret acquisition

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io::{self, BufRead, IsTerminal, Write};
use thiserror::Error;

/// Environment variable checked before prompting
pub const DEFAULT_SECRET_ENV: &str = "GMAIL_APP_PASSWORD";

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("No relay account secret provided (set {0} or enter it at the prompt)")]
    Missing(String),

    #[error("Failed to read secret: {0}")]
    Io(#[from] io::Error),
}

pub type SecretResult<T> = Result<T, SecretError>;

/// Source of the relay account secret.
///
/// `secret` may block on terminal input, so callers on an async runtime
/// run it on a blocking thread.
pub trait SecretProvider: Send + Sync + 'static {
    fn secret(&self) -> SecretResult<String>;
}

/// Reads the secret from an environment variable, falling back to a
/// no-echo terminal prompt
#[derive(Debug, Clone)]
pub struct EnvOrPromptSecretProvider {
    env_var: String,
}

impl EnvOrPromptSecretProvider {
    pub fn new(env_var: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
        }
    }

    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    fn prompt(&self) -> SecretResult<String> {
        let prompt = format!("Enter the app password for the relay account ({} is not set): ", self.env_var);

        let secret = if io::stdin().is_terminal() {
            read_hidden_line(&prompt)?
        } else {
            eprint!("{}", prompt);
            io::stderr().flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            line
        };

        Ok(secret.trim_end_matches(['\r', '\n']).to_string())
    }
}

impl Default for EnvOrPromptSecretProvider {
    fn default() -> Self {
        Self::new(DEFAULT_SECRET_ENV)
    }
}

impl SecretProvider for EnvOrPromptSecretProvider {
    fn secret(&self) -> SecretResult<String> {
        if let Ok(secret) = std::env::var(&self.env_var) {
            if !secret.is_empty() {
                tracing::debug!("Using relay secret from {}", self.env_var);
                return Ok(secret);
            }
        }

        let secret = self.prompt()?;
        if secret.is_empty() {
            return Err(SecretError::Missing(self.env_var.clone()));
        }
        Ok(secret)
    }
}

/// A fixed secret, for callers that already hold one
#[derive(Clone)]
pub struct StaticSecret(String);

impl StaticSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }
}

impl SecretProvider for StaticSecret {
    fn secret(&self) -> SecretResult<String> {
        if self.0.is_empty() {
            return Err(SecretError::Missing("static secret".to_string()));
        }
        Ok(self.0.clone())
    }
}

/// Read one line from the terminal without echoing it
fn read_hidden_line(prompt: &str) -> io::Result<String> {
    eprint!("{}", prompt);
    io::stderr().flush()?;

    terminal::enable_raw_mode()?;
    let result = read_keys();
    terminal::disable_raw_mode()?;
    eprintln!();

    result
}

fn read_keys() -> io::Result<String> {
    let mut secret = String::new();

    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }

        match key.code {
            KeyCode::Enter => return Ok(secret),
            KeyCode::Backspace => {
                secret.pop();
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "secret prompt cancelled"));
            }
            KeyCode::Esc => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "secret prompt cancelled"));
            }
            KeyCode::Char(c) => secret.push(c),
            _ => {}
        }
    }
}

//! contact_relay.rs
//!
//! Client for the portfolio's mail relay. Checks the relay is up, or validates
//! a contact message and posts it as JSON.
//!
//!   contact_relay --ping
//!   contact_relay <name> <email> <message...>

use std::process::ExitCode;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_RELAY_URL: &str = "http://localhost:5000";

#[derive(Error, Debug)]
enum RelayError {
    #[error("please provide name, email, and message")]
    MissingField,
    #[error("please provide a valid email address")]
    InvalidEmail,
    #[error("relay unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("relay sent an unreadable reply: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("relay rejected the message ({status}): {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Clone, Serialize)]
struct ContactMessage {
    name: String,
    email: String,
    message: String,
}

impl ContactMessage {
    fn new(name: &str, email: &str, message: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            message: message.trim().to_string(),
        }
    }

    fn validate(&self) -> Result<(), RelayError> {
        if self.name.is_empty() || self.email.is_empty() || self.message.is_empty() {
            return Err(RelayError::MissingField);
        }
        if !is_valid_email(&self.email) {
            return Err(RelayError::InvalidEmail);
        }
        Ok(())
    }
}

// local@domain.tld, no whitespace, exactly one '@'
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    !local.is_empty()
        && domain
            .char_indices()
            .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

#[derive(Debug, Deserialize)]
struct RelayReply {
    #[serde(default)]
    success: bool,
    message: String,
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

// error replies are not always json, fall back to the raw body
async fn read_reply(response: Response) -> Result<RelayReply, RelayError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<RelayReply>(&body)
            .map(|reply| reply.message)
            .unwrap_or(body);
        return Err(RelayError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    Ok(serde_json::from_str(&body)?)
}

async fn health(client: &Client, base: &str) -> Result<String, RelayError> {
    let response = client.get(endpoint(base, "")).send().await?;
    let reply = read_reply(response).await?;
    Ok(reply.message)
}

async fn send(
    client: &Client,
    base: &str,
    message: &ContactMessage,
) -> Result<RelayReply, RelayError> {
    message.validate()?;

    let response = client
        .post(endpoint(base, "send-email"))
        .json(message)
        .send()
        .await?;
    let status = response.status().as_u16();
    let reply = read_reply(response).await?;

    if !reply.success {
        return Err(RelayError::Rejected {
            status,
            message: reply.message,
        });
    }

    Ok(reply)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let base = std::env::var("RELAY_URL").unwrap_or_else(|_| DEFAULT_RELAY_URL.to_string());
    let args: Vec<String> = std::env::args().skip(1).collect();
    let client = Client::new();

    let result = match args.as_slice() {
        [flag] if flag == "--ping" => health(&client, &base)
            .await
            .map(|message| info!("{base}: {message}")),
        [name, email, words @ ..] if !words.is_empty() => {
            let message = ContactMessage::new(name, email, &words.join(" "));
            send(&client, &base, &message)
                .await
                .map(|reply| info!("sent to {base}: {}", reply.message))
        }
        _ => {
            error!("usage: contact_relay --ping | contact_relay <name> <email> <message...>");
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

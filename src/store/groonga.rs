//! Groonga HTTP client.
//!
//! Sends commands to `<url>/d/<command>` with parameters in the query
//! string. `load` bodies are posted as JSON.

use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::{debug, info};

use super::command::{Command, parse_script};
use super::{Row, StoreClient, StoreError, StoreResult};

/// Client for a Groonga HTTP server.
///
/// One client is opened per replay pass and reused for every target in it.
#[derive(Debug, Clone)]
pub struct GroongaClient {
    client: reqwest::Client,
    base: Url,
}

impl GroongaClient {
    /// Create a client for the server at `url`.
    ///
    /// `timeout` bounds each request; `None` waits indefinitely.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Option<Duration>) -> StoreResult<Self> {
        let invalid = |message: String| StoreError::InvalidUrl {
            url: url.to_string(),
            message,
        };

        let mut base = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", base.scheme())));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| invalid(e.to_string()))?;

        Ok(Self { client, base })
    }

    /// Base URL commands are sent under.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.base
    }

    /// Endpoint for a command.
    fn endpoint(&self, command: &Command) -> StoreResult<Url> {
        self.base
            .join(&format!("d/{}", command.name))
            .map_err(|e| StoreError::InvalidUrl {
                url: self.base.to_string(),
                message: e.to_string(),
            })
    }

    /// Send one command and check Groonga's return code.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the server answers with a
    /// non-success HTTP status, or the response header reports a failure.
    pub async fn send(&self, command: &Command) -> StoreResult<()> {
        let url = self.endpoint(command)?;
        debug!(command = %command.name, url = %url, "Sending command");

        let request = match &command.values {
            Some(values) => self
                .client
                .post(url)
                .header(CONTENT_TYPE, "application/json")
                .body(values.clone()),
            None => self.client.get(url),
        };

        let response = request
            .query(&command.arguments)
            .send()
            .await
            .map_err(|source| StoreError::Http {
                command: command.name.clone(),
                source,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| StoreError::Http {
            command: command.name.clone(),
            source,
        })?;

        if status.is_success() {
            check_response(&command.name, &body)
        } else {
            // Groonga reports command errors with a JSON header as well.
            match check_response(&command.name, &body) {
                Err(e @ StoreError::Command { .. }) => Err(e),
                _ => Err(StoreError::Status {
                    command: command.name.clone(),
                    status: status.as_u16(),
                    body,
                }),
            }
        }
    }
}

impl StoreClient for GroongaClient {
    async fn execute_script(&self, path: &Path) -> StoreResult<()> {
        let source = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let commands = parse_script(&source).map_err(|e| StoreError::Parse {
            path: path.to_path_buf(),
            line: e.line,
            message: e.message,
        })?;

        for command in &commands {
            self.send(command).await?;
        }
        info!(path = %path.display(), commands = commands.len(), "Executed script");
        Ok(())
    }

    async fn load(&self, table: &str, rows: Vec<Row>) -> StoreResult<()> {
        let count = rows.len();
        let values = serde_json::to_string(&rows).map_err(|e| StoreError::Response {
            command: "load".to_string(),
            message: e.to_string(),
        })?;

        let mut command = Command::new("load", &[("table", table)]);
        command.values = Some(values);
        self.send(&command).await?;

        info!(table, rows = count, "Loaded rows");
        Ok(())
    }
}

/// Check the header of a Groonga response.
///
/// Understands both the array form `[[code, start, elapsed, message?], body]`
/// and the object form `{"header": {"return_code": .., "error": {"message": ..}}}`.
fn check_response(command: &str, body: &str) -> StoreResult<()> {
    let invalid = |message: &str| StoreError::Response {
        command: command.to_string(),
        message: message.to_string(),
    };

    let value: Value = serde_json::from_str(body).map_err(|e| invalid(&e.to_string()))?;

    let (code, message) = match &value {
        Value::Array(items) => {
            let header = items
                .first()
                .and_then(Value::as_array)
                .ok_or_else(|| invalid("missing header"))?;
            let code = header
                .first()
                .and_then(Value::as_i64)
                .ok_or_else(|| invalid("missing return code"))?;
            let message = header.get(3).and_then(Value::as_str).unwrap_or_default();
            (code, message.to_string())
        }
        Value::Object(object) => {
            let header = object
                .get("header")
                .ok_or_else(|| invalid("missing header"))?;
            let code = header
                .get("return_code")
                .and_then(Value::as_i64)
                .ok_or_else(|| invalid("missing return code"))?;
            let message = header
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            (code, message.to_string())
        }
        _ => return Err(invalid("response is neither an array nor an object")),
    };

    if code == 0 {
        Ok(())
    } else {
        Err(StoreError::Command {
            command: command.to_string(),
            code,
            message,
        })
    }
}

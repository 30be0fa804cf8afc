use std::collections::BTreeMap;

use serde::Deserialize;
use url::Url;

use cqlink_core::error::{CqLinkError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// `ws://host:port` style root shared by both endpoints.
    #[serde(default)]
    pub base_url: Option<String>,

    // Alternative to `base_url`.
    #[serde(default)]
    pub protocol: Option<Scheme>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub token_mode: TokenMode,

    /// Log every inbound and outbound payload at debug level.
    #[serde(default)]
    pub debug: bool,

    /// How message content is handed to listeners. Absent: as received.
    #[serde(default)]
    pub receive_format: Option<ReceiveFormat>,

    #[serde(default)]
    pub transport: TransportSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Ws,
    Wss,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Ws => "ws",
            Scheme::Wss => "wss",
        }
    }
}

/// Where the access token goes during the handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenMode {
    /// `?access_token=...` on the endpoint URL.
    Query,
    /// `access_token: ...` request header.
    Header,
    /// Both; accepted by the widest range of servers.
    #[default]
    Both,
}

impl TokenMode {
    fn in_query(self) -> bool {
        matches!(self, TokenMode::Query | TokenMode::Both)
    }

    fn in_header(self) -> bool {
        matches!(self, TokenMode::Header | TokenMode::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiveFormat {
    Segments,
    Tagged,
}

impl ClientConfig {
    /// Minimal config pointing at `base_url`, everything else default.
    pub fn from_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            protocol: None,
            host: None,
            port: None,
            access_token: None,
            token_mode: TokenMode::default(),
            debug: false,
            receive_format: None,
            transport: TransportSection::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let triple = [
            self.protocol.is_some(),
            self.host.is_some(),
            self.port.is_some(),
        ];
        match (&self.base_url, triple) {
            (Some(_), [false, false, false]) => {}
            (None, [true, true, true]) => {}
            (Some(_), _) => {
                return Err(CqLinkError::Config(
                    "base_url and protocol/host/port are mutually exclusive".into(),
                ))
            }
            (None, _) => {
                return Err(CqLinkError::Config(
                    "either base_url or all of protocol, host and port must be set".into(),
                ))
            }
        }
        if self.host.as_deref().is_some_and(str::is_empty) {
            return Err(CqLinkError::Config("host must not be empty".into()));
        }

        let base = self.base()?;
        if !matches!(base.scheme(), "ws" | "wss") {
            return Err(CqLinkError::Config(format!(
                "base_url scheme must be ws or wss, got {}",
                base.scheme()
            )));
        }

        self.transport.validate()?;
        Ok(())
    }

    fn base_text(&self) -> String {
        match (&self.base_url, self.protocol, &self.host, self.port) {
            (Some(url), ..) => url.trim_end_matches('/').to_string(),
            (None, Some(scheme), Some(host), Some(port)) => {
                format!("{}://{}:{}", scheme.as_str(), host, port)
            }
            _ => String::new(),
        }
    }

    /// Resolved root URL shared by both endpoints.
    pub fn base(&self) -> Result<Url> {
        let text = self.base_text();
        Url::parse(&text).map_err(|e| CqLinkError::Config(format!("invalid base url {text:?}: {e}")))
    }

    /// Endpoint URL for `path` (`/` or `/api`), with the token appended as a
    /// query parameter when the token mode asks for it.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let text = format!("{}{}", self.base_text(), path);
        let mut url =
            Url::parse(&text).map_err(|e| CqLinkError::Config(format!("invalid endpoint {text:?}: {e}")))?;
        if let Some(token) = self.token() {
            if self.token_mode.in_query() {
                url.query_pairs_mut().append_pair("access_token", token);
            }
        }
        Ok(url)
    }

    /// Extra handshake headers, plus the token header when enabled.
    pub fn handshake_headers(&self) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .transport
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(token) = self.token() {
            if self.token_mode.in_header() {
                headers.push(("access_token".into(), token.to_string()));
            }
        }
        headers
    }

    fn token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Options handed through to the WebSocket transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportSection {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// How long a graceful close waits for the peer's close frame.
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            headers: BTreeMap::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
            close_timeout_ms: default_close_timeout_ms(),
        }
    }
}

impl TransportSection {
    pub fn validate(&self) -> Result<()> {
        if !(1000..=120000).contains(&self.connect_timeout_ms) {
            return Err(CqLinkError::Config(
                "transport.connect_timeout_ms must be between 1000 and 120000".into(),
            ));
        }
        if !(100..=60000).contains(&self.close_timeout_ms) {
            return Err(CqLinkError::Config(
                "transport.close_timeout_ms must be between 100 and 60000".into(),
            ));
        }
        Ok(())
    }
}

fn default_connect_timeout_ms() -> u64 {
    10000
}
fn default_close_timeout_ms() -> u64 {
    3000
}

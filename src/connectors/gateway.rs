// src/connectors/gateway.rs
use crate::types::{Symbol, SymbolKind};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token rejected by gateway")]
    Unauthorized,
    #[error("gateway returned status {0}")]
    Status(StatusCode),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
}

/// Catalog entry as served by /api/symbols.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolDto {
    #[serde(default)]
    id: Option<i64>,
    symbol_code: String,
    name: String,
    #[serde(rename = "type")]
    #[serde(default)]
    kind: Option<String>,
}

impl From<SymbolDto> for Symbol {
    fn from(dto: SymbolDto) -> Self {
        Symbol {
            id: dto.id,
            code: dto.symbol_code,
            name: dto.name,
            kind: SymbolKind::from_wire(dto.kind.as_deref()),
        }
    }
}

/// REST side of the gateway: login, symbol catalog, alert acknowledgement.
#[derive(Clone)]
pub struct GatewayClient {
    http: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Exchanges credentials for a token. Any non-success response maps to
    /// InvalidCredentials; the caller gets no hint which part was wrong.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, GatewayError> {
        #[derive(Serialize)]
        struct LoginRequest<'a> {
            username: &'a str,
            password: &'a str,
        }

        let url = format!("{}/api/auth/login", self.base_url);
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GatewayError::InvalidCredentials);
        }

        Ok(response.json::<LoginResponse>().await?)
    }

    /// Fetches the symbol catalog. 401/403 become Unauthorized so the
    /// caller can tell a stale token from a gateway fault.
    pub async fn fetch_symbols(&self, token: &str) -> Result<Vec<Symbol>, GatewayError> {
        let url = format!("{}/api/symbols", self.base_url);
        debug!("GET {}", url);

        let response = self.http.get(&url).bearer_auth(token).send().await?;

        match response.status() {
            status if status.is_success() => {
                let dtos = response.json::<Vec<SymbolDto>>().await?;
                Ok(dtos.into_iter().map(Symbol::from).collect())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GatewayError::Unauthorized),
            status => Err(GatewayError::Status(status)),
        }
    }

    /// Marks an alert acknowledged on the server side.
    pub async fn acknowledge_alert(&self, token: &str, alert_id: i64) -> Result<(), GatewayError> {
        let url = format!("{}/api/alerts/acknowledge/{}", self.base_url, alert_id);
        debug!("POST {}", url);

        let response = self.http.post(&url).bearer_auth(token).send().await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GatewayError::Unauthorized),
            status => Err(GatewayError::Status(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_response_decodes() {
        let raw = r#"{"token": "abc123", "username": "alice", "type": "Bearer"}"#;
        let response: LoginResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.token, "abc123");
        assert_eq!(response.username, "alice");
    }

    #[test]
    fn catalog_entries_decode_from_the_gateway_shape() {
        let raw = r#"[
            {"id": 1, "symbolCode": "AAPL", "name": "Apple Inc.", "type": "STOCK"},
            {"symbolCode": "EURUSD", "name": "Euro / US Dollar", "type": null}
        ]"#;

        let symbols: Vec<Symbol> = serde_json::from_str::<Vec<SymbolDto>>(raw)
            .unwrap()
            .into_iter()
            .map(Symbol::from)
            .collect();

        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].id, Some(1));
        assert_eq!(symbols[0].code, "AAPL");
        assert_eq!(symbols[0].name, "Apple Inc.");
        assert_eq!(symbols[0].kind, SymbolKind::Stock);
        assert_eq!(symbols[1].id, None);
        assert_eq!(symbols[1].code, "EURUSD");
        assert_eq!(symbols[1].kind, SymbolKind::Other);
    }

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let client = GatewayClient::new("http://localhost:8080/");
        assert_eq!(client.base_url, "http://localhost:8080");
    }
}

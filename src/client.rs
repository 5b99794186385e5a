//! REST facade over the Taikun API.
//!
//! The client is built once at configure time, holds the bearer token and is
//! shared read-only by every operation. Each call runs under the caller's
//! [`OperationContext`] and attaches the API version token.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::{Credentials, ProviderConfig};
use crate::context::OperationContext;
use crate::convert::{LockMode, ResourceId};
use crate::error::ProviderError;

/// API version token attached to every call.
pub const API_VERSION: &str = "1";

const LOGIN_ROUTE: &str = "/api/Auth/login";
const TOKEN_LOGIN_ROUTE: &str = "/api/Auth/token";

/// Endpoints of one resource family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Routes {
    /// GET listing, filtered by query.
    pub list: &'static str,
    /// POST creating a record.
    pub create: &'static str,
    /// PUT updating a record.
    pub update: &'static str,
    /// DELETE prefix; the id is appended.
    pub delete: &'static str,
    /// POST toggling the lock.
    pub lock_manager: &'static str,
}

/// Query of a list call. The server picks the page size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    /// Single-record filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Organization scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<i32>,
    /// Number of records to skip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

/// The generic list envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    /// Records of this page.
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    /// Records matching the query in total.
    #[serde(default)]
    pub total_count: i64,
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LockCommand<'a> {
    id: &'a ResourceId,
    mode: LockMode,
}

#[derive(Serialize)]
#[serde(untagged)]
enum LoginCommand<'a> {
    Password { email: &'a str, password: &'a str },
    AccessKey {
        #[serde(rename = "accessKey")]
        access_key: &'a str,
        #[serde(rename = "secretKey")]
        secret_key: &'a str,
    },
}

/// Authenticated Taikun REST client.
#[derive(Clone)]
pub struct TaikunClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl fmt::Debug for TaikunClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaikunClient")
            .field("base_url", &self.base_url)
            .field("token", &"***")
            .finish()
    }
}

impl TaikunClient {
    /// Log in with the configured credentials.
    #[instrument(skip_all, fields(base_url = %config.base_url()))]
    pub async fn connect(
        ctx: &OperationContext,
        config: &ProviderConfig,
    ) -> Result<Self, ProviderError> {
        let credentials = config.credentials()?;
        let mut client = Self::with_token(config.base_url(), String::new())?;
        let (route, command) = match &credentials {
            Credentials::Password { email, password } => {
                (LOGIN_ROUTE, LoginCommand::Password { email, password })
            },
            Credentials::AccessKey {
                access_key,
                secret_key,
            } => (
                TOKEN_LOGIN_ROUTE,
                LoginCommand::AccessKey {
                    access_key,
                    secret_key,
                },
            ),
        };
        let body = client.send(ctx, Method::POST, route, None, Some(&command)).await?;
        let login: LoginResponse = parse(route, &body)?;
        client.token = login.token;
        debug!("Logged in to Taikun API");
        Ok(client)
    }

    /// A client using an already issued bearer token.
    pub fn with_token(
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// The base URL calls are made against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List one page of records.
    pub async fn list<T: DeserializeOwned>(
        &self,
        ctx: &OperationContext,
        route: &str,
        query: &ListQuery,
    ) -> Result<T, ProviderError> {
        let body = self
            .send(ctx, Method::GET, route, Some(query), None::<&()>)
            .await?;
        parse(route, &body)
    }

    /// Create a record, returning the id the server assigned.
    pub async fn create<B: Serialize + ?Sized>(
        &self,
        ctx: &OperationContext,
        route: &str,
        body: &B,
    ) -> Result<String, ProviderError> {
        let response = self.send(ctx, Method::POST, route, None, Some(body)).await?;
        let created: CreatedResponse = parse(route, &response)?;
        match created.id {
            serde_json::Value::String(id) => Ok(id),
            serde_json::Value::Number(n) => Ok(n.to_string()),
            other => Err(ProviderError::Invariant(format!(
                "{} returned id {} which is neither string nor number",
                route, other
            ))),
        }
    }

    /// Update a record in place.
    pub async fn update<B: Serialize + ?Sized>(
        &self,
        ctx: &OperationContext,
        route: &str,
        body: &B,
    ) -> Result<(), ProviderError> {
        self.send(ctx, Method::PUT, route, None, Some(body)).await?;
        Ok(())
    }

    /// Delete a record.
    pub async fn delete(
        &self,
        ctx: &OperationContext,
        route: &str,
        id: &ResourceId,
    ) -> Result<(), ProviderError> {
        let endpoint = format!("{}/{}", route, id);
        self.send(ctx, Method::DELETE, &endpoint, None, None::<&()>)
            .await?;
        Ok(())
    }

    /// Lock or unlock a record.
    pub async fn lock_manager(
        &self,
        ctx: &OperationContext,
        route: &str,
        id: &ResourceId,
        mode: LockMode,
    ) -> Result<(), ProviderError> {
        self.send(ctx, Method::POST, route, None, Some(&LockCommand { id, mode }))
            .await?;
        Ok(())
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        ctx: &OperationContext,
        method: Method,
        route: &str,
        query: Option<&ListQuery>,
        body: Option<&B>,
    ) -> Result<String, ProviderError> {
        let url = format!("{}{}", self.base_url, route);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .query(&[("v", API_VERSION)]);
        if let Some(query) = query {
            request = request.query(query);
        }
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, endpoint = route, "Calling Taikun API");
        ctx.run(route, async {
            let response = request.send().await.map_err(|e| transport(route, e))?;
            let status = response.status();
            let text = response.text().await.map_err(|e| transport(route, e))?;
            if !status.is_success() {
                return Err(ProviderError::Server {
                    endpoint: route.to_string(),
                    status: status.as_u16(),
                    body: text,
                });
            }
            Ok(text)
        })
        .await
    }
}

fn transport(endpoint: &str, err: reqwest::Error) -> ProviderError {
    ProviderError::Transport {
        endpoint: endpoint.to_string(),
        message: err.to_string(),
    }
}

fn parse<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|e| ProviderError::Invariant(format!(
        "unexpected response from {}: {}",
        endpoint, e
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_query_serializes_camel_case() {
        let query = ListQuery {
            id: None,
            organization_id: Some(7),
            offset: Some(3),
        };
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"organizationId": 7, "offset": 3})
        );
        let by_id = ListQuery {
            id: Some("42".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&by_id).unwrap(), json!({"id": "42"}));
    }

    #[test]
    fn test_lock_command_shape() {
        let id = ResourceId::Numeric(42);
        let command = LockCommand {
            id: &id,
            mode: LockMode::Locked,
        };
        assert_eq!(
            serde_json::to_value(&command).unwrap(),
            json!({"id": 42, "mode": "Locked"})
        );
    }

    #[test]
    fn test_login_command_shapes() {
        let command = LoginCommand::AccessKey {
            access_key: "ak",
            secret_key: "sk",
        };
        assert_eq!(
            serde_json::to_value(&command).unwrap(),
            json!({"accessKey": "ak", "secretKey": "sk"})
        );
        let command = LoginCommand::Password {
            email: "a@b.c",
            password: "pw",
        };
        assert_eq!(
            serde_json::to_value(&command).unwrap(),
            json!({"email": "a@b.c", "password": "pw"})
        );
    }

    #[test]
    fn test_list_response_defaults() {
        let response: ListResponse<serde_json::Value> =
            serde_json::from_value(json!({"totalCount": 0})).unwrap();
        assert!(response.data.is_empty());
    }

    #[test]
    fn test_debug_hides_token() {
        let client = TaikunClient::with_token("https://api.example.com/", "secret-token").unwrap();
        assert_eq!(client.base_url(), "https://api.example.com");
        assert!(!format!("{:?}", client).contains("secret-token"));
    }
}

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::{Client, Proxy, StatusCode, header};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::get_env_var;
use snafu::{ResultExt, ensure};
use tracing::debug;

use crate::{
    config::ApiSettings,
    models::{ProxyEndpoint, Resource, TimeWindow},
    providers::{
        FetchError, InvalidApiKeySnafu, InvalidBaseUrlSnafu, MarketDataApi, ProviderInitError,
        RawResponse,
        binance_rest::{params::construct_params, parser::MalformedResponse, response::BinanceErrorBody},
    },
};

pub const BASE_URL: &str = "https://api.binance.com/api/v3/";

/// REST client for the exchange's public market data endpoints.
///
/// A proxy is fixed when a `reqwest::Client` is built, so one client is kept
/// per proxy url and reused for the whole process (connection pooling).
pub struct BinanceRestApi {
    base_url: String,
    timeout: Duration,
    headers: header::HeaderMap,
    clients: Mutex<HashMap<String, Client>>,
}

impl BinanceRestApi {
    /// Creates a client from settings.
    ///
    /// If `api_key_env` is set, the key is read from that environment variable
    /// and sent as `X-MBX-APIKEY`. Public market data does not require it, but
    /// it raises some rate limits.
    pub fn new(settings: &ApiSettings) -> Result<Self, ProviderInitError> {
        let base_url = settings.base_url.trim().to_string();
        ensure!(
            base_url.starts_with("http://") || base_url.starts_with("https://"),
            InvalidBaseUrlSnafu { url: base_url }
        );
        let base_url = if base_url.ends_with('/') {
            base_url
        } else {
            format!("{base_url}/")
        };

        let mut headers = header::HeaderMap::new();
        if let Some(env_name) = &settings.api_key_env {
            let api_key = SecretString::new(get_env_var(env_name)?.into());
            let mut value = header::HeaderValue::from_str(api_key.expose_secret())
                .context(InvalidApiKeySnafu)?;
            value.set_sensitive(true);
            headers.insert("X-MBX-APIKEY", value);
        }

        Ok(Self {
            base_url,
            timeout: Duration::from_secs(settings.timeout_secs),
            headers,
            clients: Mutex::new(HashMap::new()),
        })
    }

    fn client_for(&self, proxy: &ProxyEndpoint) -> Result<Client, FetchError> {
        let key = proxy.url();
        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let setup = |message: String| FetchError::Setup {
            proxy: proxy.to_string(),
            message,
        };

        let mut route = Proxy::all(&key).map_err(|e| setup(e.to_string()))?;
        if let Some(env_name) = &proxy.credential_ref {
            let credentials =
                SecretString::new(get_env_var(env_name).map_err(|e| setup(e.to_string()))?.into());
            let (user, password) = credentials
                .expose_secret()
                .split_once(':')
                .ok_or_else(|| setup(format!("{env_name} must hold user:password")))?;
            route = route.basic_auth(user, password);
        }

        let client = Client::builder()
            .proxy(route)
            .timeout(self.timeout)
            .default_headers(self.headers.clone())
            .build()
            .map_err(|e| setup(e.to_string()))?;
        debug!(proxy = %proxy, "built http client");
        clients.insert(key, client.clone());
        Ok(client)
    }
}

/// Statuses a different egress IP (or a short wait) can fix.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::IM_A_TEAPOT
        || status.is_server_error()
}

fn transient(proxy: &ProxyEndpoint, err: &reqwest::Error) -> FetchError {
    FetchError::Transient {
        proxy: proxy.to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl MarketDataApi for BinanceRestApi {
    async fn fetch(
        &self,
        resource: &Resource,
        window: &TimeWindow,
        proxy: &ProxyEndpoint,
    ) -> Result<RawResponse, FetchError> {
        let client = self.client_for(proxy)?;
        let url = format!("{}{}", self.base_url, resource.endpoint());
        let query = construct_params(resource, window);

        let response = client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    FetchError::Setup {
                        proxy: proxy.to_string(),
                        message: e.to_string(),
                    }
                } else {
                    transient(proxy, &e)
                }
            })?;

        let status = response.status();
        // a body cut off mid-read is a dropped connection, not a bad payload
        let body = response.text().await.map_err(|e| transient(proxy, &e))?;

        if status.is_success() {
            return Ok(RawResponse {
                status: status.as_u16(),
                body,
            });
        }

        if is_retryable_status(status) {
            return Err(FetchError::Transient {
                proxy: proxy.to_string(),
                message: format!("HTTP {status}: {}", describe_error_body(&body)),
            });
        }

        Err(MalformedResponse::UnexpectedStatus {
            status: status.as_u16(),
            body: describe_error_body(&body),
        }
        .into())
    }
}

fn describe_error_body(body: &str) -> String {
    match serde_json::from_str::<BinanceErrorBody>(body) {
        Ok(err) => format!("{} (code {})", err.msg, err.code),
        Err(_) => body.chars().take(256).collect(),
    }
}

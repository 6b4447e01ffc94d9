//! Request construction, signing and response normalization for the
//! LocalBitcoins API.
//!
//! # Design
//! `LbcClient` splits every call into `build_request` (produces a fully
//! signed `HttpRequest`) and `parse_response` (consumes an `HttpResponse`).
//! `call` runs the two halves around the client's `Transport`; hosts that do
//! their own I/O can use the halves directly. The only mutable state is the
//! nonce sequence, so one client can be shared across threads.

use std::fmt;

use serde_json::Value;

use crate::auth::{Credentials, NonceSequence};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::method::{Category, Method, Submission};
use crate::params::RequestParams;

/// Parameter holding the country path segment of online-ad feeds.
pub const ONLINE_AD_PATH_PARAM: &str = "path";

/// URL and submission style for a call, before encoding and signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub method: Method,
    pub url: String,
    /// Path relative to the configured base; signed for private calls.
    pub path: String,
    pub submission: Submission,
    /// Parameters left to transmit after URL construction.
    pub params: RequestParams,
}

pub struct LbcClient {
    config: ClientConfig,
    credentials: Credentials,
    nonces: NonceSequence,
    transport: Box<dyn Transport + Send + Sync>,
}

impl fmt::Debug for LbcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LbcClient")
            .field("config", &self.config)
            .field("last_nonce", &self.last_nonce())
            .finish_non_exhaustive()
    }
}

impl LbcClient {
    /// Client against the production service using the bundled transport.
    #[cfg(feature = "ureq")]
    pub fn new(api_key: &str, api_secret: &str, otp: Option<&str>) -> Self {
        let mut config = ClientConfig::new(api_key, api_secret);
        if let Some(otp) = otp {
            config = config.with_otp(otp);
        }
        Self::with_config(config)
    }

    #[cfg(feature = "ureq")]
    pub fn with_config(config: ClientConfig) -> Self {
        let transport = crate::transport::UreqTransport::new(config.timeout());
        Self::with_transport(config, transport)
    }

    pub fn with_transport<T>(config: ClientConfig, transport: T) -> Self
    where
        T: Transport + Send + Sync + 'static,
    {
        let config = config.normalized();
        let credentials = Credentials::new(config.api_key.clone(), config.api_secret.clone());
        Self {
            config,
            credentials,
            nonces: NonceSequence::new(),
            transport: Box::new(transport),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Most recent nonce used to sign a request, or 0 before the first one.
    pub fn last_nonce(&self) -> u64 {
        self.nonces.last()
    }

    /// Resolve the URL and submission style of a call.
    ///
    /// Online-ad feeds take their country segment from the `path` parameter,
    /// which is consumed here and never transmitted.
    pub fn build(
        &self,
        method: Method,
        resource_id: Option<&str>,
        mut params: RequestParams,
    ) -> Result<RequestTarget, ApiError> {
        let spec = method.spec();
        let (url, path) = match spec.category {
            Category::OnlineAd => {
                let segment = params
                    .remove(ONLINE_AD_PATH_PARAM)
                    .ok_or(ApiError::MissingParameter(ONLINE_AD_PATH_PARAM))?;
                let path = format!("/{}/{segment}/.json", method.name());
                (format!("{}{path}", self.config.site_url), path)
            }
            Category::Public | Category::Private => {
                let path = match resource_id.filter(|id| !id.is_empty()) {
                    Some(id) => format!("/{}/{id}", method.name()),
                    None => format!("/{}", method.name()),
                };
                (format!("{}{path}", self.config.api_url), path)
            }
        };

        Ok(RequestTarget {
            method,
            url,
            path,
            submission: spec.submission,
            params,
        })
    }

    /// Build the request exactly as it goes on the wire.
    ///
    /// Body-style calls POST the encoded parameters to the URL with a
    /// trailing slash. Query-style calls GET the URL with the same encoding
    /// appended as a query string when non-empty. Private calls draw a fresh
    /// nonce and sign the encoded parameters.
    pub fn build_request(
        &self,
        method: Method,
        resource_id: Option<&str>,
        params: RequestParams,
    ) -> Result<HttpRequest, ApiError> {
        let target = self.build(method, resource_id, params)?;
        let encoded = target.params.encode();

        let headers = if method.category() == Category::Private {
            let nonce = self.nonces.next();
            self.credentials.headers(&target.path, &encoded, nonce)?
        } else {
            Vec::new()
        };

        let request = match target.submission {
            Submission::Body => HttpRequest {
                method: HttpMethod::Post,
                url: format!("{}/", target.url),
                headers,
                body: Some(encoded),
            },
            Submission::Query => HttpRequest {
                method: HttpMethod::Get,
                url: if encoded.is_empty() {
                    target.url
                } else {
                    format!("{}?{encoded}", target.url)
                },
                headers,
                body: None,
            },
        };
        Ok(request)
    }

    /// Normalize a transport response.
    ///
    /// The HTTP status is not consulted: the service reports failures through
    /// an `error` member of the JSON body.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Value, ApiError> {
        let value: Value = match serde_json::from_str(&response.body) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(status = response.status, error = %e, "response is not JSON");
                return Err(ApiError::MalformedResponse {
                    status: response.status,
                    body: response.body,
                });
            }
        };

        match value.get("error") {
            Some(err) if is_set(err) => {
                tracing::debug!(status = response.status, error = %err, "API reported an error");
                Err(ApiError::Api(err.clone()))
            }
            _ => Ok(value),
        }
    }

    /// Call a method by its wire name.
    pub fn call(
        &self,
        method: &str,
        resource_id: Option<&str>,
        params: RequestParams,
    ) -> Result<Value, ApiError> {
        let method: Method = method.parse()?;
        self.call_method(method, resource_id, params)
    }

    /// Like `call`, delivering the outcome to `on_complete` exactly once.
    pub fn call_with<F>(
        &self,
        method: &str,
        resource_id: Option<&str>,
        params: RequestParams,
        on_complete: F,
    ) where
        F: FnOnce(Result<Value, ApiError>),
    {
        on_complete(self.call(method, resource_id, params));
    }

    pub fn call_method(
        &self,
        method: Method,
        resource_id: Option<&str>,
        params: RequestParams,
    ) -> Result<Value, ApiError> {
        let request = self.build_request(method, resource_id, params)?;
        tracing::debug!(%method, verb = %request.method, url = %request.url, "sending request");
        let response = self.transport.execute(&request)?;
        tracing::debug!(%method, status = response.status, "received response");
        self.parse_response(response)
    }

    /// `myself`: the authenticated account's public profile.
    pub fn myself(&self) -> Result<Value, ApiError> {
        self.call_method(Method::Myself, None, RequestParams::new())
    }

    pub fn wallet(&self) -> Result<Value, ApiError> {
        self.call_method(Method::Wallet, None, RequestParams::new())
    }

    pub fn wallet_send(&self, address: &str, amount: &str) -> Result<Value, ApiError> {
        let params = RequestParams::new()
            .with("address", address)
            .with("amount", amount);
        self.call_method(Method::WalletSend, None, params)
    }

    pub fn dashboard(&self) -> Result<Value, ApiError> {
        self.call_method(Method::Dashboard, None, RequestParams::new())
    }

    pub fn country_codes(&self) -> Result<Value, ApiError> {
        self.call_method(Method::CountryCodes, None, RequestParams::new())
    }

    /// Buy advertisements for a country path such as `"us/united-states"`.
    pub fn buy_bitcoins_online(&self, path: &str) -> Result<Value, ApiError> {
        let params = RequestParams::new().with(ONLINE_AD_PATH_PARAM, path);
        self.call_method(Method::BuyBitcoinsOnline, None, params)
    }

    pub fn sell_bitcoins_online(&self, path: &str) -> Result<Value, ApiError> {
        let params = RequestParams::new().with(ONLINE_AD_PATH_PARAM, path);
        self.call_method(Method::SellBitcoinsOnline, None, params)
    }
}

/// `null`, `false`, `""` and zero mean the service reported no error.
fn is_set(error: &Value) -> bool {
    match error {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

//! In-process stand-in for the LocalBitcoins API.
//!
//! Serves the online-ad feeds, the public `countrycodes` call and a handful
//! of private calls. Private routes enforce the service's HMAC rules (key,
//! strictly increasing nonce, signature over `nonce + key + path + params`)
//! with an implementation that is independent of the client crate, so the
//! client's integration tests catch any drift in signing.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::Sha256;
use tokio::{net::TcpListener, sync::RwLock};

pub const API_KEY: &str = "mock-api-key";
pub const API_SECRET: &str = "mock-api-secret";
pub const USERNAME: &str = "mock-trader";

pub const ERR_MISSING_AUTH: u32 = 3;
pub const ERR_INVALID_SIGNATURE: u32 = 41;
pub const ERR_NONCE_TOO_SMALL: u32 = 42;
pub const ERR_INSUFFICIENT_FUNDS: u32 = 1;
pub const ERR_INVALID_PARAMS: u32 = 9;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transfer {
    pub address: String,
    pub amount: String,
}

#[derive(Deserialize)]
pub struct WalletSend {
    pub address: String,
    pub amount: String,
}

#[derive(Deserialize)]
pub struct AdGetQuery {
    #[serde(default)]
    pub ads: Option<String>,
}

/// Mutable server state: nonce high-water mark and a wallet in satoshis.
#[derive(Debug)]
pub struct Ledger {
    pub last_nonce: u64,
    pub balance_sats: u64,
    pub sent: Vec<Transfer>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            last_nonce: 0,
            balance_sats: 100_000_000,
            sent: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    key: Arc<str>,
    secret: Arc<str>,
    pub ledger: Arc<RwLock<Ledger>>,
}

impl AppState {
    pub fn new(key: &str, secret: &str) -> Self {
        Self {
            key: Arc::from(key),
            secret: Arc::from(secret),
            ledger: Arc::new(RwLock::new(Ledger::default())),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(API_KEY, API_SECRET)
    }
}

/// Error body in the service's shape: `{"error": {"message", "error_code"}}`.
#[derive(Debug)]
pub struct ApiFailure {
    pub code: u32,
    pub message: String,
}

impl ApiFailure {
    fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "message": self.message,
                "error_code": self.code,
            }
        });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

pub fn app() -> Router {
    app_with_state(AppState::default())
}

pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .route("/buy-bitcoins-online/{*rest}", get(buy_bitcoins_online))
        .route("/sell-bitcoins-online/{*rest}", get(sell_bitcoins_online))
        .route("/api/countrycodes", get(country_codes))
        .route("/api/myself/", post(myself))
        .route("/api/dashboard", get(dashboard))
        .route("/api/wallet", get(wallet))
        .route("/api/wallet-balance/", post(wallet_balance))
        .route("/api/wallet-send/", post(wallet_send))
        .route("/api/ad-get", get(ad_get))
        .route("/api/ad-get/ad_id/{id}/", post(ad_get_by_id))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    serve(listener, AppState::default()).await
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_state(state)).await
}

/// `HMAC-SHA256(secret, nonce + key + path + params)` as uppercase hex.
pub fn expected_signature(
    secret: &str,
    nonce: u64,
    key: &str,
    path: &str,
    params: &str,
) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(format!("{nonce}{key}{path}{params}").as_bytes());
    hex::encode_upper(mac.finalize().into_bytes())
}

/// Check the auth headers of a private call and advance the nonce.
async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
    params: &str,
) -> Result<(), ApiFailure> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let (Some(key), Some(nonce), Some(signature)) = (
        header("Apiauth-Key"),
        header("Apiauth-Nonce"),
        header("Apiauth-Signature"),
    ) else {
        return Err(ApiFailure::new(
            ERR_MISSING_AUTH,
            "missing HMAC authentication headers",
        ));
    };

    if key != &*state.key {
        return Err(ApiFailure::new(ERR_MISSING_AUTH, "unknown API key"));
    }
    let nonce: u64 = nonce
        .parse()
        .map_err(|_| ApiFailure::new(ERR_NONCE_TOO_SMALL, "nonce is not an integer"))?;

    let mut path = uri.path().to_string();
    if !path.ends_with('/') {
        path.push('/');
    }
    let expected = expected_signature(&state.secret, nonce, key, &path, params);
    if signature != expected {
        tracing::debug!(%path, params, "signature mismatch");
        return Err(ApiFailure::new(ERR_INVALID_SIGNATURE, "Invalid HMAC signature"));
    }

    let mut ledger = state.ledger.write().await;
    if nonce <= ledger.last_nonce {
        return Err(ApiFailure::new(
            ERR_NONCE_TOO_SMALL,
            format!("Nonce must be greater than {}", ledger.last_nonce),
        ));
    }
    ledger.last_nonce = nonce;
    Ok(())
}

fn format_btc(sats: u64) -> String {
    format!("{}.{:08}", sats / 100_000_000, sats % 100_000_000)
}

fn parse_btc(amount: &str) -> Option<u64> {
    let (whole, frac) = amount.split_once('.').unwrap_or((amount, ""));
    if frac.len() > 8 || (whole.is_empty() && frac.is_empty()) {
        return None;
    }
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac: u64 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<8}").parse().ok()?
    };
    whole.checked_mul(100_000_000)?.checked_add(frac)
}

fn ad_list(kind: &str, rest: &str) -> Json<Value> {
    let country = rest.trim_end_matches("/.json").trim_end_matches('/');
    let code = country.split('/').next().unwrap_or_default().to_uppercase();
    Json(json!({
        "data": {
            "ad_list": [
                {
                    "data": {
                        "ad_id": 1001,
                        "trade_type": kind,
                        "countrycode": code,
                        "temp_price": "30000.00",
                        "profile": { "username": USERNAME }
                    }
                }
            ],
            "ad_count": 1
        },
        "pagination": { "next": null }
    }))
}

async fn buy_bitcoins_online(Path(rest): Path<String>) -> Json<Value> {
    ad_list("ONLINE_SELL", &rest)
}

async fn sell_bitcoins_online(Path(rest): Path<String>) -> Json<Value> {
    ad_list("ONLINE_BUY", &rest)
}

async fn country_codes() -> Json<Value> {
    Json(json!({
        "data": {
            "cc_list": ["FI", "GB", "US"],
            "cc_count": 3
        }
    }))
}

async fn myself(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiFailure> {
    authenticate(&state, &headers, &uri, &body).await?;
    Ok(Json(json!({
        "data": {
            "username": USERNAME,
            "trade_count": "30+",
            "feedback_score": 100
        }
    })))
}

async fn dashboard(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiFailure> {
    authenticate(&state, &headers, &uri, uri.query().unwrap_or_default()).await?;
    Ok(Json(json!({
        "data": { "contact_list": [], "contact_count": 0 }
    })))
}

async fn wallet(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiFailure> {
    authenticate(&state, &headers, &uri, uri.query().unwrap_or_default()).await?;
    let ledger = state.ledger.read().await;
    let sent: Vec<Value> = ledger
        .sent
        .iter()
        .map(|t| json!({ "txtype": 2, "amount": t.amount, "description": t.address }))
        .collect();
    Ok(Json(json!({
        "data": {
            "total": {
                "balance": format_btc(ledger.balance_sats),
                "sendable": format_btc(ledger.balance_sats)
            },
            "sent_transactions_30d": sent,
            "receiving_address": "1MockReceivingAddress"
        }
    })))
}

async fn wallet_balance(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiFailure> {
    authenticate(&state, &headers, &uri, &body).await?;
    let ledger = state.ledger.read().await;
    Ok(Json(json!({
        "data": {
            "total": {
                "balance": format_btc(ledger.balance_sats),
                "sendable": format_btc(ledger.balance_sats)
            },
            "receiving_address": "1MockReceivingAddress"
        }
    })))
}

async fn wallet_send(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiFailure> {
    authenticate(&state, &headers, &uri, &body).await?;
    let form: WalletSend = serde_html_form::from_str(&body)
        .map_err(|e| ApiFailure::new(ERR_INVALID_PARAMS, format!("invalid parameters: {e}")))?;
    let sats = parse_btc(&form.amount)
        .ok_or_else(|| ApiFailure::new(ERR_INVALID_PARAMS, "invalid amount"))?;

    let mut ledger = state.ledger.write().await;
    if sats > ledger.balance_sats {
        return Err(ApiFailure::new(ERR_INSUFFICIENT_FUNDS, "Insufficient balance"));
    }
    ledger.balance_sats -= sats;
    ledger.sent.push(Transfer {
        address: form.address,
        amount: form.amount,
    });
    tracing::info!(balance = ledger.balance_sats, "wallet-send accepted");
    Ok(Json(json!({ "data": { "message": "Money is being sent" } })))
}

async fn ad_get(
    State(state): State<AppState>,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiFailure> {
    let query = uri.query().unwrap_or_default();
    authenticate(&state, &headers, &uri, query).await?;
    let query: AdGetQuery = serde_html_form::from_str(query)
        .map_err(|e| ApiFailure::new(ERR_INVALID_PARAMS, format!("invalid parameters: {e}")))?;
    let ads: Vec<Value> = query
        .ads
        .unwrap_or_default()
        .split(',')
        .filter_map(|id| id.trim().parse::<u64>().ok())
        .map(|id| json!({ "data": { "ad_id": id } }))
        .collect();
    Ok(Json(json!({
        "data": { "ad_count": ads.len(), "ad_list": ads }
    })))
}

async fn ad_get_by_id(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Result<Json<Value>, ApiFailure> {
    authenticate(&state, &headers, &uri, &body).await?;
    Ok(Json(json!({
        "data": { "ad_count": 1, "ad_list": [{ "data": { "ad_id": id } }] }
    })))
}

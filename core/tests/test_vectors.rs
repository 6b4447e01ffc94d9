//! Verify signing, request building and response parsing against JSON test
//! vectors stored in `test-vectors/`.
//!
//! Signatures in `signing.json` were produced by an independent HMAC-SHA256
//! implementation. Comparing parsed JSON (not raw strings) for responses
//! avoids false negatives from field ordering.

use lbc_core::auth::{sign, signing_message, HEADER_KEY, HEADER_NONCE, HEADER_SIGNATURE};
use lbc_core::{
    ApiError, ClientConfig, HttpMethod, HttpRequest, HttpResponse, LbcClient, Method,
    RequestParams, TransportError,
};
use serde_json::Value;

const API: &str = "http://localhost:3000/api";
const SITE: &str = "http://localhost:3000";

fn client() -> LbcClient {
    let config = ClientConfig::new("vector-key", "vector-secret")
        .with_api_url(API)
        .with_site_url(SITE);
    let unused = |_: &HttpRequest| -> Result<HttpResponse, TransportError> {
        Err(TransportError::new("test vectors never hit the network"))
    };
    LbcClient::with_transport(config, unused)
}

/// Parse `[["k","v"], ...]` into ordered params.
fn params(value: &Value) -> RequestParams {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|pair| {
            let pair = pair.as_array().unwrap();
            (
                pair[0].as_str().unwrap().to_string(),
                pair[1].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        other => panic!("unknown method: {other}"),
    }
}

fn expand(url: &str) -> String {
    url.replace("{api}", API).replace("{site}", SITE)
}

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

#[test]
fn signing_test_vectors() {
    let raw = include_str!("../../test-vectors/signing.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let path = case["path"].as_str().unwrap();
        let params = params(&case["params"]);
        let nonce = case["nonce"].as_u64().unwrap();
        let key = case["key"].as_str().unwrap();
        let secret = case["secret"].as_str().unwrap();

        let encoded = params.encode();
        assert_eq!(encoded, case["expected_encoded"].as_str().unwrap(), "{name}: encoding");
        assert_eq!(
            signing_message(nonce, key, path, &encoded),
            case["expected_message"].as_str().unwrap(),
            "{name}: message"
        );
        assert_eq!(
            sign(path, &params, nonce, key, secret).unwrap(),
            case["expected_signature"].as_str().unwrap(),
            "{name}: signature"
        );
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let resource_id = case.get("resource_id").and_then(Value::as_str);
        let params = params(&case["params"]);

        let result = case["method"]
            .as_str()
            .unwrap()
            .parse::<Method>()
            .and_then(|method| c.build_request(method, resource_id, params));

        if let Some(expected_error) = case.get("expected_error") {
            let err = result.unwrap_err();
            match expected_error.as_str().unwrap() {
                "UnknownMethod" => assert!(
                    matches!(err, ApiError::UnknownMethod(_)),
                    "{name}: expected UnknownMethod"
                ),
                "MissingParameter" => assert!(
                    matches!(err, ApiError::MissingParameter(_)),
                    "{name}: expected MissingParameter"
                ),
                other => panic!("{name}: unknown expected_error: {other}"),
            }
            continue;
        }

        let req = result.unwrap();
        let expected = &case["expected_request"];
        assert_eq!(
            req.method,
            parse_method(expected["method"].as_str().unwrap()),
            "{name}: method"
        );
        assert_eq!(req.url, expand(expected["url"].as_str().unwrap()), "{name}: url");
        assert_eq!(req.body.as_deref(), expected["body"].as_str(), "{name}: body");

        if expected["signed"].as_bool().unwrap() {
            assert_eq!(req.header(HEADER_KEY), Some("vector-key"), "{name}: key header");
            let nonce: u64 = req.header(HEADER_NONCE).unwrap().parse().unwrap();
            assert_eq!(nonce, c.last_nonce(), "{name}: nonce header");
            let sig = req.header(HEADER_SIGNATURE).unwrap();
            assert_eq!(sig.len(), 64, "{name}: signature length");
            assert_eq!(
                req.header("content-type"),
                Some("application/x-www-form-urlencoded"),
                "{name}: content type"
            );
        } else {
            assert!(req.header(HEADER_SIGNATURE).is_none(), "{name}: unexpected signature");
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[test]
fn response_test_vectors() {
    let raw = include_str!("../../test-vectors/responses.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let body = case["body"].as_str().unwrap().to_string();
        let response = HttpResponse {
            status: case["status"].as_u64().unwrap() as u16,
            headers: Vec::new(),
            body: body.clone(),
        };
        let result = c.parse_response(response);

        match case.get("expected_error").and_then(Value::as_str) {
            Some("MalformedResponse") => match result.unwrap_err() {
                ApiError::MalformedResponse { body: raw, .. } => {
                    assert_eq!(raw, body, "{name}: raw body")
                }
                other => panic!("{name}: expected MalformedResponse, got {other:?}"),
            },
            Some("Api") => match result.unwrap_err() {
                ApiError::Api(err) => {
                    assert_eq!(err, case["expected_api_error"], "{name}: api error")
                }
                other => panic!("{name}: expected Api, got {other:?}"),
            },
            Some(other) => panic!("{name}: unknown expected_error: {other}"),
            None => assert_eq!(result.unwrap(), case["expected_result"], "{name}: result"),
        }
    }
}

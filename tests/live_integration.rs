use std::fs;

use custody_http::{ClientOptions, CustodyHttpError, RetryingHttpClient};
use serde::Deserialize;
use serde_json::Value as JsonValue;

#[derive(Debug, Deserialize)]
struct SecretsFile {
    #[serde(rename = "CUSTODY_API_BASE_URL")]
    base_url: Option<String>,
    #[serde(rename = "CUSTODY_ACCESS_TOKEN")]
    access_token: Option<String>,
    #[serde(rename = "CUSTODY_PROXY_ACCESS_TOKEN")]
    proxy_access_token: Option<String>,
}

fn load_live_client() -> Result<RetryingHttpClient, String> {
    if std::env::var("CUSTODY_API_BASE_URL").is_ok() {
        return RetryingHttpClient::from_env().map_err(|err| err.to_string());
    }

    let content = fs::read_to_string("secrets.json")
        .map_err(|_| "CUSTODY_API_BASE_URL env or secrets.json is required".to_owned())?;
    let parsed: SecretsFile = serde_json::from_str(&content)
        .map_err(|err| format!("secrets.json could not be parsed: {err}"))?;

    let base_url = parsed
        .base_url
        .ok_or_else(|| "missing CUSTODY_API_BASE_URL in secrets.json".to_owned())?;
    let mut options = ClientOptions::default();
    if let Some(token) = parsed.access_token {
        options = options.with_access_token(token);
    }
    if let Some(token) = parsed.proxy_access_token {
        options = options.with_proxy_access_token(token);
    }
    Ok(RetryingHttpClient::new(base_url).with_options(options))
}

#[tokio::test]
async fn live_dashboard_queues_and_missing_route() {
    let api = match load_live_client() {
        Ok(api) => api,
        Err(_) => {
            eprintln!("skipping live test: credentials not found in env or secrets.json");
            return;
        }
    };

    let queues: JsonValue = api
        .get_data("/transaction/dashboard/queues")
        .await
        .expect("dashboard queues must load");
    assert!(queues.is_object());

    let err = api
        .get("/transaction/dashboard/__missing__")
        .await
        .expect_err("unknown route must fail");
    match err {
        CustodyHttpError::Http { status, .. } => assert!((400..500).contains(&status)),
        other => panic!("expected client error without retries, got {other:?}"),
    }
}

use std::env;
use std::time::Duration;

use anyhow::Context;
use bigdecimal::{BigDecimal, FromPrimitive};

/// Client for the external exchange-rate service. One outbound call per
/// conversion, no caching and no retry; callers are expected to skip the
/// call entirely when source and target currencies match.
#[derive(Debug, Clone)]
pub struct RateConverter {
    http: reqwest::Client,
    endpoint: String,
    account_id: String,
    api_key: String,
}

pub fn is_currency_code(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
}

impl RateConverter {
    pub fn new(http: reqwest::Client, endpoint: String, account_id: String, api_key: String) -> Self {
        Self {
            http,
            endpoint,
            account_id,
            api_key,
        }
    }

    pub fn from_env(http: reqwest::Client) -> Self {
        Self::new(
            http,
            env::var("RATE_API_URL").expect("RATE_API_URL must be set"),
            env::var("RATE_API_ID").expect("RATE_API_ID must be set"),
            env::var("RATE_API_KEY").expect("RATE_API_KEY must be set"),
        )
    }

    pub async fn convert(
        &self,
        value: &BigDecimal,
        from_currency: &str,
        to_currency: &str,
    ) -> anyhow::Result<BigDecimal> {
        let amount = value.to_string();
        let body = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("to", to_currency),
                ("from", from_currency),
                ("amount", amount.as_str()),
            ])
            .basic_auth(&self.account_id, Some(&self.api_key))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .context("rate service unreachable")?
            .error_for_status()
            .context("rate service returned an error status")?
            .json::<serde_json::Value>()
            .await
            .context("rate service returned a non-json body")?;
        parse_converted(&body)
    }
}

// the converted value lives under from[0].mid in the response body
fn parse_converted(body: &serde_json::Value) -> anyhow::Result<BigDecimal> {
    let mid = body["from"][0]["mid"]
        .as_f64()
        .context("rate response is missing from[0].mid")?;
    BigDecimal::from_f64(mid).context("rate response mid is not a finite number")
}

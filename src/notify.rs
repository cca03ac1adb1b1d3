use std::env;
use std::time::Duration;

use bigdecimal::BigDecimal;
use serde_json::json;
use tracing::warn;

use crate::database::queries::NotifyTarget;

#[derive(Debug, Clone)]
struct Gateway {
    url: String,
    key: String,
}

fn gateway_from_env(url_var: &str, key_var: &str) -> Option<Gateway> {
    match (env::var(url_var), env::var(key_var)) {
        (Ok(url), Ok(key)) => Some(Gateway { url, key }),
        _ => None,
    }
}

/// Best-effort notification channels. Every send is fire-and-forget: an
/// unreachable gateway or a rejected request is logged and dropped, it never
/// affects the settlement or donation that triggered it. A channel with no
/// configured gateway is silently disabled.
#[derive(Debug, Clone)]
pub struct Notifier {
    http: reqwest::Client,
    mail: Option<Gateway>,
    push: Option<Gateway>,
}

impl Notifier {
    pub fn from_env(http: reqwest::Client) -> Self {
        Self {
            http,
            mail: gateway_from_env("MAIL_API_URL", "MAIL_API_KEY"),
            push: gateway_from_env("PUSH_API_URL", "PUSH_API_KEY"),
        }
    }

    #[cfg(test)]
    pub fn disabled(http: reqwest::Client) -> Self {
        Self {
            http,
            mail: None,
            push: None,
        }
    }

    pub async fn withdrawal_settled(&self, target: &NotifyTarget, money: &BigDecimal, currency: &str) {
        if !target.email_is_enabled {
            return;
        }
        let money = money.with_scale(2);
        self.send_mail(
            target,
            "Tipjar withdrawal",
            &format!("You just withdrew {money} {currency}!"),
        )
        .await;
    }

    pub async fn donation_received(
        &self,
        to_user: &str,
        target: &NotifyTarget,
        from_name: &str,
        money: &BigDecimal,
        currency: &str,
        message: &str,
    ) {
        let text = format!("{from_name} just donated you {money} {currency}! It's said: {message}");
        if target.email_is_enabled {
            self.send_mail(target, "You have a new donation", &text).await;
        }
        if target.pop_up_is_enabled {
            self.send_pop_up(to_user, &text).await;
        }
    }

    async fn send_mail(&self, target: &NotifyTarget, subject: &str, body: &str) {
        let gateway = match &self.mail {
            Some(gateway) => gateway,
            None => return,
        };
        let to = match &target.email {
            Some(to) => to,
            None => return,
        };
        let res = self
            .http
            .post(&gateway.url)
            .header("X-Api-Key", &gateway.key)
            .json(&json!({ "to": to, "subject": subject, "body": body }))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .and_then(|r| r.error_for_status());
        if let Err(e) = res {
            warn!("mail notification dropped: {e}");
        }
    }

    async fn send_pop_up(&self, to_user: &str, text: &str) {
        let gateway = match &self.push {
            Some(gateway) => gateway,
            None => return,
        };
        let res = self
            .http
            .post(&gateway.url)
            .header("Authorization", format!("Bearer {}", gateway.key))
            .json(&json!({ "userId": to_user, "text": text }))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .and_then(|r| r.error_for_status());
        if let Err(e) = res {
            warn!("pop-up notification dropped: {e}");
        }
    }
}

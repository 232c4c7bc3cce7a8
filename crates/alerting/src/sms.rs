//! SMS notifier for the Twilio Messages API

use crate::dispatcher::{DispatchError, Notifier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// SMS provider settings; sender, recipient and body are fixed per deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub api_base: String,
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number
    pub from: String,
    /// Recipient number
    pub to: String,
    pub body: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.twilio.com".to_string(),
            account_sid: String::new(),
            auth_token: String::new(),
            from: String::new(),
            to: String::new(),
            body: "⚠ High stress detected! Immediate attention required.".to_string(),
        }
    }
}

impl SmsConfig {
    /// Credentials and both numbers are present
    pub fn is_configured(&self) -> bool {
        !self.account_sid.is_empty()
            && !self.auth_token.is_empty()
            && !self.from.is_empty()
            && !self.to.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

/// Sends the configured message through the provider's REST API
pub struct SmsNotifier {
    config: SmsConfig,
    client: reqwest::Client,
}

impl SmsNotifier {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn notify(&self) -> Result<String, DispatchError> {
        let url = self.messages_url();
        debug!("Sending SMS alert to {}", self.config.to);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", self.config.to.as_str()),
                ("From", self.config.from.as_str()),
                ("Body", self.config.body.as_str()),
            ])
            .send()
            .await
            .map_err(|e| DispatchError::Network(e.to_string()))?;

        if response.status().is_success() {
            let message: MessageResource = response
                .json()
                .await
                .map_err(|e| DispatchError::Network(e.to_string()))?;
            Ok(message.sid)
        } else {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            Err(DispatchError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

//! Telegram bot notifier for end-of-run reports

use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use super::Notifier;
use crate::error::NotifyError;

const TELEGRAM_API: &str = "https://api.telegram.org";

pub struct TelegramNotifier {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String, timeout: Duration) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: TELEGRAM_API.to_string(),
            bot_token,
            chat_id,
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let text = escape_html(message);
        let response = self
            .http
            .post(self.send_message_url())
            .form(&[
                ("chat_id", self.chat_id.as_str()),
                ("text", text.as_str()),
                ("parse_mode", "HTML"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { status: status.as_u16(), body });
        }

        info!("Report delivered to Telegram chat {}", self.chat_id);
        Ok(())
    }
}

/// Telegram's HTML parse mode only requires these three entities
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
        let line = "web01.example.com: 3 packages updated";
        assert_eq!(escape_html(line), line);
    }

    #[test]
    fn test_send_message_url() {
        let notifier =
            TelegramNotifier::new("123:abc".into(), "42".into(), Duration::from_secs(5)).unwrap();
        assert_eq!(notifier.send_message_url(), "https://api.telegram.org/bot123:abc/sendMessage");
    }
}

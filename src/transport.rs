//! Outbound messaging surface. The core only needs "send an offer", "edit a
//! message" and "notify one user"; delivery is at-least-once with no ordering
//! guarantee between recipients.

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Edited,
    /// The message already carried the target content. Treated as success so
    /// re-running a reconciliation is harmless.
    Unchanged,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends an offer message and returns the platform message id.
    async fn send_offer(&self, chat_id: i64, text: &str) -> anyhow::Result<i64>;
    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> anyhow::Result<EditOutcome>;
    async fn notify(&self, chat_id: i64, text: &str) -> anyhow::Result<()>;
}

/// Telegram Bot API client.
pub struct TelegramTransport {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

impl TelegramTransport {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> anyhow::Result<ApiResponse<T>> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("telegram {method} request"))?;
        let parsed = response
            .json::<ApiResponse<T>>()
            .await
            .with_context(|| format!("telegram {method} response"))?;
        Ok(parsed)
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_offer(&self, chat_id: i64, text: &str) -> anyhow::Result<i64> {
        let response: ApiResponse<SentMessage> = self
            .call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        if !response.ok {
            anyhow::bail!(
                "sendMessage failed: {}",
                response.description.unwrap_or_default()
            );
        }
        let sent = response
            .result
            .ok_or_else(|| anyhow::anyhow!("sendMessage returned no message"))?;
        Ok(sent.message_id)
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> anyhow::Result<EditOutcome> {
        let response: ApiResponse<serde_json::Value> = self
            .call(
                "editMessageText",
                json!({ "chat_id": chat_id, "message_id": message_id, "text": text }),
            )
            .await?;
        if response.ok {
            return Ok(EditOutcome::Edited);
        }
        let description = response.description.unwrap_or_default();
        // Telegram rejects edits that would not change the message; for us
        // that means a previous run already did the work.
        if description.contains("message is not modified") {
            return Ok(EditOutcome::Unchanged);
        }
        anyhow::bail!("editMessageText failed: {description}")
    }

    async fn notify(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        let response: ApiResponse<SentMessage> = self
            .call("sendMessage", json!({ "chat_id": chat_id, "text": text }))
            .await?;
        if !response.ok {
            anyhow::bail!(
                "sendMessage failed: {}",
                response.description.unwrap_or_default()
            );
        }
        Ok(())
    }
}

/// Stands in when no bot token is configured: logs every send and hands out
/// synthetic message ids so the rest of the pipeline still works.
#[derive(Default)]
pub struct NoopTransport {
    next_id: AtomicI64,
}

#[async_trait]
impl Transport for NoopTransport {
    async fn send_offer(&self, chat_id: i64, text: &str) -> anyhow::Result<i64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        info!(chat_id, message_id = id, text, "transport disabled; offer not sent");
        Ok(id)
    }

    async fn edit_message(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
    ) -> anyhow::Result<EditOutcome> {
        info!(chat_id, message_id, text, "transport disabled; edit not sent");
        Ok(EditOutcome::Edited)
    }

    async fn notify(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        info!(chat_id, text, "transport disabled; notification not sent");
        Ok(())
    }
}

#[cfg(test)]
pub mod fake {
    //! Recording transport for tests, in the spirit of the in-memory store.

    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Outbound {
        Offer { chat_id: i64, message_id: i64, text: String },
        Edit { chat_id: i64, message_id: i64, text: String },
        Notify { chat_id: i64, text: String },
    }

    #[derive(Default)]
    pub struct FakeTransport {
        next_id: AtomicI64,
        pub sent: Mutex<Vec<Outbound>>,
        /// Chat ids that refuse delivery, to exercise partial fan-out failure.
        pub unreachable: Mutex<HashSet<i64>>,
        /// Last text applied per (chat, message); repeated identical edits
        /// report `Unchanged` like the real platform does.
        content: Mutex<std::collections::HashMap<(i64, i64), String>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn refuse(&self, chat_id: i64) {
            self.unreachable.lock().expect("lock").insert(chat_id);
        }

        pub fn log(&self) -> Vec<Outbound> {
            self.sent.lock().expect("lock").clone()
        }

        fn check_reachable(&self, chat_id: i64) -> anyhow::Result<()> {
            if self.unreachable.lock().expect("lock").contains(&chat_id) {
                anyhow::bail!("chat {chat_id} unreachable");
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send_offer(&self, chat_id: i64, text: &str) -> anyhow::Result<i64> {
            self.check_reachable(chat_id)?;
            let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            self.content
                .lock()
                .expect("lock")
                .insert((chat_id, id), text.to_string());
            self.sent.lock().expect("lock").push(Outbound::Offer {
                chat_id,
                message_id: id,
                text: text.to_string(),
            });
            Ok(id)
        }

        async fn edit_message(
            &self,
            chat_id: i64,
            message_id: i64,
            text: &str,
        ) -> anyhow::Result<EditOutcome> {
            self.check_reachable(chat_id)?;
            let mut content = self.content.lock().expect("lock");
            if content.get(&(chat_id, message_id)).map(String::as_str) == Some(text) {
                return Ok(EditOutcome::Unchanged);
            }
            content.insert((chat_id, message_id), text.to_string());
            self.sent.lock().expect("lock").push(Outbound::Edit {
                chat_id,
                message_id,
                text: text.to_string(),
            });
            Ok(EditOutcome::Edited)
        }

        async fn notify(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
            self.check_reachable(chat_id)?;
            self.sent.lock().expect("lock").push(Outbound::Notify {
                chat_id,
                text: text.to_string(),
            });
            Ok(())
        }
    }
}

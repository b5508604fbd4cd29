//! 提出状況のメッセージ組み立てと Webhook への送信。

use rand::{Rng, seq::IndexedRandom};
use reqwest::{StatusCode, Url, header::CONTENT_TYPE};
use serde::Serialize;
use thiserror::Error;

use crate::report::ReportStatus;

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Failed to serialize webhook payload: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to post to webhook: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Failed to post to webhook: non-200 response: {0}")]
    Status(StatusCode),
}

/// Webhook に送るメッセージ本体。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookMessage {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub color: String,
    pub title: String,
    pub text: String,
}

impl Attachment {
    fn new(color: &str, title: &str, text: String) -> Self {
        Self {
            color: color.to_string(),
            title: title.to_string(),
            text,
        }
    }
}

/// ヘッダー候補から 1 つを一様にランダムに選ぶ。候補が空なら `None`。
pub fn choose_header<'a, R>(headers: &'a [String], rng: &mut R) -> Option<&'a str>
where
    R: Rng + ?Sized,
{
    headers.choose(rng).map(String::as_str)
}

/// 提出状況からメッセージを組み立てる。
///
/// 行は入力順のまま「提出済み」と「未提出」に振り分ける。
/// どちらかが空でも添付は 2 つとも含める。
pub fn build_message(rows: &[ReportStatus], header: &str) -> WebhookMessage {
    let mut written = String::new();
    let mut unwritten = String::new();

    for row in rows {
        if row.written {
            written.push_str(&format!("✅ {} {}\n", row.first_name, row.last_name));
        } else {
            unwritten.push_str(&format!("❓ {} {}\n", row.first_name, row.last_name));
        }
    }

    WebhookMessage {
        text: header.to_string(),
        attachments: vec![
            Attachment::new("good", "Report written", written),
            Attachment::new("warning", "Report not yet written", unwritten),
        ],
    }
}

/// メッセージの送信先。
pub trait Notifier {
    fn notify(&self, message: &WebhookMessage) -> impl Future<Output = Result<(), WebhookError>>;
}

/// Webhook に JSON を POST するクライアント。
///
/// タイムアウトは設定していないため、reqwest の既定値に従う。
pub struct WebhookClient {
    http_client: reqwest::Client,
    url: Url,
}

impl WebhookClient {
    pub fn new(url: Url, user_agent: &str) -> Result<Self, WebhookError> {
        let http_client = reqwest::Client::builder().user_agent(user_agent).build()?;

        Ok(Self { http_client, url })
    }
}

impl Notifier for WebhookClient {
    async fn notify(&self, message: &WebhookMessage) -> Result<(), WebhookError> {
        let body = serde_json::to_vec(message)?;

        let response = self
            .http_client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(WebhookError::Status(response.status()));
        }

        tracing::debug!(status = %response.status(), "Webhook accepted message");
        Ok(())
    }
}

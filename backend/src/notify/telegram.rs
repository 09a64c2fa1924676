use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::analysis::AssessmentReport;
use crate::config::TelegramSettings;
use crate::locale::Locale;
use crate::report::{self, FormattedReport};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid Telegram API URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("Telegram {method} failed ({status}): {description}")]
    Api {
        method: &'static str,
        status: u16,
        description: String,
    },
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Image attached to a notification, as it was uploaded.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub filename: String,
}

#[derive(Debug, PartialEq, Eq)]
enum Outgoing<'a> {
    Photo(&'a str),
    Message(&'a str),
}

/// Bot API calls needed to deliver one report, in order.
fn plan(formatted: &FormattedReport, with_photo: bool) -> Vec<Outgoing<'_>> {
    if !with_photo {
        return vec![Outgoing::Message(formatted.full_text())];
    }
    let mut calls = vec![Outgoing::Photo(formatted.caption())];
    if let Some(rest) = formatted.remainder().filter(|rest| !rest.is_empty()) {
        calls.push(Outgoing::Message(rest));
    }
    calls
}

/// Delivers formatted reports to a single Telegram chat through the Bot API.
#[derive(Clone)]
pub struct TelegramNotifier {
    http_client: Client,
    api_base: Url,
    bot_token: String,
    chat_id: String,
    locale: Locale,
    debug: bool,
}

impl TelegramNotifier {
    pub fn new(settings: &TelegramSettings) -> Result<Self, NotifyError> {
        let mut base = settings.api_base.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Ok(Self {
            http_client: Client::new(),
            api_base: Url::parse(&base)?,
            bot_token: settings.bot_token.clone(),
            chat_id: settings.chat_id.clone(),
            locale: settings.locale,
            debug: settings.debug,
        })
    }

    /// Sends the report as a photo caption when the image is attached, as a
    /// plain message otherwise. Text over the caption limit follows as a
    /// separate message.
    pub async fn send_report(
        &self,
        assessment: &AssessmentReport,
        attachment: Option<Attachment>,
    ) -> Result<(), NotifyError> {
        let formatted = report::format(assessment, self.locale);
        let mut attachment = attachment;
        for outgoing in plan(&formatted, attachment.is_some()) {
            match outgoing {
                Outgoing::Photo(caption) => {
                    if let Some(attachment) = attachment.take() {
                        self.send_photo(caption, attachment).await?;
                    }
                }
                Outgoing::Message(text) => self.send_message(text).await?,
            }
        }
        log::info!("Report delivered to Telegram chat {}", self.chat_id);
        Ok(())
    }

    async fn send_photo(&self, caption: &str, attachment: Attachment) -> Result<(), NotifyError> {
        let url = self.endpoint("sendPhoto")?;
        if self.debug {
            log::debug!(
                "sendPhoto via {} ({} bytes, caption {} chars)",
                self.masked(&url),
                attachment.bytes.len(),
                caption.chars().count()
            );
        }
        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .text("parse_mode", "HTML")
            .part(
                "photo",
                Part::bytes(attachment.bytes).file_name(attachment.filename),
            );

        let response = self.http_client.post(url).multipart(form).send().await?;
        self.check("sendPhoto", response).await
    }

    async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        let url = self.endpoint("sendMessage")?;
        if self.debug {
            log::debug!("sendMessage via {} ({} chars)", self.masked(&url), text.chars().count());
        }
        let body = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
        });

        let response = self.http_client.post(url).json(&body).send().await?;
        self.check("sendMessage", response).await
    }

    async fn check(&self, method: &'static str, response: reqwest::Response) -> Result<(), NotifyError> {
        let status = response.status();
        let body = response.text().await?;
        if self.debug {
            log::debug!("{} answered {}: {}", method, status, body);
        }
        let parsed: Option<TelegramResponse> = serde_json::from_str(&body).ok();
        match parsed {
            Some(TelegramResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(TelegramResponse { description, .. }) => Err(NotifyError::Api {
                method,
                status: status.as_u16(),
                description: description.unwrap_or_else(|| "no description".to_string()),
            }),
            None => Err(NotifyError::Api {
                method,
                status: status.as_u16(),
                description: body,
            }),
        }
    }

    fn endpoint(&self, method: &str) -> Result<Url, NotifyError> {
        // "bot<id>:<secret>" would otherwise parse as a scheme
        Ok(self.api_base.join(&format!("./bot{}/{}", self.bot_token, method))?)
    }

    fn masked(&self, url: &Url) -> String {
        url.as_str().replace(&self.bot_token, &mask_token(&self.bot_token))
    }
}

fn mask_token(token: &str) -> String {
    match token.split_once(':') {
        Some((bot_id, _)) => format!("{}:***", bot_id),
        None => "***".to_string(),
    }
}

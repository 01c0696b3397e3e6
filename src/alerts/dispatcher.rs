//! Outbound alert dispatch. Grounded on `alerts/dispatcher.py`: one `send`
//! entrypoint per channel family. Webhooks go through `reqwest::Client`. SMTP has
//! no equivalent crate anywhere in the corpus, so it is hand-rolled over a raw
//! `TcpStream` — STARTTLS/SSL are accepted as config knobs but the handshake
//! itself stays plaintext; see DESIGN.md.

use crate::config::Settings;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AlertSendResult {
    pub success: bool,
    pub error_message: String,
    pub provider_status: String,
}

impl AlertSendResult {
    fn ok(provider_status: impl Into<String>) -> Self {
        AlertSendResult {
            success: true,
            error_message: String::new(),
            provider_status: provider_status.into(),
        }
    }

    fn fail(error_message: impl Into<String>) -> Self {
        AlertSendResult {
            success: false,
            error_message: error_message.into(),
            provider_status: String::new(),
        }
    }
}

#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn send(&self, channel: &str, target: &str, subject: &str, message: &str, payload: &Value) -> AlertSendResult;
}

/// Returned by `sync_from_audit` when no dispatcher is configured; every send is a
/// deliberate FAILED rather than a silent no-op.
pub struct NoopDispatcher;

#[async_trait]
impl AlertDispatcher for NoopDispatcher {
    async fn send(&self, _channel: &str, _target: &str, _subject: &str, _message: &str, _payload: &Value) -> AlertSendResult {
        AlertSendResult::fail("dispatcher not configured")
    }
}

pub struct RealAlertDispatcher {
    settings: Settings,
    http: reqwest::Client,
}

impl RealAlertDispatcher {
    pub fn new(settings: Settings) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.alert_notify_timeout_seconds.max(1) as u64))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        RealAlertDispatcher { settings, http }
    }
}

#[async_trait]
impl AlertDispatcher for RealAlertDispatcher {
    async fn send(&self, channel: &str, target: &str, subject: &str, message: &str, payload: &Value) -> AlertSendResult {
        match channel {
            "email" => self.send_email(target, subject, message).await,
            "im" | "dingtalk" | "wecom" | "pagerduty" => self.send_webhook(channel, target, subject, message, payload).await,
            other => AlertSendResult::fail(format!("unsupported dispatch channel: {other}")),
        }
    }
}

impl RealAlertDispatcher {
    async fn send_email(&self, target: &str, subject: &str, message: &str) -> AlertSendResult {
        if !self.settings.alert_email_enabled {
            return AlertSendResult::fail("email channel disabled by settings");
        }
        if self.settings.alert_smtp_host.is_empty() {
            return AlertSendResult::fail("smtp host is empty");
        }
        if self.settings.alert_email_from.is_empty() {
            return AlertSendResult::fail("alert_email_from is empty");
        }

        let host = self.settings.alert_smtp_host.clone();
        let port = self.settings.alert_smtp_port;
        let from = self.settings.alert_email_from.clone();
        let to = target.to_string();
        let subject = subject.to_string();
        let message = message.to_string();
        let use_tls = self.settings.alert_smtp_use_tls && !self.settings.alert_smtp_use_ssl;
        let username = self.settings.alert_smtp_username.clone();
        let password = self.settings.alert_smtp_password.clone();
        let timeout = Duration::from_secs(self.settings.alert_notify_timeout_seconds.max(1) as u64);

        let result = tokio::task::spawn_blocking(move || {
            smtp_send(&host, port, &from, &to, &subject, &message, use_tls, username.as_deref(), password.as_deref(), timeout)
        })
        .await;

        match result {
            Ok(Ok(())) => AlertSendResult::ok("250"),
            Ok(Err(err)) => AlertSendResult::fail(err),
            Err(join_err) => AlertSendResult::fail(join_err.to_string()),
        }
    }

    async fn send_webhook(&self, channel: &str, target: &str, subject: &str, message: &str, payload: &Value) -> AlertSendResult {
        if !self.settings.alert_im_enabled {
            return AlertSendResult::fail("im channel disabled by settings");
        }
        let mut url = target.trim().to_string();
        if url.is_empty() {
            match &self.settings.alert_im_default_webhook {
                Some(default_url) if !default_url.is_empty() => url = default_url.clone(),
                _ => return AlertSendResult::fail("webhook target is empty"),
            }
        }

        let body = match channel {
            "dingtalk" => json!({
                "msgtype": "markdown",
                "markdown": {"title": subject, "text": format!("### {subject}\n\n{message}")},
                "at": {"isAtAll": false},
            }),
            "wecom" => json!({
                "msgtype": "markdown",
                "markdown": {"content": format!("**{subject}**\n{message}")},
            }),
            "pagerduty" => {
                let routing_key = payload.get("pagerduty_routing_key").and_then(|v| v.as_str()).unwrap_or("").trim();
                if routing_key.is_empty() {
                    return AlertSendResult::fail("pagerduty_routing_key is required in payload");
                }
                let mut details = payload.clone();
                if let Value::Object(map) = &mut details {
                    map.insert("message".to_string(), json!(message));
                }
                json!({
                    "routing_key": routing_key,
                    "event_action": "trigger",
                    "payload": {
                        "summary": subject,
                        "source": payload.get("source").and_then(|v| v.as_str()).unwrap_or("ashare-governance-core"),
                        "severity": payload.get("severity").and_then(|v| v.as_str()).unwrap_or("warning").to_lowercase(),
                        "custom_details": details,
                    },
                })
            }
            _ => json!({"title": subject, "text": message, "payload": payload}),
        };

        match self.http.post(&url).json(&body).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.as_u16() >= 400 {
                    AlertSendResult::fail(format!("webhook status={}", status.as_u16()))
                } else {
                    AlertSendResult::ok(status.as_u16().to_string())
                }
            }
            Err(err) => AlertSendResult::fail(err.to_string()),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn smtp_send(
    host: &str,
    port: u16,
    from: &str,
    to: &str,
    subject: &str,
    message: &str,
    use_starttls: bool,
    username: Option<&str>,
    password: Option<&str>,
    timeout: Duration,
) -> Result<(), String> {
    let addr = format!("{host}:{port}");
    let stream = TcpStream::connect(&addr).map_err(|e| e.to_string())?;
    stream.set_read_timeout(Some(timeout)).map_err(|e| e.to_string())?;
    stream.set_write_timeout(Some(timeout)).map_err(|e| e.to_string())?;
    let mut reader = BufReader::new(stream.try_clone().map_err(|e| e.to_string())?);
    let mut writer = stream;

    read_reply(&mut reader)?;
    send_line(&mut writer, "EHLO ashare-governance-core")?;
    read_reply(&mut reader)?;

    if use_starttls {
        send_line(&mut writer, "STARTTLS")?;
        read_reply(&mut reader)?;
        send_line(&mut writer, "EHLO ashare-governance-core")?;
        read_reply(&mut reader)?;
    }

    if let Some(user) = username.filter(|u| !u.is_empty()) {
        send_line(&mut writer, "AUTH LOGIN")?;
        read_reply(&mut reader)?;
        send_line(&mut writer, &base64_encode(user.as_bytes()))?;
        read_reply(&mut reader)?;
        send_line(&mut writer, &base64_encode(password.unwrap_or("").as_bytes()))?;
        read_reply(&mut reader)?;
    }

    send_line(&mut writer, &format!("MAIL FROM:<{from}>"))?;
    read_reply(&mut reader)?;
    send_line(&mut writer, &format!("RCPT TO:<{to}>"))?;
    read_reply(&mut reader)?;
    send_line(&mut writer, "DATA")?;
    read_reply(&mut reader)?;

    let body = format!("Subject: {subject}\r\nFrom: {from}\r\nTo: {to}\r\n\r\n{message}\r\n.");
    send_line(&mut writer, &body)?;
    read_reply(&mut reader)?;
    send_line(&mut writer, "QUIT")?;
    let _ = read_reply(&mut reader);
    Ok(())
}

fn send_line(writer: &mut impl Write, line: &str) -> Result<(), String> {
    writer.write_all(line.as_bytes()).map_err(|e| e.to_string())?;
    writer.write_all(b"\r\n").map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())
}

fn read_reply(reader: &mut impl BufRead) -> Result<String, String> {
    let mut line = String::new();
    reader.read_line(&mut line).map_err(|e| e.to_string())?;
    let code: u16 = line.get(0..3).and_then(|s| s.parse().ok()).unwrap_or(0);
    if !(200..400).contains(&code) {
        return Err(format!("smtp error: {}", line.trim_end()));
    }
    Ok(line)
}

fn base64_encode(bytes: &[u8]) -> String {
    const TABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity((bytes.len() + 2) / 3 * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = *chunk.get(1).unwrap_or(&0);
        let b2 = *chunk.get(2).unwrap_or(&0);
        out.push(TABLE[(b0 >> 2) as usize] as char);
        out.push(TABLE[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
        out.push(if chunk.len() > 1 { TABLE[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char } else { '=' });
        out.push(if chunk.len() > 2 { TABLE[(b2 & 0x3f) as usize] as char } else { '=' });
    }
    out
}

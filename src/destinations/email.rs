//! A destination that mails an HTML summary of each alert over SMTP.

use super::{default_timeout_ms, require, DestinationConfigError};
use crate::core::{Alert, DeliveryError, Destination};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use std::time::Duration;
use tera::{Context, Tera};
use tracing::debug;

pub const KIND: &str = "email";

const TEMPLATE_NAME: &str = "alert.html";

#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,
    pub from: String,
    pub to: Vec<String>,
    /// Upgrade the connection with STARTTLS. Only disable for local relays.
    #[serde(default = "default_starttls")]
    pub starttls: bool,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_starttls() -> bool {
    true
}

pub struct EmailDestination {
    name: String,
    from: Mailbox,
    to: Vec<Mailbox>,
    templates: Tera,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailDestination {
    pub fn new(name: String, settings: EmailSettings) -> Result<Self, DestinationConfigError> {
        require(KIND, "smtp_host", &settings.smtp_host)?;
        require(KIND, "smtp_user", &settings.smtp_user)?;
        require(KIND, "smtp_password", &settings.smtp_password)?;
        require(KIND, "from", &settings.from)?;
        if settings.to.is_empty() {
            return Err(DestinationConfigError::MissingSetting {
                kind: KIND,
                setting: "to",
            });
        }

        let from = parse_mailbox(&settings.from, "from")?;
        let to = settings
            .to
            .iter()
            .map(|address| parse_mailbox(address, "to"))
            .collect::<Result<Vec<_>, _>>()?;

        // Tera escapes every template whose name ends in `.html`.
        let mut templates = Tera::default();
        templates.add_raw_template(TEMPLATE_NAME, BODY_TEMPLATE)?;

        let builder = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.smtp_host)
        };
        let transport = builder
            .port(settings.smtp_port)
            .credentials(Credentials::new(
                settings.smtp_user.clone(),
                settings.smtp_password.clone(),
            ))
            .timeout(Some(Duration::from_millis(settings.timeout_ms)))
            .build();

        Ok(Self {
            name,
            from,
            to,
            templates,
            transport,
        })
    }

    pub fn subject(&self, alert: &Alert) -> String {
        let severity = alert.severity().unwrap_or_default();
        match alert.alert_name().filter(|name| !name.is_empty()) {
            Some(name) => format!("[{}] {} - {}", severity, alert.status, name),
            None => format!("[{}] Prometheus Alert - {}", severity, alert.status),
        }
    }

    pub fn body(&self, alert: &Alert) -> Result<String, DeliveryError> {
        let mut context = Context::new();
        context.insert("status", alert.status.as_str());
        context.insert("alertname", alert.alert_name().unwrap_or_default());
        context.insert("severity", alert.severity().unwrap_or_default());
        context.insert("description", &alert.description());
        context.insert("summary", &alert.summary());
        context.insert("labels", &alert.labels);
        context.insert("annotations", &alert.annotations);
        Ok(self.templates.render(TEMPLATE_NAME, &context)?)
    }

    fn message(&self, alert: &Alert) -> Result<Message, DeliveryError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(self.subject(alert))
            .header(ContentType::TEXT_HTML);
        for recipient in &self.to {
            builder = builder.to(recipient.clone());
        }
        Ok(builder.body(self.body(alert)?)?)
    }
}

fn parse_mailbox(address: &str, setting: &'static str) -> Result<Mailbox, DestinationConfigError> {
    address
        .parse()
        .map_err(|_| DestinationConfigError::InvalidSetting {
            kind: KIND,
            setting,
        })
}

#[async_trait]
impl Destination for EmailDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    async fn send(&self, alert: &Alert) -> Result<(), DeliveryError> {
        let message = self.message(alert)?;
        self.transport.send(message).await?;
        debug!(destination = %self.name, recipients = self.to.len(), "Sent alert email");
        Ok(())
    }
}

const BODY_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <style>
        body { font-family: Arial, sans-serif; }
        .alert { padding: 20px; border-radius: 5px; margin: 10px 0; }
        .alert.firing { background-color: #fee; border-left: 4px solid #d00; }
        .alert.resolved { background-color: #efe; border-left: 4px solid #0d0; }
        table { border-collapse: collapse; width: 100%; }
        th, td { padding: 8px; text-align: left; border-bottom: 1px solid #ddd; }
        th { background-color: #f2f2f2; }
    </style>
</head>
<body>
    <div class="alert {{ status }}">
        <h2>Prometheus Alert: {{ alertname }}</h2>
        <p><strong>Status:</strong> {{ status }}</p>
        <p><strong>Severity:</strong> {{ severity }}</p>
        {% if description %}<p><strong>Description:</strong> {{ description }}</p>{% endif %}
        {% if summary %}<p><strong>Summary:</strong> {{ summary }}</p>{% endif %}
        <h3>Labels</h3>
        <table>
            <tr><th>Label</th><th>Value</th></tr>
            {% for key, value in labels %}<tr><td>{{ key }}</td><td>{{ value }}</td></tr>
            {% endfor %}
        </table>
        {% if annotations %}
        <h3>Annotations</h3>
        <table>
            <tr><th>Annotation</th><th>Value</th></tr>
            {% for key, value in annotations %}<tr><td>{{ key }}</td><td>{{ value }}</td></tr>
            {% endfor %}
        </table>
        {% endif %}
    </div>
</body>
</html>
"#;

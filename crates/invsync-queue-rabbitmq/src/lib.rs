// # RabbitMQ Notification Channel
//
// Publishes snapshot notifications to a RabbitMQ queue through the broker's
// management HTTP API.
//
// ## Wire Mapping
//
// - Queue declaration: PUT `/api/queues/{vhost}/{queue}` (non-durable)
// - Publish: POST `/api/exchanges/{vhost}/amq.default/publish` with the queue
//   name as routing key
// - The run correlation travels as `correlation_id` plus `tenantId` /
//   `accountId` headers; the body is the message body unchanged
// - `"routed": false` in the response is a publish failure
//
// ## Security Requirements
//
// - The broker password NEVER appears in logs or Debug output

use async_trait::async_trait;
use invsync_core::config::NotificationConfig;
use invsync_core::traits::{Delivery, NotificationChannel, NotificationChannelFactory};
use invsync_core::{Error, ProviderRegistry, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Default HTTP timeout for management API calls
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Exchange name of the default exchange in the management API
const DEFAULT_EXCHANGE: &str = "amq.default";

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    properties: MessageProperties<'a>,
    routing_key: &'a str,
    payload: String,
    payload_encoding: &'static str,
}

#[derive(Debug, Serialize)]
struct MessageProperties<'a> {
    correlation_id: String,
    content_type: &'static str,
    headers: MessageHeaders<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageHeaders<'a> {
    tenant_id: &'a str,
    account_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    routed: bool,
}

pub struct RabbitMqChannel {
    api_url: Url,
    username: String,
    /// ⚠️ NEVER log this value
    password: String,
    vhost: String,
    queue: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for RabbitMqChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RabbitMqChannel")
            .field("api_url", &self.api_url.as_str())
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("vhost", &self.vhost)
            .field("queue", &self.queue)
            .finish()
    }
}

impl RabbitMqChannel {
    /// Create a channel for `queue` on the broker behind `api_url`
    ///
    /// No request is made; call [`declare_queue`](Self::declare_queue) to
    /// make sure the queue exists.
    pub fn new(
        api_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        vhost: impl Into<String>,
        queue: impl Into<String>,
    ) -> Result<Self> {
        let api_url = Url::parse(api_url)
            .map_err(|e| Error::config(format!("Invalid RabbitMQ API URL '{}': {}", api_url, e)))?;
        if api_url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "Invalid RabbitMQ API URL '{}'",
                api_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_url,
            username: username.into(),
            password: password.into(),
            vhost: vhost.into(),
            queue: queue.into(),
            http,
        })
    }

    /// Management API URL with each segment percent-encoded (`/` → `%2F`)
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config("RabbitMQ API URL cannot be a base"))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    /// Declare the queue as non-durable; succeeds if it already exists
    /// with the same settings
    pub async fn declare_queue(&self) -> Result<()> {
        let url = self.endpoint(&["queues", &self.vhost, &self.queue])?;
        let body = serde_json::json!({
            "durable": false,
            "auto_delete": false,
            "arguments": {}
        });

        let response = self
            .http
            .put(url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::publish(format!("Queue declaration failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::publish(format!(
                "Queue declaration for '{}' returned {}: {}",
                self.queue, status, text
            )));
        }

        info!(queue = %self.queue, vhost = %self.vhost, "RabbitMQ queue declared");
        Ok(())
    }

    fn publish_request<'a>(&'a self, delivery: &'a Delivery) -> Result<PublishRequest<'a>> {
        Ok(PublishRequest {
            properties: MessageProperties {
                correlation_id: delivery.correlation.to_string(),
                content_type: delivery.message.content_type(),
                headers: MessageHeaders {
                    tenant_id: &delivery.correlation.tenant_id,
                    account_id: &delivery.correlation.account_id,
                },
            },
            routing_key: &self.queue,
            payload: delivery.message.body()?,
            payload_encoding: "string",
        })
    }
}

#[async_trait]
impl NotificationChannel for RabbitMqChannel {
    async fn publish(&self, delivery: &Delivery) -> Result<()> {
        let url = self.endpoint(&["exchanges", &self.vhost, DEFAULT_EXCHANGE, "publish"])?;
        let request = self.publish_request(delivery)?;

        let response = self
            .http
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::publish(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::publish(format!(
                "Broker returned {}: {}",
                status, text
            )));
        }

        let outcome: PublishResponse = response
            .json()
            .await
            .map_err(|e| Error::publish(format!("Failed to parse response: {}", e)))?;
        if !outcome.routed {
            return Err(Error::publish(format!(
                "Message was not routed to queue '{}'",
                self.queue
            )));
        }

        debug!(
            queue = %self.queue,
            correlation = %delivery.correlation,
            "Notification published"
        );
        Ok(())
    }

    fn queue_name(&self) -> &str {
        &self.queue
    }
}

/// Factory for creating RabbitMQ channels
///
/// The queue is declared before the channel is handed out.
pub struct RabbitMqChannelFactory;

#[async_trait]
impl NotificationChannelFactory for RabbitMqChannelFactory {
    async fn create(&self, config: &NotificationConfig) -> Result<Box<dyn NotificationChannel>> {
        match config {
            NotificationConfig::RabbitMq {
                api_url,
                username,
                password,
                vhost,
                queue,
            } => {
                config.validate()?;
                let channel = RabbitMqChannel::new(api_url, username, password, vhost, queue)?;
                channel.declare_queue().await?;
                Ok(Box::new(channel))
            }
            _ => Err(Error::config("Invalid config for RabbitMQ channel")),
        }
    }
}

/// Register the RabbitMQ channel with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_channel("rabbitmq", Box::new(RabbitMqChannelFactory));
}

//! AMQP work queue subscription
//!
//! `amqps://` brokers are dialed with certificate and hostname validation
//! turned off so self-signed brokers are accepted. Plain `amqp://` URLs skip
//! TLS entirely.

use async_trait::async_trait;
use futures::StreamExt;
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions, BasicQosOptions, QueueDeclareOptions},
    tcp::{HandshakeError, NativeTlsConnector, TcpStream},
    types::FieldTable,
    uri::{AMQPScheme, AMQPUri},
    Channel, Connection, ConnectionProperties,
};
use tracing::{info, instrument};

use super::{DeliverySource, WorkMessage};
use crate::config::AmqpConfig;
use crate::error::QueueError;

const CLOSE_REPLY_CODE: u16 = 200;
const CLOSE_REPLY_TEXT: &str = "Bye";

/// Broker-side options applied when subscribing
#[derive(Clone)]
pub struct Subscription {
    pub declare: QueueDeclareOptions,
    pub prefetch: u16,
    pub consume: BasicConsumeOptions,
}

impl Subscription {
    /// Durable queue, bounded prefetch, manual acknowledgment
    pub fn from_config(config: &AmqpConfig) -> Self {
        Self {
            declare: QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            prefetch: config.prefetch,
            consume: BasicConsumeOptions {
                no_ack: false,
                ..Default::default()
            },
        }
    }
}

/// Subscription to one durable queue with manual acknowledgment
pub struct AmqpQueue {
    connection: Connection,
    channel: Channel,
    consumer: lapin::Consumer,
    closed: bool,
}

impl AmqpQueue {
    /// Connect, declare the queue, apply the prefetch bound and start consuming.
    ///
    /// Every failure here is a startup failure.
    #[instrument(skip(config), fields(queue = %config.queue, prefetch = config.prefetch))]
    pub async fn connect(config: &AmqpConfig) -> Result<Self, QueueError> {
        let uri: AMQPUri = config.url.parse().map_err(QueueError::InvalidUrl)?;

        let properties = ConnectionProperties::default()
            .with_executor(tokio_executor_trait::Tokio::current())
            .with_reactor(tokio_reactor_trait::Tokio);

        let connection = match uri.scheme {
            AMQPScheme::AMQPS => {
                let connector = NativeTlsConnector::builder()
                    .danger_accept_invalid_certs(true)
                    .danger_accept_invalid_hostnames(true)
                    .build()
                    .map_err(|e| QueueError::Tls(e.to_string()))?;

                Connection::connector(
                    uri,
                    Box::new(move |uri: &AMQPUri| {
                        let host = uri.authority.host.as_str();
                        TcpStream::connect((host, uri.authority.port))
                            .map_err(HandshakeError::Failure)?
                            .into_native_tls(&connector, host)
                    }),
                    properties,
                )
                .await?
            }
            AMQPScheme::AMQP => Connection::connect_uri(uri, properties).await?,
        };
        info!("Connected to broker");

        let subscription = Subscription::from_config(config);
        let channel = connection.create_channel().await?;

        channel
            .queue_declare(&config.queue, subscription.declare, FieldTable::default())
            .await?;

        channel
            .basic_qos(subscription.prefetch, BasicQosOptions::default())
            .await?;

        let consumer = channel
            .basic_consume(
                &config.queue,
                &config.consumer_tag,
                subscription.consume,
                FieldTable::default(),
            )
            .await?;

        info!(consumer_tag = %config.consumer_tag, "Subscribed to queue");

        Ok(Self {
            connection,
            channel,
            consumer,
            closed: false,
        })
    }
}

#[async_trait]
impl DeliverySource for AmqpQueue {
    async fn recv(&mut self) -> Option<Result<WorkMessage, QueueError>> {
        let delivery = self.consumer.next().await?;
        Some(
            delivery
                .map(|d| WorkMessage::new(d.delivery_tag, d.data))
                .map_err(QueueError::from),
        )
    }

    async fn ack(&mut self, delivery_tag: u64) -> Result<(), QueueError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), QueueError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.channel
            .close(CLOSE_REPLY_CODE, CLOSE_REPLY_TEXT)
            .await?;
        self.connection
            .close(CLOSE_REPLY_CODE, CLOSE_REPLY_TEXT)
            .await?;
        info!("Broker connection closed");
        Ok(())
    }
}

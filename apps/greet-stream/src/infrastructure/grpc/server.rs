//! gRPC Server Implementation
//!
//! Implements the `GreetService` gRPC service on top of the notify,
//! subscription and extraction services.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use futures::{Stream, StreamExt, stream};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};
use tonic_web::GrpcWebLayer;
use uuid::Uuid;

use super::cors::cors_layer;
use super::proto::greet::v1::{
    self as proto, ExtractEntitiesRequest, ExtractEntitiesResponse, GreetRequest, GreetResponse,
    GreetStreamRequest, GreetStreamResponse,
    greet_service_server::{GreetService, GreetServiceServer},
};
use crate::StreamSettings;
use crate::application::ports::SharedExtractor;
use crate::application::services::{
    ExtractionPipeline, NotifyService, StreamError, SubscriptionService,
};
use crate::domain::extraction::Entity;
use crate::infrastructure::broadcast::SharedBroadcaster;
use crate::infrastructure::metrics;

// =============================================================================
// Type Aliases
// =============================================================================

type RpcResult<T> = Result<Response<T>, Status>;
type BoxedStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the gRPC server.
#[derive(Debug, Clone)]
pub struct GreetServerConfig {
    /// Service version string.
    pub version: String,
    /// Response queue depth between an extraction task and its transport.
    pub outbound_capacity: usize,
}

impl Default for GreetServerConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            outbound_capacity: StreamSettings::default().outbound_capacity,
        }
    }
}

impl From<StreamSettings> for GreetServerConfig {
    fn from(settings: StreamSettings) -> Self {
        Self {
            outbound_capacity: settings.outbound_capacity,
            ..Self::default()
        }
    }
}

// =============================================================================
// Active Call Tracking
// =============================================================================

/// Counts a call as active until dropped.
struct ActiveCall(Arc<AtomicI32>);

impl ActiveCall {
    fn enter(counter: &Arc<AtomicI32>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(Arc::clone(counter))
    }
}

impl Drop for ActiveCall {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

// =============================================================================
// Server Implementation
// =============================================================================

/// gRPC server for greetings, greeting streams and entity extraction.
pub struct GreetServer {
    config: GreetServerConfig,
    broadcaster: SharedBroadcaster<String>,
    notify: NotifyService,
    subscriptions: SubscriptionService,
    pipeline: ExtractionPipeline,
    shutdown: CancellationToken,
    active_streams: Arc<AtomicI32>,
    active_extractions: Arc<AtomicI32>,
}

impl GreetServer {
    /// Create a new gRPC server.
    ///
    /// `shutdown` cancels in-flight extraction calls.
    #[must_use]
    pub fn new(
        config: GreetServerConfig,
        broadcaster: SharedBroadcaster<String>,
        extractor: SharedExtractor,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config: GreetServerConfig {
                outbound_capacity: config.outbound_capacity.max(1),
                ..config
            },
            notify: NotifyService::new(Arc::clone(&broadcaster)),
            subscriptions: SubscriptionService::new(Arc::clone(&broadcaster)),
            broadcaster,
            pipeline: ExtractionPipeline::new(extractor),
            shutdown,
            active_streams: Arc::new(AtomicI32::new(0)),
            active_extractions: Arc::new(AtomicI32::new(0)),
        }
    }

    /// Service version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.config.version
    }

    /// The broadcaster behind `Greet` and `GreetStream`.
    #[must_use]
    pub const fn broadcaster(&self) -> &SharedBroadcaster<String> {
        &self.broadcaster
    }

    /// Number of open `GreetStream` calls.
    #[must_use]
    pub fn active_streams(&self) -> i32 {
        self.active_streams.load(Ordering::Relaxed)
    }

    /// Number of open `ExtractEntities` calls.
    #[must_use]
    pub fn active_extractions(&self) -> i32 {
        self.active_extractions.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for GreetServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GreetServer")
            .field("config", &self.config)
            .field("active_streams", &self.active_streams())
            .field("active_extractions", &self.active_extractions())
            .finish_non_exhaustive()
    }
}

#[tonic::async_trait]
impl GreetService for GreetServer {
    type GreetStreamStream = BoxedStream<GreetStreamResponse>;
    type ExtractEntitiesStream = BoxedStream<ExtractEntitiesResponse>;

    async fn greet(&self, request: Request<GreetRequest>) -> RpcResult<GreetResponse> {
        let name = request.into_inner().name;
        let notification = self.notify.notify(&name);

        tracing::debug!(
            call_id = %Uuid::new_v4(),
            delivered = notification.delivery.map_or(0, |d| d.delivered),
            "Greet handled"
        );

        Ok(Response::new(GreetResponse {
            greeting: notification.greeting,
        }))
    }

    async fn greet_stream(
        &self,
        _request: Request<GreetStreamRequest>,
    ) -> RpcResult<Self::GreetStreamStream> {
        let call_id = Uuid::new_v4();
        let subscription = self.subscriptions.open().map_err(|e| {
            tracing::warn!(%call_id, error = %e, "Stream call rejected");
            metrics::record_stream_call("rejected");
            Status::from(e)
        })?;
        let subscriber_id = subscription.id();
        tracing::info!(%call_id, subscriber_id, "Stream call opened");

        let active = ActiveCall::enter(&self.active_streams);
        let names = SubscriptionService::stream(subscription, move |outcome| {
            drop(active);
            metrics::record_stream_call(outcome.as_str());
            tracing::info!(
                %call_id,
                subscriber_id,
                outcome = outcome.as_str(),
                "Stream call finished"
            );
        });

        let stream = names.map(|name| Ok::<_, Status>(GreetStreamResponse { name }));
        Ok(Response::new(Box::pin(stream) as Self::GreetStreamStream))
    }

    async fn extract_entities(
        &self,
        request: Request<Streaming<ExtractEntitiesRequest>>,
    ) -> RpcResult<Self::ExtractEntitiesStream> {
        let call_id = Uuid::new_v4();
        let inbound = request.into_inner().map(|item| {
            item.map(|req| req.text)
                .map_err(|status| StreamError::receive(status.message()))
        });

        let active = ActiveCall::enter(&self.active_extractions);
        let pipeline = self.pipeline.clone();
        let cancel = self.shutdown.child_token();
        let (tx, rx) = mpsc::channel(self.config.outbound_capacity);
        let (done_tx, done_rx) = oneshot::channel();

        tracing::info!(%call_id, "Extraction call opened");

        tokio::spawn(async move {
            let _active = active;
            let result = pipeline.run(inbound, &tx, &cancel).await;
            drop(tx);

            let status = match result {
                Ok(answered) => {
                    metrics::record_extraction_call("done");
                    tracing::info!(%call_id, answered, "Extraction call finished");
                    None
                }
                Err(e) => {
                    metrics::record_extraction_call(e.kind());
                    if e == StreamError::Cancelled {
                        tracing::info!(%call_id, "Extraction call cancelled");
                    } else {
                        tracing::warn!(%call_id, error = %e, "Extraction call failed");
                    }
                    Some(Status::from(e))
                }
            };
            // The receiver is gone if the caller already left.
            let _ = done_tx.send(status);
        });

        let responses = ReceiverStream::new(rx).map(|entities: Vec<Entity>| {
            Ok(ExtractEntitiesResponse {
                results: entities.into_iter().map(entity_to_proto).collect(),
            })
        });
        let trailer = stream::once(done_rx)
            .filter_map(|status| std::future::ready(status.ok().flatten().map(Err)));

        Ok(Response::new(
            Box::pin(responses.chain(trailer)) as Self::ExtractEntitiesStream
        ))
    }
}

// =============================================================================
// Serving
// =============================================================================

/// Serve `server` on `listener` until `shutdown` fires.
///
/// Accepts gRPC over HTTP/2 and gRPC-Web over HTTP/1.1, behind the CORS
/// layer.
///
/// # Errors
///
/// Returns the transport error if the server fails while running.
pub async fn serve(
    listener: TcpListener,
    server: Arc<GreetServer>,
    shutdown: CancellationToken,
) -> Result<(), tonic::transport::Error> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "gRPC server listening");
    }

    Server::builder()
        .accept_http1(true)
        .layer(cors_layer())
        .layer(GrpcWebLayer::new())
        .add_service(GreetServiceServer::from_arc(server))
        .serve_with_incoming_shutdown(
            TcpListenerStream::new(listener),
            shutdown.cancelled_owned(),
        )
        .await?;

    tracing::info!("gRPC server stopped");
    Ok(())
}

// =============================================================================
// Conversions
// =============================================================================

impl From<StreamError> for Status {
    fn from(err: StreamError) -> Self {
        let message = err.to_string();
        match err {
            StreamError::Closed | StreamError::Transport(_) => Self::unavailable(message),
            StreamError::Cancelled => Self::cancelled(message),
            StreamError::Engine(_) => Self::invalid_argument(message),
            StreamError::Internal(_) => Self::internal(message),
        }
    }
}

fn entity_to_proto(entity: Entity) -> proto::Entity {
    proto::Entity {
        text: entity.text,
        label: entity.label,
    }
}

// =============================================================================
// Tests
// =============================================================================

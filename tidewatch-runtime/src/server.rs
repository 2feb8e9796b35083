//! HTTP and WebSocket surface
//!
//! Routes:
//! - `POST /process_report` (multipart field `file`)
//! - `GET /initial_contacts`
//! - `GET /health`
//! - `GET /ws` live contact stream

use anyhow::Context;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use tidewatch_core::StoredContact;
use tidewatch_rag::RetrievedDocument;
use tidewatch_store::SharedStore;

use crate::{DistributionHub, IngestError, IngestService, DEFAULT_CHANNEL_CAPACITY};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:8000)
    pub bind: String,
    /// Interval between latest-contact polls on each live connection
    pub poll_secs: u64,
    /// Frames buffered per live connection
    pub channel_capacity: usize,
    /// Allowed CORS origins; empty allows any
    pub cors_origins: Vec<String>,
    /// Upload size limit in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            poll_secs: 5,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            cors_origins: Vec::new(),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppContext {
    pub ingest: Arc<IngestService>,
    pub poll_interval: Duration,
    pub channel_capacity: usize,
}

impl AppContext {
    pub fn new(ingest: Arc<IngestService>, config: &ServerConfig) -> Self {
        Self {
            ingest,
            poll_interval: Duration::from_secs(config.poll_secs.max(1)),
            channel_capacity: config.channel_capacity,
        }
    }

    fn hub(&self) -> &Arc<DistributionHub> {
        self.ingest.hub()
    }
}

#[derive(Debug, Serialize)]
struct ProcessReceipt {
    status: &'static str,
    message: String,
    contact_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    related_documents: Vec<RetrievedDocument>,
}

#[derive(Debug, Serialize)]
struct HealthReport {
    status: &'static str,
    database: &'static str,
    latest_contact: Option<StoredContact>,
    active_connections: usize,
}

#[derive(Debug, Serialize)]
struct UnhealthyReport {
    status: &'static str,
    error: String,
}

/// Build the application router
pub fn router(ctx: AppContext, config: &ServerConfig) -> anyhow::Result<Router> {
    let app = Router::new()
        .route("/process_report", post(process_report))
        .route("/process_report/", post(process_report))
        .route("/initial_contacts", get(initial_contacts))
        .route("/health", get(health))
        .route("/ws", get(ws_upgrade))
        .with_state(ctx)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(&config.cors_origins)?)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS origin {}", origin))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Bind and serve until ctrl-c
pub async fn serve(ingest: Arc<IngestService>, config: ServerConfig) -> anyhow::Result<()> {
    let ctx = AppContext::new(ingest, &config);
    let app = router(ctx, &config)?;

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;
    Ok(())
}

async fn process_report(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<Json<ProcessReceipt>, IngestError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| IngestError::BadUpload(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("report.md").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| IngestError::BadUpload(e.to_string()))?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }

    let (filename, bytes) = upload.ok_or(IngestError::MissingFile)?;
    debug!("Received upload {} ({} bytes)", filename, bytes.len());

    let outcome = ctx.ingest.ingest_upload(&filename, bytes).await?;
    Ok(Json(ProcessReceipt {
        status: "success",
        message: "Processed successfully".to_string(),
        contact_count: outcome.extracted,
        related_documents: outcome.related_documents,
    }))
}

async fn initial_contacts(
    State(ctx): State<AppContext>,
) -> Result<Json<Vec<StoredContact>>, IngestError> {
    let contacts = ctx.ingest.store().all_valid().await?;
    Ok(Json(contacts))
}

async fn health(State(ctx): State<AppContext>) -> Response {
    let store = ctx.ingest.store();
    let latest = match store.ping().await {
        Ok(()) => store.latest().await,
        Err(e) => Err(e),
    };

    match latest {
        Ok(latest_contact) => Json(HealthReport {
            status: "healthy",
            database: "connected",
            latest_contact,
            active_connections: ctx.hub().subscriber_count(),
        })
        .into_response(),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(UnhealthyReport {
                    status: "unhealthy",
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(ctx): State<AppContext>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

/// Frame for one poll tick: the latest stored contact, if any
async fn poll_frame(store: &SharedStore) -> Option<String> {
    match store.latest().await {
        Ok(Some(latest)) => match serde_json::to_string(&latest) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!("Failed to encode latest contact: {}", e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!("Latest-contact poll failed: {}", e);
            None
        }
    }
}

/// One live subscriber: pushed contacts, periodic latest-contact polls,
/// and inbound frames watched only for disconnect.
async fn handle_socket(socket: WebSocket, ctx: AppContext) {
    let (id, mut frames) = ctx.hub().connect_channel(ctx.channel_capacity);
    let (mut sink, mut stream) = socket.split();
    let mut ticker = tokio::time::interval(ctx.poll_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(frame) = poll_frame(ctx.ingest.store()).await else { continue };
                if sink.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            pushed = frames.recv() => {
                // None: the hub dropped this subscriber
                let Some(frame) = pushed else { break };
                if sink.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    ctx.hub().disconnect(id);
    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use async_trait::async_trait;
    use serde_json::Map;
    use tidewatch_core::{Contact, ContactAssembler, Coordinates};
    use tidewatch_intake::{create_ocr, OcrConfig};
    use tidewatch_rag::{
        Document, Embedder, FlatL2Index, IndexConfig, RagArtifacts, RagError, Retriever,
    };
    use tidewatch_store::{ContactStore, MemoryContactStore};

    const BOUNDARY: &str = "tidewatch-test-boundary";

    /// Every text embeds to the origin
    struct OriginEmbedder;

    #[async_trait]
    impl Embedder for OriginEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, RagError> {
            Ok(vec![0.0, 0.0])
        }

        fn model_name(&self) -> &str {
            "origin"
        }
    }

    fn ingest_service() -> IngestService {
        IngestService::new(
            ContactAssembler::default(),
            Arc::new(MemoryContactStore::new()),
            Arc::new(DistributionHub::new()),
            create_ocr(OcrConfig::default()),
        )
    }

    fn app_with(ingest: IngestService) -> Router {
        let config = ServerConfig::default();
        router(AppContext::new(Arc::new(ingest), &config), &config).unwrap()
    }

    fn app() -> Router {
        app_with(ingest_service())
    }

    fn positioned(vessel_type: &str, latitude: f64) -> Contact {
        Contact::new(vessel_type, "2024-10-20T05:30:00Z")
            .with_position(Some(Coordinates::new(latitude, 20.0)))
    }

    fn upload(path: &str, field: &str, filename: &str, content: &[u8]) -> Request<Body> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: text/markdown\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_process_report_then_query() {
        let app = app();
        let report = "1. Tanker at 10°00'N, 20°00'E.\n2. Fishing boat, position unknown.";

        let response = app
            .clone()
            .oneshot(upload("/process_report/", "file", "report.md", report.as_bytes()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let receipt = json_body(response).await;
        assert_eq!(receipt["status"], "success");
        assert_eq!(receipt["contact_count"], 2);

        let response = app
            .clone()
            .oneshot(Request::get("/initial_contacts").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let contacts = json_body(response).await;
        assert_eq!(contacts.as_array().unwrap().len(), 1);
        assert_eq!(contacts[0]["type"], "tanker");
        assert_eq!(contacts[0]["id"], 1);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let health = json_body(response).await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["database"], "connected");
        assert_eq!(health["latest_contact"]["type"], "tanker");
        assert_eq!(health["active_connections"], 0);
        assert!(receipt.get("related_documents").is_none());
    }

    #[tokio::test]
    async fn test_receipt_carries_related_documents() {
        let artifacts = RagArtifacts {
            config: IndexConfig {
                embedding_model: "origin".to_string(),
                embedding_dim: 2,
            },
            index: FlatL2Index::new(2, vec![vec![3.0, 4.0]]).unwrap(),
            documents: vec![Document {
                text: "Piracy advisory, Gulf of Aden".to_string(),
                metadata: Map::new(),
            }],
        };
        let retriever = Retriever::new(artifacts, Arc::new(OriginEmbedder));
        let app = app_with(ingest_service().with_retriever(Arc::new(retriever)));

        let report = "Tanker at 10°00'N, 20°00'E.";
        let response = app
            .oneshot(upload("/process_report", "file", "report.md", report.as_bytes()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let receipt = json_body(response).await;
        assert_eq!(receipt["contact_count"], 1);
        assert_eq!(receipt["related_documents"][0]["rank"], 1);
        assert_eq!(receipt["related_documents"][0]["distance"], 25.0);
        assert_eq!(receipt["related_documents"][0]["text"], "Piracy advisory, Gulf of Aden");
    }

    #[tokio::test]
    async fn test_poll_frame_sends_latest_stored() {
        let store: SharedStore = Arc::new(MemoryContactStore::new());
        assert!(poll_frame(&store).await.is_none());

        store.store(&positioned("tanker", 10.0)).await.unwrap();
        store.store(&positioned("yacht", 11.0)).await.unwrap();

        let frame: StoredContact = serde_json::from_str(&poll_frame(&store).await.unwrap()).unwrap();
        assert_eq!(frame.id, 2);
        assert_eq!(frame.contact.vessel_type, "yacht");
        assert_eq!(frame.contact.latitude, Some(11.0));
    }

    #[tokio::test]
    async fn test_poll_frame_skips_unpositioned_contacts() {
        let store: SharedStore = Arc::new(MemoryContactStore::new());
        store.store(&Contact::new("fishing boat", "2024-10-20T05:30:00Z")).await.unwrap();
        assert!(poll_frame(&store).await.is_none());
    }

    #[tokio::test]
    async fn test_bad_uploads_are_rejected() {
        let app = app();

        let response = app
            .clone()
            .oneshot(upload("/process_report", "file", "report.md", &[0xff, 0xfe, 0xfd]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["status"], "error");

        let response = app
            .oneshot(upload("/process_report", "other", "report.md", b"Tanker"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_invalid_cors_origin_rejected() {
        assert!(cors_layer(&["http://localhost:8080".to_string()]).is_ok());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }
}

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::chat::{self, AnalysisListener, ConversationLog, Message};
use crate::downloader;
use crate::gemini::{GeminiClient, GeminiConfig};
use crate::loader;
use crate::table::DataTable;

pub struct AppState {
    session: Mutex<Session>,
    backend: GeminiClient,
    on_analysis: Option<AnalysisListener>,
}

#[derive(Default)]
struct Session {
    table: Option<DataTable>,
    source_name: Option<String>,
    log: ConversationLog,
}

#[derive(Deserialize)]
struct HeadersUpdate {
    headers: Vec<String>,
}

#[derive(Deserialize)]
struct ChatRequest {
    query: String,
}

/// Start the server on `addr`.
///
/// The Gemini configuration and the optional analysis listener are supplied
/// by the caller; handlers reach them through the shared state only.
pub async fn run(
    config: GeminiConfig,
    addr: SocketAddr,
    on_analysis: Option<AnalysisListener>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app_state = Arc::new(AppState {
        session: Mutex::new(Session::default()),
        backend: GeminiClient::new(config),
        on_analysis,
    });

    let app = router(app_state);

    let listener = TcpListener::bind(addr).await?;
    log::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/api/upload", post(upload_file))
        .route("/api/table", get(get_table))
        .route("/api/headers", post(update_headers))
        .route("/api/messages", get(get_messages))
        .route("/api/chat", post(post_chat))
        .route("/api/export", get(export_csv))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let mut file_data = Vec::new();
    let mut file_name = String::new();

    while let Some(field) = multipart.next_field().await.unwrap_or(None) {
        if field.name() == Some("file") {
            file_name = field.file_name().unwrap_or("upload").to_string();
            file_data = field.bytes().await.unwrap_or_default().to_vec();
        }
    }

    if file_data.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No file data received");
    }

    match loader::from_bytes(&file_data, &file_name) {
        Ok(table) => {
            let mut session = state.session.lock().unwrap();
            let response = Json(serde_json::json!({
                "status": "ok",
                "file_name": file_name,
                "headers": table.headers(),
                "row_count": table.row_count(),
                "column_count": table.column_count(),
            }))
            .into_response();

            session.table = Some(table);
            session.source_name = Some(file_name);
            response
        }
        // Upload state is untouched on failure; the previous table stays.
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

async fn get_table(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.session.lock().unwrap();

    match &session.table {
        Some(table) => Json(serde_json::json!({
            "file_name": session.source_name,
            "headers": table.headers(),
            "rows": table.records(),
            "row_count": table.row_count(),
            "column_count": table.column_count(),
        })),
        None => Json(serde_json::json!({
            "file_name": null,
            "headers": [],
            "rows": [],
            "row_count": 0,
            "column_count": 0,
        })),
    }
}

async fn update_headers(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<HeadersUpdate>,
) -> impl IntoResponse {
    let mut session = state.session.lock().unwrap();

    match &mut session.table {
        Some(table) => {
            table.rename_headers(&payload.headers);
            Json(serde_json::json!({
                "status": "ok",
                "headers": table.headers(),
            }))
            .into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, "No spreadsheet has been uploaded"),
    }
}

async fn get_messages(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.session.lock().unwrap();
    Json(serde_json::json!({ "messages": session.log.messages() }))
}

async fn post_chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> impl IntoResponse {
    let query = payload.query.trim().to_string();
    if query.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Query must not be empty");
    }

    // Snapshot the table and record the user message without holding the
    // lock across the outbound call.
    let (snapshot, user_message) = {
        let mut session = state.session.lock().unwrap();
        let table = match &session.table {
            Some(table) if !table.is_empty() => table.clone(),
            _ => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "Please upload a spreadsheet file to begin analysis",
                );
            }
        };
        let message = Message::user(query.clone());
        session.log.push(message.clone());
        (table, message)
    };

    let assistant = chat::dispatch(&state.backend, &snapshot, &query).await;

    if let (Some(listener), Some(calculation)) = (&state.on_analysis, &assistant.calculation) {
        listener(&query, calculation);
    }

    let mut session = state.session.lock().unwrap();
    session.log.push(assistant.clone());

    Json(serde_json::json!({
        "status": "ok",
        "messages": [user_message, assistant],
    }))
    .into_response()
}

async fn export_csv(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.session.lock().unwrap();

    let Some(table) = &session.table else {
        return error_response(StatusCode::NOT_FOUND, "No spreadsheet has been uploaded");
    };

    let csv = downloader::to_csv(table);
    let filename =
        downloader::export_filename(session.source_name.as_deref().unwrap_or("table"));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(axum::body::Body::from(csv))
        .unwrap()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "status": "error",
            "message": message,
        })),
    )
        .into_response()
}

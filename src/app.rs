use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::downloader::{self, CSV_FILE_NAME};
use crate::options::{ListOptions, estimated_choices};
use crate::qr;
use crate::share::{
    PayloadIssuer, Redemption, ShareService, SignedUrlIssuer, Strategy, TokenIssuer, TokenStore,
};
use crate::sheet::{SheetOptions, TaskSheet};
use crate::task::{COLUMNS, Defaults, TaskInput};

/// Largest request body accepted, in bytes.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub struct AppState {
    sheet: Mutex<TaskSheet>,
    defaults: Mutex<Defaults>,
    options: ListOptions,
    share: ShareService,
    config: AppConfig,
    clock: Arc<dyn Clock>,
}

impl AppState {
    /// State for one server process; defaults start as "due tomorrow".
    pub fn new(config: AppConfig, options: ListOptions, share: ShareService, clock: Arc<dyn Clock>) -> Self {
        let today = clock.now().with_timezone(&Local).date_naive();
        AppState {
            sheet: Mutex::new(TaskSheet::new()),
            defaults: Mutex::new(Defaults::for_today(today)),
            options,
            share,
            config,
            clock,
        }
    }

    fn sheet(&self) -> MutexGuard<'_, TaskSheet> {
        self.sheet.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn defaults(&self) -> MutexGuard<'_, Defaults> {
        self.defaults.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current table resolved and encoded as a CSV file.
    fn export_bytes(&self) -> (Vec<u8>, usize) {
        let defaults = self.defaults().clone();
        let rows = self.sheet().export(&defaults);
        (downloader::export_csv(&rows, self.config.csv_encoding), rows.len())
    }
}

#[derive(Deserialize)]
struct LinkQuery {
    token: Option<String>,
    payload: Option<String>,
}

#[derive(Deserialize)]
struct BulkRequest {
    text: String,
}

#[derive(Serialize)]
struct SheetResponse {
    columns: [&'static str; 7],
    rows: Vec<TaskInput>,
    defaults: Defaults,
    options: SheetOptions,
    estimated_choices: Vec<String>,
}

#[derive(Serialize)]
struct BulkResponse {
    added: usize,
    rows: Vec<TaskInput>,
}

#[derive(Serialize)]
struct PreviewResponse {
    columns: [&'static str; 7],
    rows: Vec<[String; 7]>,
}

#[derive(Serialize)]
struct ShareResponse {
    status: &'static str,
    url: String,
    strategy: Strategy,
    expires_at: DateTime<Utc>,
    remaining_seconds: i64,
    ttl_minutes: i64,
    warning: Option<String>,
    qr_svg: Option<String>,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

/// Assemble the link issuers in priority order.
///
/// `token_base` is where `?token=` links point when no public URL is set,
/// normally the LAN address of this machine.
pub fn build_share_service(config: &AppConfig, token_base: &str, clock: Arc<dyn Clock>) -> ShareService {
    let store = Arc::new(TokenStore::new(clock.clone()));
    let mut service = ShareService::new(store.clone(), clock.clone());

    if let Some(storage) = &config.storage {
        match SignedUrlIssuer::new(storage.clone(), clock.clone()) {
            Ok(issuer) => service = service.with_issuer(issuer),
            Err(e) => log::warn!("object storage disabled: {}", e),
        }
    }

    if let Some(public_url) = &config.public_url {
        service = service.with_issuer(PayloadIssuer::new(
            public_url.clone(),
            config.payload_link_limit,
            clock.clone(),
        ));
    }

    let base = config.public_url.as_deref().unwrap_or(token_base);
    service.with_issuer(TokenIssuer::new(base, store))
}

/// All routes over `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(serve_builder))
        .route("/api/sheet", get(get_sheet_data))
        .route("/api/rows", put(replace_rows).delete(clear_rows))
        .route("/api/rows/bulk", post(bulk_add))
        .route("/api/defaults", put(set_defaults))
        .route("/api/preview", get(preview))
        .route("/api/export", get(export_csv))
        .route("/api/share", post(create_share_link))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(&config.bind).await?;
    let port = listener.local_addr()?.port();

    let lan_base = match local_ip_address::local_ip() {
        Ok(ip) => format!("http://{}:{}", ip, port),
        Err(e) => {
            log::warn!("could not determine LAN address ({}), links will use localhost", e);
            format!("http://127.0.0.1:{}", port)
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let options = ListOptions::load(&config.list_options_path);
    let share = build_share_service(&config, &lan_base, clock.clone());
    log::info!(
        "share strategies: {}",
        share
            .strategies()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    let app_state = Arc::new(AppState::new(config.clone(), options, share, clock));
    let app = router(app_state);

    log::info!("Listening on {} (LAN: {})", config.bind, lan_base);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_builder(Query(params): Query<LinkQuery>, State(state): State<Arc<AppState>>) -> Response {
    let token = params.token.filter(|t| !t.trim().is_empty());
    let payload = params.payload.filter(|p| !p.trim().is_empty());

    let redemption = match (token, payload) {
        (Some(token), _) => state.share.redeem_token(&token),
        (None, Some(payload)) => state.share.redeem_payload(payload.trim()),
        (None, None) => return Html(include_str!("./static/builder.html")).into_response(),
    };

    let message = redemption.message();
    match redemption {
        Redemption::Ready(download) => {
            log::info!("serving shared download {} ({} bytes)", download.filename, download.data.len());
            csv_attachment(download.data, &download.filename, state.config.csv_encoding)
        }
        Redemption::Expired { .. } => error_page(StatusCode::GONE, message),
        Redemption::NotFound => error_page(StatusCode::NOT_FOUND, message),
        Redemption::Invalid => error_page(StatusCode::BAD_REQUEST, message),
    }
}

async fn get_sheet_data(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(sheet_response(&state))
}

async fn replace_rows(State(state): State<Arc<AppState>>, Json(rows): Json<Vec<TaskInput>>) -> impl IntoResponse {
    state.sheet().replace_rows(rows);
    Json(sheet_response(&state))
}

async fn bulk_add(State(state): State<Arc<AppState>>, Json(request): Json<BulkRequest>) -> impl IntoResponse {
    let defaults = state.defaults().clone();
    let mut sheet = state.sheet();
    let added = sheet.append_lines(&request.text, &defaults);
    log::debug!("bulk entry added {} row(s)", added);

    Json(BulkResponse {
        added,
        rows: sheet.rows().to_vec(),
    })
}

async fn clear_rows(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.sheet().clear();
    Json(StatusResponse {
        status: "success".to_string(),
        message: None,
    })
}

async fn set_defaults(State(state): State<Arc<AppState>>, Json(defaults): Json<Defaults>) -> impl IntoResponse {
    let defaults = defaults.normalized();
    *state.defaults() = defaults.clone();
    Json(defaults)
}

async fn preview(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let defaults = state.defaults().clone();
    let rows = state.sheet().export(&defaults);

    Json(PreviewResponse {
        columns: COLUMNS,
        rows: rows.iter().map(|row| row.to_record()).collect(),
    })
}

async fn export_csv(State(state): State<Arc<AppState>>) -> Response {
    let (bytes, count) = state.export_bytes();
    log::info!("exporting {} task(s) as {}", count, state.config.csv_encoding);
    csv_attachment(bytes, CSV_FILE_NAME, state.config.csv_encoding)
}

async fn create_share_link(State(state): State<Arc<AppState>>) -> Response {
    let (bytes, _) = state.export_bytes();
    let ttl_minutes = state.config.share_ttl_minutes;

    match state.share.issue(&bytes, CSV_FILE_NAME, ttl_minutes).await {
        Ok(link) => {
            let qr_svg = match qr::to_svg(&link.url) {
                Ok(svg) => Some(svg),
                Err(e) => {
                    log::warn!("QR code unavailable for a {}-character link: {}", link.url.len(), e);
                    None
                }
            };

            let remaining_seconds = (link.expires_at - state.clock.now()).num_seconds().max(0);
            Json(ShareResponse {
                status: "success",
                url: link.url,
                strategy: link.strategy,
                expires_at: link.expires_at,
                remaining_seconds,
                ttl_minutes,
                warning: link.warning,
                qr_svg,
            })
            .into_response()
        }
        Err(e) => {
            log::error!("share link creation failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(StatusResponse {
                    status: "error".to_string(),
                    message: Some(e.to_string()),
                }),
            )
                .into_response()
        }
    }
}

fn sheet_response(state: &AppState) -> SheetResponse {
    let defaults = state.defaults().clone();
    let sheet = state.sheet();

    SheetResponse {
        columns: COLUMNS,
        rows: sheet.rows().to_vec(),
        options: sheet.options(&state.options, &defaults),
        defaults,
        estimated_choices: estimated_choices(),
    }
}

fn csv_attachment(data: Vec<u8>, filename: &str, encoding: downloader::CsvEncoding) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', ""));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, encoding.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        data,
    )
        .into_response()
}

fn error_page(status: StatusCode, message: &str) -> Response {
    let body = format!(
        "<!DOCTYPE html>\n<html lang=\"ja\">\n<head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <title>CSV download</title></head>\n<body style=\"font-family: sans-serif; margin: 2rem;\">\
         <h1>CSV download</h1><p>{}</p></body>\n</html>\n",
        message
    );
    (status, Html(body)).into_response()
}

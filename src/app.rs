use axum::{
    Json, Router,
    extract::{Multipart, Query, State},
    http::{StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use log::{error, info, warn};
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::chart::{ChartData, ChartOptions, ChartType, Dimension, render_png};
use crate::dataset::{CourseSelection, Dataset};
use crate::export;
use crate::login;
use crate::saving;
use crate::upload;

pub struct AppState {
    dataset: Mutex<Dataset>,

    /// Snapshot file the dataset is persisted to after every upload
    dataset_path: String,
}

#[derive(Deserialize)]
struct AllDataQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct DwfRatesRequest {
    part: String,
}

#[derive(Deserialize)]
struct ChartRequest {
    chart_type: ChartType,
    dimension: Dimension,
    courses: Vec<CourseSelection>,
    title: Option<String>,
}

#[derive(Deserialize)]
struct ExportQuery {
    format: Option<String>,
}

/// Server configuration, read from the environment.
pub struct Config {
    pub bind_addr: String,
    pub dataset_path: String,
}

impl Config {
    pub fn from_env() -> Config {
        Config {
            bind_addr: std::env::var("STEMDASH_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string()),
            dataset_path: std::env::var("STEMDASH_DATA")
                .unwrap_or_else(|_| "database/dataset.bin.gz".to_string()),
        }
    }
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    login::init_database()?;

    // Reload the last persisted dataset, if any.
    let dataset = match saving::load_dataset(&config.dataset_path) {
        Ok(dataset) => {
            info!(
                "loaded dataset: {} students, {} class rows",
                dataset.total_students(),
                dataset.total_rows()
            );
            dataset
        }
        Err(_) => {
            warn!("no dataset snapshot at {}, starting empty", config.dataset_path);
            Dataset::new()
        }
    };

    let app_state = Arc::new(AppState {
        dataset: Mutex::new(dataset),
        dataset_path: config.dataset_path,
    });

    // Pages and APIs behind a session; everything else is the auth surface.
    let protected = Router::new()
        .route("/dashboard", get(serve_dashboard))
        .route("/data", get(serve_data))
        .route("/visualizations", get(serve_visualizations))
        .route("/admin", get(serve_admin))
        .route("/all-data", get(all_data))
        .route("/dashboard-data", get(dashboard_data))
        .route("/average-dwf-rates", post(average_dwf_rates))
        .route("/course-semester-mapping", get(course_semester_mapping))
        .route("/api/chart", post(build_chart))
        .route("/admin-data", get(admin_data))
        .route("/api/users", get(list_users))
        .route("/upload", post(upload_workbook))
        .route("/export", get(export_dataset))
        .route_layer(middleware::from_fn(login::require_auth));

    let app = Router::new()
        .route("/", get(serve_login))
        .route("/login", get(serve_login).post(login::handle_login))
        .route("/register", get(serve_register).post(login::handle_register))
        .route("/otp", get(serve_otp).post(login::handle_otp))
        .route("/reset", get(serve_reset).post(login::handle_reset))
        .route("/sendreset", post(login::handle_send_reset))
        .route("/logout", post(login::handle_logout))
        .merge(protected)
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_login() -> Html<&'static str> {
    Html(include_str!("./static/login.html"))
}

async fn serve_register() -> Html<&'static str> {
    Html(include_str!("./static/register.html"))
}

async fn serve_otp() -> Html<&'static str> {
    Html(include_str!("./static/otp.html"))
}

async fn serve_reset() -> Html<&'static str> {
    Html(include_str!("./static/reset.html"))
}

async fn serve_dashboard() -> Html<&'static str> {
    Html(include_str!("./static/dashboard.html"))
}

async fn serve_data() -> Html<&'static str> {
    Html(include_str!("./static/data.html"))
}

async fn serve_visualizations() -> Html<&'static str> {
    Html(include_str!("./static/visualizations.html"))
}

async fn serve_admin() -> Html<&'static str> {
    Html(include_str!("./static/admin.html"))
}

/// Flattened class records for the data page table.
///
/// An out-of-range `limit` is a client error, reported as 400 with the
/// message the table script surfaces.
async fn all_data(
    Query(params): Query<AllDataQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let dataset = state.dataset.lock().unwrap();

    match dataset.records(params.limit) {
        Ok(records) => Json(records).into_response(),
        Err(message) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"message": message})),
        )
            .into_response(),
    }
}

/// Headline numbers for the dashboard page.
async fn dashboard_data(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let dataset = state.dataset.lock().unwrap();

    Json(serde_json::json!({
        "total_students": dataset.total_students(),
        "avg_gpa": dataset.avg_gpa(),
        "avg_high_school_gpa": dataset.avg_high_school_gpa(),
        "avg_dwf": dataset.avg_dwf(),
    }))
}

/// The five courses with the highest or lowest DWF rates.
async fn average_dwf_rates(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DwfRatesRequest>,
) -> Response {
    if body.part != "highest" && body.part != "lowest" {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"message": "part must be highest or lowest"})),
        )
            .into_response();
    }

    let dataset = state.dataset.lock().unwrap();
    Json(dataset.dwf_extremes(&body.part)).into_response()
}

/// Course number to offered-terms mapping for the visualization dropdowns.
async fn course_semester_mapping(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let dataset = state.dataset.lock().unwrap();
    Json(dataset.course_semester_mapping())
}

/// Buckets the selected courses along the requested dimension and renders
/// the chart as a PNG.
async fn build_chart(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChartRequest>,
) -> Response {
    if body.courses.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"message": "No courses selected"})),
        )
            .into_response();
    }

    let series = {
        let dataset = state.dataset.lock().unwrap();
        dataset.course_series(body.dimension, &body.courses)
    };

    let data = ChartData::build(body.dimension, &series);
    let options = ChartOptions {
        title: body
            .title
            .unwrap_or_else(|| format!("Students by {}", body.dimension.label())),
        chart_type: body.chart_type,
        ..ChartOptions::default()
    };

    match render_png(&data, &options) {
        Ok(png) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "image/png")
            .body(axum::body::Body::from(png))
            .unwrap(),
        Err(e) => {
            error!("chart rendering failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"message": "Failed to render chart"})),
            )
                .into_response()
        }
    }
}

/// Summary counts for the admin page: accounts, administrators, students
/// and class rows. Administrators only.
async fn admin_data(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if !is_admin_request(&jar) {
        return forbidden();
    }

    let users = match login::get_users() {
        Ok(users) => users,
        Err(message) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"message": message})),
            )
                .into_response();
        }
    };
    let (total_users, total_admins) = login::account_counts(&users);

    let dataset = state.dataset.lock().unwrap();
    Json(serde_json::json!({
        "total_users": total_users,
        "total_admins": total_admins,
        "total_students": dataset.total_students(),
        "total_rows": dataset.total_rows(),
    }))
    .into_response()
}

/// User table for the admin page. Administrators only.
async fn list_users(jar: CookieJar) -> Response {
    if !is_admin_request(&jar) {
        return forbidden();
    }

    match login::user_summaries() {
        Ok(summaries) => Json(summaries).into_response(),
        Err(message) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"message": message})),
        )
            .into_response(),
    }
}

/// Ingests an uploaded Excel workbook into the dataset. Administrators only.
///
/// Validation failures do not abort the upload; the valid rows are kept and
/// the failures come back as a 400 with one message per bad row.
async fn upload_workbook(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Response {
    if !is_admin_request(&jar) {
        return forbidden();
    }

    let mut file_data = Vec::new();
    let mut file_name = String::new();
    while let Some(field) = multipart.next_field().await.unwrap_or(None) {
        if field.name().unwrap_or("unknown") == "file" {
            file_name = field.file_name().unwrap_or_default().to_string();
            file_data = field.bytes().await.unwrap_or_default().to_vec();
        }
    }

    if file_data.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"message": "No file data received"})),
        )
            .into_response();
    }

    // A .csv upload carries class rows for students already in the dataset;
    // anything else is parsed as a full workbook.
    let errors = {
        let mut dataset = state.dataset.lock().unwrap();
        let result = if file_name.to_lowercase().ends_with(".csv") {
            String::from_utf8(file_data)
                .map_err(|e| e.into())
                .and_then(|text| upload::ingest_class_data_csv(&text, &mut dataset))
        } else {
            upload::ingest_workbook(&file_data, &mut dataset)
        };
        match result {
            Ok(errors) => errors,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({
                        "message": format!("Failed to read upload: {}", e)
                    })),
                )
                    .into_response();
            }
        }
    };

    persist_dataset(&state);

    if errors.is_empty() {
        (StatusCode::OK, Json(serde_json::json!({"message": "Upload complete"})))
            .into_response()
    } else {
        let messages: Vec<String> = errors
            .iter()
            .map(|e| format!("{} (row {})", e.message, e.row))
            .collect();
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"errors": messages})),
        )
            .into_response()
    }
}

/// Streams the dataset back as a CSV or XLSX download. Administrators only.
async fn export_dataset(
    Query(params): Query<ExportQuery>,
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Response {
    if !is_admin_request(&jar) {
        return forbidden();
    }

    let dataset = state.dataset.lock().unwrap();
    let format = params.format.as_deref().unwrap_or("csv");

    let (bytes, content_type, filename) = match format {
        "xlsx" => match export::to_xlsx(&dataset) {
            Ok(bytes) => (
                bytes,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "class_data.xlsx",
            ),
            Err(e) => return export_error(e),
        },
        _ => match export::to_csv(&dataset) {
            Ok(csv) => (csv.into_bytes(), "text/csv", "class_data.csv"),
            Err(e) => return export_error(e),
        },
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(axum::body::Body::from(bytes))
        .unwrap()
}

fn export_error(e: Box<dyn std::error::Error>) -> Response {
    error!("export failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"message": "Export failed"})),
    )
        .into_response()
}

fn is_admin_request(jar: &CookieJar) -> bool {
    login::current_user(jar).map(|u| u.is_admin).unwrap_or(false)
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(serde_json::json!({"message": "Admin access required"})),
    )
        .into_response()
}

fn persist_dataset(state: &Arc<AppState>) {
    let dataset = state.dataset.lock().unwrap();
    if let Err(e) = saving::save_dataset(&dataset, &state.dataset_path) {
        error!("failed to persist dataset: {}", e);
    }
}

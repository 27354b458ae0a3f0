use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use log::info;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

mod handlers;
mod logic;
mod sessions;
mod state;

use crate::handlers::{apply_handler, cancel_handler, open_handler, result_handler, ws_handler};
use crate::logic::expire_sessions;
use crate::state::AppState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Directory holding index.html and the built wasm package.
    #[arg(long)]
    public_dir: Option<PathBuf>,
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,
    /// Unanswered crop sessions are dropped after this many seconds.
    #[arg(long, default_value_t = 300)]
    session_ttl_secs: u64,
    /// How long a result request waits for the user.
    #[arg(long, default_value_t = 60)]
    result_timeout_secs: u64,
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<PathBuf>,
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<PathBuf>,
}

fn router(state: AppState, public_dir: PathBuf) -> Router {
    Router::new()
        .route("/irregular_cropper/open", post(open_handler))
        .route("/irregular_cropper/result/:session_id", get(result_handler))
        .route("/irregular_cropper/apply", post(apply_handler))
        .route("/irregular_cropper/cancel", post(cancel_handler))
        .route("/ws", get(ws_handler))
        .fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache"),
        ))
        .with_state(state)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let state = AppState::new(
        Duration::from_secs(args.session_ttl_secs),
        Duration::from_secs(args.result_timeout_secs),
    );
    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            expire_sessions(&sweep_state, Instant::now()).await;
        }
    });

    let public_dir = args
        .public_dir
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../public"));
    let app = router(state, public_dir);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    match (args.tls_cert, args.tls_key) {
        (Some(cert), Some(key)) => {
            let config = RustlsConfig::from_pem_file(cert, key).await?;
            info!("Cropper running at https://localhost:{}", args.port);
            axum_server::bind_rustls(addr, config)
                .serve(app.into_make_service())
                .await
        }
        _ => {
            info!("Cropper running at http://localhost:{}", args.port);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await
        }
    }
}

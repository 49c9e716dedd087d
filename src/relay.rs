use crate::assets::LocalAssetStore;
use crate::config::Config;
use crate::error::{body_response, text_response, upstream_status, RelayError};
use crate::rewrite::ContentRewriter;
use crate::upstream::UpstreamFetcher;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const BUNDLE_PATH: &str = "/bundle.js";
const BUNDLE_UPSTREAM: &str = "bundle.js";
const STATIC_PREFIX: &str = "/static/";

/// Content type used when the upstream omits one on an asset
const DEFAULT_ASSET_CONTENT_TYPE: &str = "image/svg+xml";

type RelayResponse = Response<Full<Bytes>>;

/// Immutable per-process state shared by every request
#[derive(Debug)]
pub struct RelayState {
    pub config: Arc<Config>,
    pub fetcher: UpstreamFetcher,
    pub rewriter: ContentRewriter,
    pub assets: LocalAssetStore,
}

impl RelayState {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            fetcher: UpstreamFetcher::new(config.upstream.base_url.clone()),
            rewriter: ContentRewriter::from_config(&config),
            assets: LocalAssetStore::new(&config.assets.root),
            config,
        }
    }
}

/// Where an inbound path is dispatched
#[derive(Debug, PartialEq, Eq)]
pub enum Route<'a> {
    /// `/proxy?id=...`
    Page,
    /// `/proxy/<rest>`, local first then upstream
    Asset(&'a str),
    /// `/bundle.js`, always upstream
    Bundle,
    /// `/static/<rest>`, local only
    Static(&'a str),
    /// `/<rest>`, local first then upstream
    Fallback(&'a str),
    NotFound,
}

impl<'a> Route<'a> {
    pub fn classify(path: &'a str, config: &Config) -> Self {
        let mount_prefix = config.upstream.mount_prefix.as_str();

        if path == config.upstream.page_path() {
            return Route::Page;
        }
        if let Some(rest) = path.strip_prefix(mount_prefix) {
            return non_empty(rest).map_or(Route::NotFound, Route::Asset);
        }
        if path == BUNDLE_PATH {
            return Route::Bundle;
        }
        if let Some(rest) = path.strip_prefix(STATIC_PREFIX) {
            return non_empty(rest).map_or(Route::NotFound, Route::Static);
        }
        path.strip_prefix('/')
            .and_then(non_empty)
            .map_or(Route::NotFound, Route::Fallback)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// Percent-decode a path segment, keeping the raw text if it is not UTF-8
pub fn decode_path(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// First value of a form-encoded query parameter
pub fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    let decode = |s: &str| decode_path(&s.replace('+', " "));

    query?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (decode(key) == name).then(|| decode(value))
    })
}

/// HTTP front end of the relay
pub struct RelayServer {
    bind_addr: SocketAddr,
    state: Arc<RelayState>,
    shutdown_rx: watch::Receiver<bool>,
}

impl RelayServer {
    pub fn new(bind_addr: SocketAddr, config: Arc<Config>, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            bind_addr,
            state: Arc::new(RelayState::new(config)),
            shutdown_rx,
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.serve(listener).await
    }

    /// Accept connections on an already-bound listener until shutdown
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let local_addr = listener.local_addr()?;
        info!(
            addr = %local_addr,
            upstream = %self.state.fetcher.base_url(),
            assets = %self.state.assets.root().display(),
            "Relay listening"
        );

        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let state = Arc::clone(&self.state);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, addr, state).await {
                                    debug!(addr = %addr, error = %e, "Connection error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Relay shutting down");
                        break;
                    }
                }
            }
        }

        Ok(())
    }
}

async fn handle_connection<S>(stream: S, addr: SocketAddr, state: Arc<RelayState>) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);

    let service = service_fn(move |req: Request<Incoming>| {
        let state = Arc::clone(&state);
        async move { handle_request(req, state, addr).await }
    });

    AutoBuilder::new(TokioExecutor::new())
        .serve_connection(io, service)
        .await
        .map_err(|e| anyhow::anyhow!("Connection error: {}", e))?;

    Ok(())
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<RelayState>,
    client_addr: SocketAddr,
) -> Result<RelayResponse, hyper::Error> {
    let (parts, _body) = req.into_parts();
    let uri = parts.uri;
    debug!(method = %parts.method, uri = %uri, client = %client_addr, "Incoming request");

    // HEAD runs the GET route and drops the body
    let is_head = parts.method == Method::HEAD;
    if parts.method != Method::GET && !is_head {
        return Ok(text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"));
    }

    let result = match Route::classify(uri.path(), &state.config) {
        Route::Page => serve_page(&state, uri.query()).await,
        Route::Asset(raw) | Route::Fallback(raw) => serve_asset(&state, raw).await,
        Route::Bundle => serve_bundle(&state).await,
        Route::Static(raw) => serve_static(&state, raw).await,
        Route::NotFound => Ok(text_response(StatusCode::NOT_FOUND, "Not Found")),
    };

    let response = result.unwrap_or_else(|e| {
        error!(uri = %uri, error = %e, "Request failed");
        e.into_response()
    });

    if is_head {
        let (head, _) = response.into_parts();
        return Ok(Response::from_parts(head, Full::new(Bytes::new())));
    }
    Ok(response)
}

/// Fetch a pathway page, inject the markers and rewrite upstream links
async fn serve_page(state: &RelayState, query: Option<&str>) -> Result<RelayResponse, RelayError> {
    let pathway_id = query_param(query, "id").unwrap_or_default();
    if pathway_id.is_empty() {
        return Ok(text_response(StatusCode::BAD_REQUEST, "Error: No ID provided"));
    }

    let fetched = state.fetcher.fetch_page(&pathway_id).await?;
    if !fetched.is_ok() {
        warn!(pathway_id = %pathway_id, status = fetched.status, "Upstream page fetch failed");
        return Ok(text_response(
            upstream_status(fetched.status),
            format!("Error fetching content: {}", fetched.status),
        ));
    }

    let html = state.rewriter.rewrite(&fetched.body);
    debug!(pathway_id = %pathway_id, bytes = html.len(), "Modified HTML with injected stylesheet and script");

    Ok(body_response(StatusCode::OK, "text/html", html))
}

/// Serve a local override if present, otherwise relay the upstream asset
async fn serve_asset(state: &RelayState, raw: &str) -> Result<RelayResponse, RelayError> {
    let filename = decode_path(raw);
    debug!(filename = %filename, "Attempting to serve or relay file");

    if let Some(asset) = state.assets.lookup(&filename).await? {
        return Ok(body_response(StatusCode::OK, &asset.content_type, asset.body));
    }

    let fetched = state.fetcher.fetch(raw).await?;
    if !fetched.is_ok() {
        error!(filename = %filename, status = fetched.status, "Failed to fetch file from upstream");
        return Ok(text_response(
            StatusCode::NOT_FOUND,
            format!("File not found: {}", filename),
        ));
    }

    let content_type = fetched
        .content_type
        .as_deref()
        .unwrap_or(DEFAULT_ASSET_CONTENT_TYPE);
    Ok(body_response(StatusCode::OK, content_type, fetched.body))
}

async fn serve_bundle(state: &RelayState) -> Result<RelayResponse, RelayError> {
    let fetched = state.fetcher.fetch(BUNDLE_UPSTREAM).await?;
    if !fetched.is_ok() {
        warn!(status = fetched.status, "bundle.js not found upstream");
        return Ok(text_response(StatusCode::NOT_FOUND, "File not found"));
    }

    debug!(bytes = fetched.body.len(), "Serving bundle.js from upstream");
    Ok(body_response(StatusCode::OK, "application/javascript", fetched.body))
}

async fn serve_static(state: &RelayState, raw: &str) -> Result<RelayResponse, RelayError> {
    let filename = decode_path(raw);
    debug!(filename = %filename, "Serving static file");

    match state.assets.lookup(&filename).await? {
        Some(asset) => Ok(body_response(StatusCode::OK, &asset.content_type, asset.body)),
        None => Ok(text_response(StatusCode::NOT_FOUND, "Not Found")),
    }
}

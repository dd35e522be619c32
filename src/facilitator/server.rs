use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use bytes::{Bytes, BytesMut};
use http::{
    HeaderValue, Method, Request, Response, StatusCode,
    header::{CONNECTION, CONTENT_TYPE},
};
use http_body_util::{BodyExt, Full};
use hyper::{
    body::{Body, Incoming},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use url::form_urlencoded;

use super::{FacilitatorConfig, Registration, RegistrationSet};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_HEAD_SIZE: usize = 16 * 1024;
const MAX_BODY_SIZE: u64 = 64 * 1024;
/// Oversized bodies are read and discarded up to here so the 400 is delivered.
const MAX_DRAIN_SIZE: u64 = 1024 * 1024;
const EMPTY_MESSAGE: &str = "Registration list empty";

#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Http(#[from] hyper::Error),
    #[error("request body of {len} bytes is too large")]
    TooLarge { len: u64 },
}

/// HTTP rendezvous server: clients POST their address, proxies GET one.
pub struct Facilitator {
    listener: TcpListener,
    regs: Arc<RegistrationSet>,
}

impl Facilitator {
    pub async fn bind(config: &FacilitatorConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        tracing::info!(addr = %listener.local_addr()?, "listening");
        Ok(Self {
            listener,
            regs: Arc::new(RegistrationSet::new()),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> { self.listener.local_addr() }

    /// Shared handle to the pending registrations.
    #[must_use]
    pub fn registrations(&self) -> Arc<RegistrationSet> { Arc::clone(&self.regs) }

    /// Accepts connections forever, serving each on its own task.
    pub async fn run(self) -> std::io::Result<()> {
        let port = self.local_addr()?.port();
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            };
            let regs = Arc::clone(&self.regs);
            tokio::spawn(async move {
                if let Err(e) = serve_conn(stream, peer, regs, port).await {
                    tracing::debug!(%peer, error = %e, "connection error");
                }
            });
        }
    }
}

async fn serve_conn(
    stream: TcpStream,
    peer: SocketAddr,
    regs: Arc<RegistrationSet>,
    port: u16,
) -> Result<(), hyper::Error> {
    let service = service_fn(move |req| {
        let regs = Arc::clone(&regs);
        async move { Ok::<_, Infallible>(serve(req, peer, &regs, port).await) }
    });
    let conn = http1::Builder::new()
        .keep_alive(false)
        .max_buf_size(MAX_HEAD_SIZE)
        .serve_connection(TokioIo::new(stream), service);

    match tokio::time::timeout(REQUEST_TIMEOUT, conn).await {
        Ok(res) => res,
        Err(_) => {
            tracing::info!(%peer, "request timed out");
            Ok(())
        }
    }
}

async fn serve(
    req: Request<Incoming>,
    peer: SocketAddr,
    regs: &RegistrationSet,
    port: u16,
) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let res = match read_body(body).await {
        Ok(body) => handle_request(&Request::from_parts(parts, body), peer, regs, port),
        Err(e) => {
            tracing::info!(%peer, error = %e, "bad request");
            error_response(StatusCode::BAD_REQUEST)
        }
    };
    res.map(Full::new)
}

/// Collects a body of at most `MAX_BODY_SIZE` bytes.
///
/// A larger body is still consumed, up to `MAX_DRAIN_SIZE`, so that closing
/// the connection does not reset it before the client reads the error.
async fn read_body(mut body: Incoming) -> Result<Bytes, RequestError> {
    if let Some(len) = body.size_hint().exact()
        && len > MAX_DRAIN_SIZE
    {
        return Err(RequestError::TooLarge { len });
    }

    let mut buf = BytesMut::new();
    let mut len = 0u64;
    while let Some(frame) = body.frame().await {
        let Ok(data) = frame?.into_data() else {
            continue;
        };
        len += data.len() as u64;
        if len > MAX_DRAIN_SIZE {
            return Err(RequestError::TooLarge { len });
        }
        if len <= MAX_BODY_SIZE {
            buf.extend_from_slice(&data);
        }
    }
    if len > MAX_BODY_SIZE {
        return Err(RequestError::TooLarge { len });
    }
    Ok(buf.freeze())
}

/// Routes one request against the registration queue.
pub(crate) fn handle_request(
    req: &Request<Bytes>,
    peer: SocketAddr,
    regs: &RegistrationSet,
    port: u16,
) -> Response<Bytes> {
    match *req.method() {
        Method::GET if req.uri().path() == "/crossdomain.xml" => crossdomain(port),
        Method::GET => fetch(peer, regs),
        Method::POST => register(req.body(), peer, regs),
        _ => {
            tracing::info!(%peer, method = %req.method(), "unsupported method");
            error_response(StatusCode::NOT_IMPLEMENTED)
        }
    }
}

fn fetch(peer: SocketAddr, regs: &RegistrationSet) -> Response<Bytes> {
    tracing::info!(proxy = %peer, "proxy connects");

    let client = match regs.fetch() {
        Some(reg) => {
            tracing::info!(proxy = %peer, reg = %reg, remaining = regs.len(), "proxy gets registration");
            reg.to_string()
        }
        None => {
            tracing::info!(proxy = %peer, "proxy gets none");
            EMPTY_MESSAGE.to_owned()
        }
    };

    // byte_serialize escapes a literal '+', so any '+' left stands for a space
    let client: String = form_urlencoded::byte_serialize(client.as_bytes()).collect();
    let body = format!("client={}", client.replace('+', "%20"));
    response(StatusCode::OK, "text/html", body)
}

fn register(body: &[u8], peer: SocketAddr, regs: &RegistrationSet) -> Response<Bytes> {
    let Some(spec) = form_urlencoded::parse(body)
        .find(|(k, _)| k == "client")
        .map(|(_, v)| v.into_owned())
    else {
        tracing::info!(client = %peer, "missing \"client\" param");
        return error_response(StatusCode::NOT_FOUND);
    };

    let peer_host = peer.ip().to_string();
    let reg = match Registration::parse(&spec, Some(&peer_host)) {
        Ok(reg) => reg,
        Err(e) => {
            tracing::info!(client = %peer, spec = ?spec, error = %e, "syntax error in registration");
            return error_response(StatusCode::NOT_FOUND);
        }
    };

    tracing::info!(client = %peer, spec = %spec, reg = %reg, "client registers");
    let reg_str = reg.to_string();
    if regs.add(reg) {
        tracing::info!(client = %peer, reg = %reg_str, now = regs.len(), "registration added");
    } else {
        tracing::info!(client = %peer, reg = %reg_str, now = regs.len(), "registration already present");
    }

    response(StatusCode::OK, "text/html", Bytes::new())
}

fn crossdomain(port: u16) -> Response<Bytes> {
    let policy = format!(
        "<cross-domain-policy>\n    <allow-access-from domain=\"*\" to-ports=\"{port}\"/>\n</cross-domain-policy>\r\n"
    );
    response(StatusCode::OK, "application/xml", policy)
}

// hyper fills in Content-Length from the body
fn response(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Bytes> {
    let mut res = Response::new(body.into());
    *res.status_mut() = status;
    let headers = res.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(CONNECTION, HeaderValue::from_static("close"));
    res
}

fn error_response(status: StatusCode) -> Response<Bytes> {
    let reason = status.canonical_reason().unwrap_or("Error");
    response(
        status,
        "text/plain",
        format!("{} {reason}\r\n", status.as_u16()),
    )
}

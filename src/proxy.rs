// SPDX-License-Identifier: Apache-2.0
use actix_web::{
    web, HttpRequest, HttpResponse, Error,
    body::BodyStream,
    http::header::{self, HeaderMap, HeaderName},
};
use awc::error::{ConnectError, SendRequestError, WsClientError, WsProtocolError};
use awc::ws::{Frame, Message};
use futures::{future, Sink, SinkExt, Stream, StreamExt, TryStreamExt};
use std::io;
use std::pin::pin;
use std::time::Duration;
use tracing::{error, debug, instrument};
use uuid::Uuid;

use crate::error::UpstreamError;

/// The single upstream service every allowed request is forwarded to.
///
/// Holds an `awc` client, so one is built per worker.
pub struct Upstream {
    http_base: String,
    ws_base: String,
    client: awc::Client,
}

impl Upstream {
    pub fn new(host: &str, port: u16) -> Self {
        let connector = awc::Connector::new()
            .timeout(Duration::from_secs(10))
            .conn_keep_alive(Duration::from_secs(15))
            .disconnect_timeout(Duration::from_secs(2));

        // Generous overall timeout so large uploads and slow responses pass
        let client = awc::ClientBuilder::new()
            .timeout(Duration::from_secs(600))
            .connector(connector)
            .finish();

        Self {
            http_base: format!("http://{}:{}", host, port),
            ws_base: format!("ws://{}:{}", host, port),
            client,
        }
    }

    /// Forward a plain HTTP request and stream the upstream response back.
    #[instrument(skip(self, payload), fields(method = %req.method(), path = %req.uri().path(), client_ip = %req.connection_info().realip_remote_addr().unwrap_or("unknown")))]
    pub async fn forward_http(&self, req: HttpRequest, payload: web::Payload) -> Result<HttpResponse, UpstreamError> {
        let forwarded_url = format!("{}{}", self.http_base, path_and_query(&req));
        debug!(forwarded_url = %forwarded_url, "Proxying request");

        let mut forwarded_req = self.client
            .request(req.method().clone(), forwarded_url)
            .no_decompress();

        // Host is kept as sent so the upstream builds URLs for the public name
        for (header_name, header_value) in req.headers().iter().filter(|(h, _)|
            *h != header::CONNECTION &&
            *h != header::CONTENT_LENGTH &&
            *h != header::TRANSFER_ENCODING
        ) {
            forwarded_req = forwarded_req.append_header((header_name.clone(), header_value.clone()));
        }

        if let Some(client_ip) = req.connection_info().realip_remote_addr() {
            forwarded_req = forwarded_req.append_header(("X-Forwarded-For", client_ip.to_owned()));
        }

        // Bodyless requests go out without a stream so upstreams do not wait
        // for a body that never comes
        let pending = if has_body(req.headers()) {
            forwarded_req.send_stream(payload)
        } else {
            forwarded_req.send()
        };

        let forwarded_res = pending.await.map_err(|e| {
            let err = UpstreamError { code: send_error_code(&e), message: e.to_string() };
            error!(code = err.code, error = %e, "Forwarding error to upstream");
            err
        })?;

        debug!(status = %forwarded_res.status(), "Received response from upstream");

        let mut client_res = HttpResponse::build(forwarded_res.status());
        for (header_name, header_value) in forwarded_res.headers().iter().filter(|(h, _)|
            *h != header::CONNECTION &&
            *h != header::CONTENT_LENGTH &&
            *h != header::TRANSFER_ENCODING
        ) {
            client_res.append_header((header_name.clone(), header_value.clone()));
        }

        let stream = forwarded_res.inspect_err(|e| {
            error!(error = %e, "Upstream body stream error");
        });
        // Unlike `streaming`, this leaves Content-Type as the upstream sent it
        Ok(client_res.body(BodyStream::new(stream)))
    }

    /// Open the same WebSocket on the upstream, complete the client handshake
    /// and relay frames both ways on a background task.
    #[instrument(skip(self, req, payload), fields(path = %req.uri().path()))]
    pub async fn forward_websocket(&self, req: HttpRequest, payload: web::Payload) -> Result<HttpResponse, Error> {
        // Validates the client handshake before anything is opened upstream
        let (mut response, session, client_stream) = actix_ws::handle(&req, payload)?;

        let upstream_url = format!("{}{}", self.ws_base, path_and_query(&req));
        let mut upstream_req = self.client.ws(upstream_url.as_str());
        for (header_name, header_value) in req.headers().iter().filter(|(h, _)| !is_handshake_header(h)) {
            upstream_req = upstream_req.header(header_name.clone(), header_value.clone());
        }

        let (upstream_res, upstream) = upstream_req.connect().await.map_err(|e| {
            let err = UpstreamError { code: ws_error_code(&e), message: e.to_string() };
            error!(code = err.code, error = %e, upstream = %upstream_url, "WebSocket connect to upstream failed");
            err
        })?;

        if let Some(protocol) = upstream_res.headers().get(header::SEC_WEBSOCKET_PROTOCOL) {
            response.headers_mut().insert(header::SEC_WEBSOCKET_PROTOCOL, protocol.clone());
        }

        let connection_id = Uuid::new_v4();
        debug!(%connection_id, upstream = %upstream_url, "WebSocket relay established");
        actix_web::rt::spawn(relay(connection_id, session, client_stream, upstream));

        Ok(response)
    }
}

async fn relay<U>(connection_id: Uuid, mut session: actix_ws::Session, mut client: actix_ws::MessageStream, upstream: U)
where
    U: Stream<Item = Result<Frame, WsProtocolError>> + Sink<Message, Error = WsProtocolError>,
{
    let (mut upstream_sink, mut upstream_stream) = upstream.split();

    {
        let client_to_upstream = pin!(async {
            while let Some(msg) = client.next().await {
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(e) => {
                        debug!(%connection_id, error = %e, "Client stream error");
                        break;
                    }
                };
                let closing = matches!(msg, Message::Close(_));
                if upstream_sink.send(msg).await.is_err() || closing {
                    break;
                }
            }
        });

        let upstream_to_client = pin!(async {
            while let Some(frame) = upstream_stream.next().await {
                let sent = match frame {
                    Ok(Frame::Text(bytes)) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => session.text(text).await,
                        Err(_) => break,
                    },
                    Ok(Frame::Binary(bytes)) => session.binary(bytes).await,
                    Ok(Frame::Continuation(item)) => session.continuation(item).await,
                    Ok(Frame::Ping(bytes)) => session.ping(&bytes).await,
                    Ok(Frame::Pong(bytes)) => session.pong(&bytes).await,
                    Ok(Frame::Close(reason)) => {
                        let _ = session.clone().close(reason).await;
                        break;
                    }
                    Err(e) => {
                        debug!(%connection_id, error = %e, "Upstream stream error");
                        break;
                    }
                };
                if sent.is_err() {
                    break;
                }
            }
        });

        future::select(client_to_upstream, upstream_to_client).await;
    }

    let _ = upstream_sink.close().await;
    let _ = session.close(None).await;
    debug!(%connection_id, "WebSocket relay closed");
}

fn path_and_query(req: &HttpRequest) -> &str {
    req.uri().path_and_query().map_or("/", |pq| pq.as_str())
}

/// Whether the request carries a body, whatever its method.
pub fn has_body(headers: &HeaderMap) -> bool {
    if headers.contains_key(header::TRANSFER_ENCODING) {
        return true;
    }
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .is_some_and(|n| n > 0)
}

// Negotiated afresh on the upstream leg
fn is_handshake_header(name: &HeaderName) -> bool {
    *name == header::CONNECTION
        || *name == header::UPGRADE
        || *name == header::CONTENT_LENGTH
        || *name == header::SEC_WEBSOCKET_KEY
        || *name == header::SEC_WEBSOCKET_VERSION
        || *name == header::SEC_WEBSOCKET_EXTENSIONS
        || *name == header::SEC_WEBSOCKET_ACCEPT
}

/// Short, errno-style code for a failed upstream request.
pub fn send_error_code(err: &SendRequestError) -> &'static str {
    match err {
        SendRequestError::Connect(e) => connect_error_code(e),
        SendRequestError::Send(e) => io_error_code(e),
        SendRequestError::Timeout { .. } => "ETIMEDOUT",
        _ => "EPROTO",
    }
}

fn ws_error_code(err: &WsClientError) -> &'static str {
    match err {
        WsClientError::SendRequest(e) => send_error_code(e),
        _ => "EPROTO",
    }
}

fn connect_error_code(err: &ConnectError) -> &'static str {
    match err {
        ConnectError::Io(e) => io_error_code(e),
        ConnectError::Resolver(_) | ConnectError::NoRecords { .. } | ConnectError::Unresolved { .. } => "ENOTFOUND",
        ConnectError::Timeout { .. } => "ETIMEDOUT",
        ConnectError::Disconnected { .. } => "ECONNRESET",
        _ => "EPROTO",
    }
}

fn io_error_code(err: &io::Error) -> &'static str {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => "ECONNREFUSED",
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted | io::ErrorKind::BrokenPipe => "ECONNRESET",
        io::ErrorKind::TimedOut => "ETIMEDOUT",
        _ => "EPROTO",
    }
}

//! HTTP server performing the WebSocket handshake and spawning one
//! [`RpcSession`] per admitted connection.

use std::{
    io,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use actix::Addr;
use actix_http::ws::Codec;
use actix_web::{
    web::{self, Data, Payload},
    App, Error, HttpRequest, HttpResponse, HttpServer,
};
use actix_web_actors::ws;

use crate::{
    api::rpc::{
        session::RpcSession, ConnectionId, RpcService, MAX_FRAME_SIZE,
    },
    conf::{server::Server, Conf},
    log::prelude::*,
};

/// Shared state of the WebSocket server.
struct AppContext {
    service: Addr<RpcService>,
    conf: Server,
    connection_counter: Arc<AtomicU64>,
}

/// Whether `path` is one of the configured endpoints; `Some(true)` means
/// the operator application endpoint.
fn classify_endpoint(path: &str, conf: &Server) -> Option<bool> {
    if path == conf.endpoint {
        Some(false)
    } else if path == conf.opapp_endpoint {
        Some(true)
    } else {
        None
    }
}

/// Handles an HTTP upgrade request. Connections on anything but the
/// configured endpoints are rejected at the handshake.
async fn create_ws(
    request: HttpRequest,
    state: Data<AppContext>,
    payload: Payload,
) -> Result<HttpResponse, Error> {
    let path = request.path().to_owned();
    let opapp_enabled = match classify_endpoint(&path, &state.conf) {
        Some(opapp_enabled) => opapp_enabled,
        None => {
            info!("rejecting connection on unknown endpoint {}", path);
            return Ok(HttpResponse::NotFound().finish());
        }
    };

    let id = ConnectionId(
        state.connection_counter.fetch_add(1, Ordering::Relaxed) + 1,
    );
    let session =
        RpcSession::new(id, path, opapp_enabled, state.service.clone());
    let mut response = ws::handshake(&request)?;
    Ok(response.streaming(ws::WebsocketContext::with_codec(
        session,
        payload,
        Codec::new().max_size(MAX_FRAME_SIZE),
    )))
}

/// Runs the WebSocket server until the actix system shuts down.
pub async fn run(conf: &Conf, service: Addr<RpcService>) -> io::Result<()> {
    let server_conf = conf.server.clone();
    let bind_to = (server_conf.bind_ip, server_conf.bind_port);
    let connection_counter = Arc::new(AtomicU64::new(0));

    info!(
        "JSON-RPC WebSocket server listening on ws://{}:{}{}",
        server_conf.bind_ip, server_conf.bind_port, server_conf.endpoint,
    );
    HttpServer::new(move || {
        App::new()
            .data(AppContext {
                service: service.clone(),
                conf: server_conf.clone(),
                connection_counter: Arc::clone(&connection_counter),
            })
            .default_service(web::route().to(create_ws))
    })
    .bind(bind_to)?
    .run()
    .await
}

#[cfg(test)]
mod spec {
    use super::*;

    #[test]
    fn only_configured_endpoints_are_admitted() {
        let conf = Server::default();
        assert_eq!(classify_endpoint("/hbbtv", &conf), Some(false));
        assert_eq!(classify_endpoint("/opapp", &conf), Some(true));
        assert_eq!(classify_endpoint("/", &conf), None);
        assert_eq!(classify_endpoint("/hbbtv/extra", &conf), None);
    }
}

//! Per-connection WebSocket actor: framing only. Inbound text frames go
//! to the [`RpcService`] for dispatch; outbound frames arrive as
//! [`OutboundFrame`] messages and are written in order by the context.

use actix::{
    Actor, ActorContext as _, Addr, AsyncContext, Handler, Message,
    StreamHandler,
};
use actix_web_actors::ws;

use crate::{
    api::rpc::{
        service::{Connect, Disconnect, Inbound, RpcService},
        ConnectionId,
    },
    log::prelude::*,
};

/// One serialised outbound protocol frame.
#[derive(Clone, Debug, Message)]
#[rtype(result = "()")]
pub struct OutboundFrame(pub String);

/// WebSocket connection of one application.
pub struct RpcSession {
    id: ConnectionId,
    /// Request URI the connection was accepted on.
    uri: String,
    /// Whether the connection was admitted on the operator app endpoint.
    opapp_enabled: bool,
    service: Addr<RpcService>,
}

impl RpcSession {
    #[must_use]
    pub fn new(
        id: ConnectionId,
        uri: String,
        opapp_enabled: bool,
        service: Addr<RpcService>,
    ) -> Self {
        Self {
            id,
            uri,
            opapp_enabled,
            service,
        }
    }
}

impl Actor for RpcSession {
    type Context = ws::WebsocketContext<Self>;

    /// Registers this connection with the [`RpcService`].
    fn started(&mut self, ctx: &mut Self::Context) {
        info!("connected: connection={} uri={}", self.id, self.uri);
        self.service.do_send(Connect {
            id: self.id,
            uri: self.uri.clone(),
            opapp_enabled: self.opapp_enabled,
            session: ctx.address().recipient(),
        });
    }

    /// Deregisters this connection.
    fn stopped(&mut self, _: &mut Self::Context) {
        info!("disconnected: connection={}", self.id);
        self.service.do_send(Disconnect { id: self.id });
    }
}

impl Handler<OutboundFrame> for RpcSession {
    type Result = ();

    fn handle(&mut self, frame: OutboundFrame, ctx: &mut Self::Context) {
        ctx.text(frame.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RpcSession {
    fn handle(
        &mut self,
        msg: Result<ws::Message, ws::ProtocolError>,
        ctx: &mut Self::Context,
    ) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                self.service.do_send(Inbound {
                    id: self.id,
                    text: text.to_string(),
                });
            }
            Ok(ws::Message::Ping(payload)) => {
                ctx.pong(&payload);
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(ws::ProtocolError::Overflow) => {
                // Frame over the configured cap.
                ctx.close(Some(ws::CloseCode::Size.into()));
                ctx.stop();
            }
            Err(e) => {
                warn!("protocol error on connection {}: {}", self.id, e);
                ctx.stop();
            }
        }
    }
}

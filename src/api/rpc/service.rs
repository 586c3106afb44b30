//! The RPC service actor: owns the connection registry and all
//! per-connection protocol state, dispatches inbound JSON-RPC frames and
//! fans terminal originated notifications and intents out to the
//! connections that negotiated them.

use std::collections::{HashMap, HashSet};

use actix::{Actor, Context, Handler, Message, Recipient};
use iris_app_api_proto::{
    methods, notify_params, DialogueEnhancementOverrideParams, Feature,
    FeatureParams, FeatureSettings, Intent, NegotiateMethodsParams,
    RequestId, RpcError, StateMediaParams, SubscribeParams, TerminalMsg,
    TriggerResponseToUserActionParams, VoiceReadyParams,
};
use serde_json::{json, Value};

use crate::{
    api::rpc::{
        is_supported_app_to_terminal, is_supported_terminal_to_app,
        session::OutboundFrame, AccessibilityPlatform, ConnectionId,
    },
    log::prelude::*,
};

/// Protocol state of one admitted connection.
struct Connection {
    session: Recipient<OutboundFrame>,
    uri: String,
    opapp_enabled: bool,
    negotiated_app_to_terminal: HashSet<String>,
    negotiated_terminal_to_app: HashSet<String>,
    subscribed: HashSet<Feature>,
    voice_ready: bool,
    media_state: Option<StateMediaParams>,
    /// Monotonic source of terminal originated request IDs.
    intent_id_count: u64,
}

impl Connection {
    fn new(
        session: Recipient<OutboundFrame>,
        uri: String,
        opapp_enabled: bool,
    ) -> Self {
        Self {
            session,
            uri,
            opapp_enabled,
            negotiated_app_to_terminal: HashSet::new(),
            negotiated_terminal_to_app: HashSet::new(),
            subscribed: HashSet::new(),
            voice_ready: false,
            media_state: None,
            intent_id_count: 0,
        }
    }

    fn send(&self, msg: &TerminalMsg) {
        match serde_json::to_string(msg) {
            Ok(text) => {
                let _ = self.session.do_send(OutboundFrame(text));
            }
            Err(e) => error!("failed to serialize outbound frame: {}", e),
        }
    }
}

/// JSON-RPC service actor.
pub struct RpcService {
    platform: Box<dyn AccessibilityPlatform>,
    connections: HashMap<ConnectionId, Connection>,
}

impl RpcService {
    #[must_use]
    pub fn new(platform: Box<dyn AccessibilityPlatform>) -> Self {
        Self {
            platform,
            connections: HashMap::new(),
        }
    }

    fn respond_result(
        &self,
        id: ConnectionId,
        request_id: Option<RequestId>,
        result: Value,
    ) {
        // A request without an ID is a notification; no response then.
        let request_id = match request_id {
            Some(request_id) => request_id,
            None => return,
        };
        if let Some(conn) = self.connections.get(&id) {
            conn.send(&TerminalMsg::Result {
                id: request_id,
                result,
            });
        }
    }

    fn respond_error(
        &self,
        id: ConnectionId,
        request_id: Option<RequestId>,
        error: RpcError,
    ) {
        if let Some(conn) = self.connections.get(&id) {
            conn.send(&TerminalMsg::Error {
                id: request_id,
                error,
            });
        }
    }

    /// Dispatches one inbound frame (strict JSON-RPC 2.0).
    fn handle_inbound(&mut self, id: ConnectionId, text: &str) {
        debug!("message received: connection={} text={}", id, text);

        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(_) => {
                self.respond_error(id, None, RpcError::parse_error());
                return;
            }
        };
        let request_id =
            value.get("id").and_then(RequestId::from_value);
        let obj = match value.as_object() {
            Some(obj) => obj,
            None => {
                self.respond_error(id, None, RpcError::invalid_request());
                return;
            }
        };

        let version_ok = obj
            .get("jsonrpc")
            .map_or(false, |v| v.as_str() == Some("2.0"));
        if !version_ok {
            self.respond_error(id, request_id, RpcError::invalid_request());
            return;
        }

        // Responses to terminal originated requests (intent
        // confirmations and errors) are consumed without a reply.
        if let Some(result) = obj.get("result") {
            info!(
                "intent confirmed: connection={} method={}",
                id,
                result.get("method").and_then(Value::as_str).unwrap_or(""),
            );
            return;
        }
        if let Some(error) = obj.get("error") {
            warn!(
                "error received: connection={} code={} message={}",
                id,
                error.get("code").and_then(Value::as_i64).unwrap_or(0),
                error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or(""),
            );
            return;
        }

        let method = match obj.get("method").and_then(Value::as_str) {
            Some(method) => method.to_owned(),
            None => {
                self.respond_error(
                    id,
                    request_id,
                    RpcError::invalid_request(),
                );
                return;
            }
        };

        // Everything but negotiation itself requires prior successful
        // negotiation of the method.
        let negotiated = method == methods::NEGOTIATE_METHODS
            || self.connections.get(&id).map_or(false, |conn| {
                conn.negotiated_app_to_terminal.contains(&method)
            });
        if !negotiated {
            self.respond_error(
                id,
                request_id,
                RpcError::method_not_found(),
            );
            return;
        }

        let params = obj.get("params").cloned().unwrap_or(Value::Null);
        match method.as_str() {
            methods::NEGOTIATE_METHODS => {
                self.negotiate_methods(id, request_id, params);
            }
            methods::SUBSCRIBE => {
                self.subscribe(id, request_id, params, true);
            }
            methods::UNSUBSCRIBE => {
                self.subscribe(id, request_id, params, false);
            }
            methods::AF_FEATURE_SUPPORT_INFO => {
                self.feature_support_info(id, request_id, params);
            }
            methods::AF_FEATURE_SETTINGS_QUERY => {
                self.feature_settings_query(id, request_id, params);
            }
            methods::AF_FEATURE_SUPPRESS => {
                self.feature_suppress(id, request_id, params);
            }
            methods::AF_DIALOGUE_ENHANCEMENT_OVERRIDE => {
                self.dialogue_enhancement_override(id, request_id, params);
            }
            methods::AF_TRIGGER_RESPONSE_TO_USER_ACTION => {
                self.trigger_response_to_user_action(
                    id, request_id, params,
                );
            }
            methods::APP_VOICE_READY => {
                self.voice_ready(id, request_id, params);
            }
            methods::APP_STATE_MEDIA => {
                self.state_media(id, request_id, params);
            }
            m if m.starts_with("org.hbbtv.ipplayback.") => {
                self.ip_playback(id, request_id, &method, params);
            }
            _ => {
                self.respond_error(
                    id,
                    request_id,
                    RpcError::method_not_found(),
                );
            }
        }
    }

    fn negotiate_methods(
        &mut self,
        id: ConnectionId,
        request_id: Option<RequestId>,
        params: Value,
    ) {
        let params: NegotiateMethodsParams =
            match serde_json::from_value(params) {
                Ok(params) => params,
                Err(_) => {
                    self.respond_error(
                        id,
                        request_id,
                        RpcError::invalid_params(),
                    );
                    return;
                }
            };
        let conn = match self.connections.get_mut(&id) {
            Some(conn) => conn,
            None => return,
        };
        let opapp = conn.opapp_enabled;

        // The terminal answers with the intersection of what the app
        // offered and what it supports itself.
        let app_to_terminal: Vec<String> = params
            .app_to_terminal
            .iter()
            .filter(|m| is_supported_app_to_terminal(m, opapp))
            .cloned()
            .collect();
        let terminal_to_app: Vec<String> = params
            .terminal_to_app
            .iter()
            .filter(|m| is_supported_terminal_to_app(m, opapp))
            .cloned()
            .collect();

        conn.negotiated_app_to_terminal =
            app_to_terminal.iter().cloned().collect();
        conn.negotiated_terminal_to_app =
            terminal_to_app.iter().cloned().collect();

        self.respond_result(
            id,
            request_id,
            json!({
                "method": methods::NEGOTIATE_METHODS,
                "terminalToApp": terminal_to_app,
                "appToTerminal": app_to_terminal,
            }),
        );
    }

    fn subscribe(
        &mut self,
        id: ConnectionId,
        request_id: Option<RequestId>,
        params: Value,
        subscribing: bool,
    ) {
        let params: SubscribeParams = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(_) => {
                self.respond_error(
                    id,
                    request_id,
                    RpcError::invalid_params(),
                );
                return;
            }
        };
        let mut features = Vec::with_capacity(params.msg_type.len());
        for msg_type in &params.msg_type {
            match Feature::from_pref_change_name(msg_type) {
                Some(feature) => features.push(feature),
                None => {
                    self.respond_error(
                        id,
                        request_id,
                        RpcError::invalid_params(),
                    );
                    return;
                }
            }
        }

        let conn = match self.connections.get_mut(&id) {
            Some(conn) => conn,
            None => return,
        };
        for feature in features {
            if subscribing {
                let _ = conn.subscribed.insert(feature);
            } else {
                let _ = conn.subscribed.remove(&feature);
            }
        }

        self.respond_result(
            id,
            request_id,
            json!({ "msgType": params.msg_type }),
        );
    }

    fn parse_feature(
        &self,
        id: ConnectionId,
        request_id: &Option<RequestId>,
        params: Value,
    ) -> Option<Feature> {
        match serde_json::from_value::<FeatureParams>(params) {
            Ok(params) => Some(params.feature),
            Err(_) => {
                self.respond_error(
                    id,
                    request_id.clone(),
                    RpcError::invalid_params(),
                );
                None
            }
        }
    }

    fn feature_support_info(
        &mut self,
        id: ConnectionId,
        request_id: Option<RequestId>,
        params: Value,
    ) {
        let feature = match self.parse_feature(id, &request_id, params) {
            Some(feature) => feature,
            None => return,
        };
        let value = self.platform.feature_support(feature);
        self.respond_result(
            id,
            request_id,
            json!({
                "method": methods::AF_FEATURE_SUPPORT_INFO,
                "feature": feature,
                "value": value,
            }),
        );
    }

    fn feature_settings_query(
        &mut self,
        id: ConnectionId,
        request_id: Option<RequestId>,
        params: Value,
    ) {
        let feature = match self.parse_feature(id, &request_id, params) {
            Some(feature) => feature,
            None => return,
        };
        let value = self.platform.feature_settings(feature);
        self.respond_result(
            id,
            request_id,
            json!({
                "method": methods::AF_FEATURE_SETTINGS_QUERY,
                "feature": feature,
                "value": value,
            }),
        );
    }

    fn feature_suppress(
        &mut self,
        id: ConnectionId,
        request_id: Option<RequestId>,
        params: Value,
    ) {
        let feature = match self.parse_feature(id, &request_id, params) {
            Some(feature) => feature,
            None => return,
        };
        let value = self.platform.feature_suppress(feature);
        self.respond_result(
            id,
            request_id,
            json!({
                "method": methods::AF_FEATURE_SUPPRESS,
                "feature": feature,
                "value": value,
            }),
        );
    }

    fn dialogue_enhancement_override(
        &mut self,
        id: ConnectionId,
        request_id: Option<RequestId>,
        params: Value,
    ) {
        let params: DialogueEnhancementOverrideParams = match params {
            Value::Null => DialogueEnhancementOverrideParams::default(),
            params => match serde_json::from_value(params) {
                Ok(params) => params,
                Err(_) => {
                    self.respond_error(
                        id,
                        request_id,
                        RpcError::invalid_params(),
                    );
                    return;
                }
            },
        };
        let applied = self
            .platform
            .dialogue_enhancement_override(params.dialogue_enhancement_gain);
        self.respond_result(
            id,
            request_id,
            json!({
                "method": methods::AF_DIALOGUE_ENHANCEMENT_OVERRIDE,
                "dialogueEnhancementGain": applied,
            }),
        );
    }

    fn trigger_response_to_user_action(
        &mut self,
        id: ConnectionId,
        request_id: Option<RequestId>,
        params: Value,
    ) {
        let params: TriggerResponseToUserActionParams =
            match serde_json::from_value(params) {
                Ok(params) => params,
                Err(_) => {
                    self.respond_error(
                        id,
                        request_id,
                        RpcError::invalid_params(),
                    );
                    return;
                }
            };
        let actioned = self
            .platform
            .trigger_response_to_user_action(params.magnitude);
        self.respond_result(
            id,
            request_id,
            json!({
                "method": methods::AF_TRIGGER_RESPONSE_TO_USER_ACTION,
                "actioned": actioned,
            }),
        );
    }

    fn voice_ready(
        &mut self,
        id: ConnectionId,
        request_id: Option<RequestId>,
        params: Value,
    ) {
        let params: VoiceReadyParams = match serde_json::from_value(params)
        {
            Ok(params) => params,
            Err(_) => {
                self.respond_error(
                    id,
                    request_id,
                    RpcError::invalid_params(),
                );
                return;
            }
        };
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.voice_ready = params.ready;
        }
        self.platform.on_voice_ready(params.ready);
        self.respond_result(
            id,
            request_id,
            json!({
                "method": methods::APP_VOICE_READY,
                "ready": params.ready,
            }),
        );
    }

    fn state_media(
        &mut self,
        id: ConnectionId,
        request_id: Option<RequestId>,
        params: Value,
    ) {
        let params: StateMediaParams = match serde_json::from_value(params)
        {
            Ok(params) => params,
            Err(_) => {
                self.respond_error(
                    id,
                    request_id,
                    RpcError::invalid_params(),
                );
                return;
            }
        };
        if let Err(reason) = params.validate() {
            debug!("invalid media state frame: {}", reason);
            self.respond_error(id, request_id, RpcError::invalid_params());
            return;
        }

        self.platform.on_state_media(&params);
        if let Some(conn) = self.connections.get_mut(&id) {
            conn.media_state = Some(params);
        }
        self.respond_result(
            id,
            request_id,
            json!({ "method": methods::APP_STATE_MEDIA }),
        );
    }

    fn ip_playback(
        &mut self,
        id: ConnectionId,
        request_id: Option<RequestId>,
        method: &str,
        params: Value,
    ) {
        if !params.is_object() {
            self.respond_error(id, request_id, RpcError::invalid_params());
            return;
        }
        self.platform.on_ip_playback(method, &params);
        self.respond_result(id, request_id, json!({ "method": method }));
    }
}

impl Actor for RpcService {
    type Context = Context<Self>;
}

/// Registers an admitted connection.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub id: ConnectionId,
    pub uri: String,
    pub opapp_enabled: bool,
    pub session: Recipient<OutboundFrame>,
}

impl Handler<Connect> for RpcService {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        let _ = self.connections.insert(
            msg.id,
            Connection::new(msg.session, msg.uri, msg.opapp_enabled),
        );
    }
}

/// Removes a closed connection and its state.
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub id: ConnectionId,
}

impl Handler<Disconnect> for RpcService {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        let _ = self.connections.remove(&msg.id);
    }
}

/// One inbound text frame of a connection.
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct Inbound {
    pub id: ConnectionId,
    pub text: String,
}

impl Handler<Inbound> for RpcService {
    type Result = ();

    fn handle(&mut self, msg: Inbound, _: &mut Context<Self>) {
        self.handle_inbound(msg.id, &msg.text);
    }
}

/// Point-in-time protocol state of a connection, for diagnostics and
/// embedder queries.
#[derive(Clone, Debug)]
pub struct ConnectionInfo {
    pub uri: String,
    pub opapp_enabled: bool,
    pub voice_ready: bool,
    pub media_state: Option<StateMediaParams>,
    pub negotiated_app_to_terminal: Vec<String>,
    pub negotiated_terminal_to_app: Vec<String>,
    pub subscribed: Vec<Feature>,
}

/// Reads the [`ConnectionInfo`] of a connection, if it is still open.
#[derive(Debug, Message)]
#[rtype(result = "Option<ConnectionInfo>")]
pub struct GetConnectionInfo {
    pub id: ConnectionId,
}

impl Handler<GetConnectionInfo> for RpcService {
    type Result = Option<ConnectionInfo>;

    fn handle(
        &mut self,
        msg: GetConnectionInfo,
        _: &mut Context<Self>,
    ) -> Option<ConnectionInfo> {
        self.connections.get(&msg.id).map(|conn| ConnectionInfo {
            uri: conn.uri.clone(),
            opapp_enabled: conn.opapp_enabled,
            voice_ready: conn.voice_ready,
            media_state: conn.media_state.clone(),
            negotiated_app_to_terminal: conn
                .negotiated_app_to_terminal
                .iter()
                .cloned()
                .collect(),
            negotiated_terminal_to_app: conn
                .negotiated_terminal_to_app
                .iter()
                .cloned()
                .collect(),
            subscribed: conn.subscribed.iter().copied().collect(),
        })
    }
}

/// Platform originated preference change, fanned out to every connection
/// subscribed to the feature.
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct NotifyPreferenceChange {
    pub settings: FeatureSettings,
}

impl Handler<NotifyPreferenceChange> for RpcService {
    type Result = ();

    fn handle(&mut self, msg: NotifyPreferenceChange, _: &mut Context<Self>) {
        let feature = msg.settings.feature();
        let frame = TerminalMsg::Notification {
            method: methods::NOTIFY.to_owned(),
            params: notify_params(&msg.settings),
        };
        for conn in self.connections.values() {
            if conn.subscribed.contains(&feature) {
                conn.send(&frame);
            }
        }
    }
}

/// Terminal-to-app intent, delivered to every connection that negotiated
/// the intent method. Request IDs are drawn per connection.
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct SendIntent {
    pub intent: Intent,
    /// Origin of the user action, e.g. `voice`.
    pub origin: String,
}

impl Handler<SendIntent> for RpcService {
    type Result = ();

    fn handle(&mut self, msg: SendIntent, _: &mut Context<Self>) {
        if let Intent::MediaSeekWallclock { date_time } = &msg.intent {
            if chrono::DateTime::parse_from_rfc3339(date_time).is_err() {
                warn!("dropping seek-wallclock intent with bad anchor");
                return;
            }
        }
        let method = msg.intent.method();
        for conn in self.connections.values_mut() {
            if !conn.negotiated_terminal_to_app.contains(method) {
                continue;
            }
            conn.intent_id_count += 1;
            conn.send(&TerminalMsg::Request {
                id: RequestId::Str(conn.intent_id_count.to_string()),
                method: method.to_owned(),
                params: msg.intent.params(&msg.origin),
            });
        }
    }
}

/// Terminal-to-opapp IP player request, delivered to operator app
/// connections that negotiated the method.
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct SendIpPlayerRequest {
    pub method: String,
    pub params: Value,
}

impl Handler<SendIpPlayerRequest> for RpcService {
    type Result = ();

    fn handle(&mut self, msg: SendIpPlayerRequest, _: &mut Context<Self>) {
        for conn in self.connections.values_mut() {
            if !conn.opapp_enabled
                || !conn.negotiated_terminal_to_app.contains(&msg.method)
            {
                continue;
            }
            conn.intent_id_count += 1;
            conn.send(&TerminalMsg::Request {
                id: RequestId::Str(conn.intent_id_count.to_string()),
                method: msg.method.clone(),
                params: msg.params.clone(),
            });
        }
    }
}

//! Settings of the JSON-RPC WebSocket server.

use std::net::{IpAddr, Ipv4Addr};

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

/// WebSocket server settings.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, SmartDefault)]
#[serde(default)]
pub struct Server {
    /// IP address the server binds to. The protocol serves applications
    /// rendered on this terminal, so it defaults to loopback.
    #[default(IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub bind_ip: IpAddr,

    /// Port the server binds to.
    #[default(8910)]
    pub bind_port: u16,

    /// Endpoint path regular applications connect to. Connections on any
    /// other path are rejected at the handshake.
    #[default(String::from("/hbbtv"))]
    pub endpoint: String,

    /// Endpoint path operator applications connect to; these connections
    /// additionally negotiate the IP playback methods.
    #[default(String::from("/opapp"))]
    pub opapp_endpoint: String,
}

#[cfg(test)]
mod spec {
    use super::*;

    #[test]
    fn defaults() {
        let server = Server::default();
        assert_eq!(server.bind_ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(server.bind_port, 8910);
        assert_eq!(server.endpoint, "/hbbtv");
        assert_eq!(server.opapp_endpoint, "/opapp");
    }
}

//! Iris: HbbTV terminal middleware core.
//!
//! Two tightly coupled subsystems govern when broadcast-signalled and
//! broadband applications run and how they negotiate feature support
//! with the terminal:
//!
//! - the [AIT][`ait`] pipeline and the [application manager][`apps`],
//!   driving a single running application from broadcast or XML
//!   signalling;
//! - the [JSON-RPC WebSocket service][`api::rpc`] carrying the HbbTV
//!   accessibility and voice negotiation protocol between the terminal
//!   and its applications.

pub mod ait;
pub mod api;
pub mod apps;
pub mod conf;
pub mod log;
pub mod utils;

#[doc(inline)]
pub use crate::conf::Conf;

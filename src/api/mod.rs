//! Server APIs of the terminal middleware.

pub mod rpc;

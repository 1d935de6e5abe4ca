//! HTTP, WebSocket and command line surface of the TDP backup service

pub mod commands;
pub mod handlers;
pub mod server;
pub mod websocket;

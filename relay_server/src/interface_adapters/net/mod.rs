mod client;

pub use client::ws_handler;

// Network transports.

pub mod relay;

pub use relay::relay_transport;

// Interface adapters: wire protocol, local bus, relay socket and host ports.

pub mod bus;
pub mod clock;
pub mod effects;
pub mod fs;
pub mod host;
pub mod net;
pub mod protocol;
pub mod utils;

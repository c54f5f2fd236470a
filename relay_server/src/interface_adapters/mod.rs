pub mod net;
pub mod state;

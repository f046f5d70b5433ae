//! Application layer - Ports and the services built on them

pub mod ports;
pub mod services;

//! Ports - Interfaces between the engine and its adapters

pub mod outbound;

pub mod chart;
pub mod client;
pub mod service;

//! HTTP API handlers for dubalign-server

pub mod align;
pub mod analyze;
pub mod health;
pub mod maintenance;
pub mod mux;

pub use align::align_routes;
pub use analyze::analyze_routes;
pub use health::health_routes;
pub use maintenance::maintenance_routes;
pub use mux::mux_routes;

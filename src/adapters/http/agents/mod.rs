//! HTTP adapter for the agent registry.

pub mod dto;
mod handlers;
mod routes;

pub use routes::agent_routes;

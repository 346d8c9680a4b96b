//! HTTP adapter for tickets and CSAT surveys.

pub mod dto;
mod handlers;
mod routes;

pub use routes::ticket_routes;

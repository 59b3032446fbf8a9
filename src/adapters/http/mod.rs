//! HTTP adapter: scrape and probe endpoints.

pub mod server;

pub use server::HttpServer;

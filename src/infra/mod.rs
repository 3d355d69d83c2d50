// Adapters for the application ports: live HTTP, offline replay, ingestion

pub mod http_session;
pub mod ingest_client;
pub mod scripted_session;

pub use http_session::HttpPageSession;
pub use ingest_client::HttpIngestClient;
pub use scripted_session::ScriptedSession;

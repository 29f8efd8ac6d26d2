// Orchestration service gluing a document store, a generative-AI provider,
// a browser-automation endpoint, and a messaging gateway behind one HTTP
// surface plus a pair of scheduled jobs.

pub mod config;
pub mod error;
pub mod jobs;
pub mod model;
pub mod notify;
pub mod scrape;
pub mod server;
pub mod state;
pub mod store;

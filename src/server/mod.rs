// HTTP surface: router, handlers, response envelopes.

pub mod handler;

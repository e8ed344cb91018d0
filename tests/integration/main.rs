//! End-to-end tests: the pipeline against an in-memory source, and the HTTP
//! fetcher against fake relays served in-process.

mod mock_source;
mod pipeline;
mod relays;

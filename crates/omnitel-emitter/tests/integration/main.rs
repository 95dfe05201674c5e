//! Integration tests for omnitel-emitter
//!
//! Uses wiremock to stand in for the collector and verifies request shape,
//! status handling, retries and end-to-end emitter accounting.

mod common;

mod test_emitter_delivery;
mod test_get;
mod test_metrics_server;
mod test_post;

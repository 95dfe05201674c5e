//! Integration tests for omnitel-tracker
//!
//! Drive the whole pipeline through `Tracker::track`, against in-memory
//! senders for accounting properties and a wiremock collector for the
//! wire format.

mod common;

mod test_collector;
mod test_pipeline;

//! Omnitel Tracker - the entry point of the telemetry pipeline
//!
//! [`Tracker::track`] takes an [`Event`](omnitel_core::domain::Event) through
//! the consent gate, the session window and the context registry, encodes
//! it, and hands it to the emitter. Nothing on that path waits on the
//! network or reports an error to the caller.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use omnitel_core::config::Config;
//! use omnitel_core::domain::Event;
//! use omnitel_emitter::EmitterHooks;
//! use omnitel_tracker::{Collaborators, Tracker};
//!
//! # async fn example() -> Result<(), omnitel_tracker::TrackerError> {
//! let tracker = Tracker::from_config(&Config::default(), Collaborators::default(), EmitterHooks::default())?;
//! tracker.track(Event::new("notes", "create").with_label("quick"));
//! tracker.shutdown(std::time::Duration::from_secs(5)).await;
//! # Ok(())
//! # }
//! ```

pub mod consent;
pub mod context;
pub mod error;
pub mod host;
pub mod panic;
pub mod platform;
pub mod session;
pub mod tracker;

pub use consent::ConsentGate;
pub use context::{ContextGenerator, ContextRegistry, TracingDiagnosticSink};
pub use error::TrackerError;
pub use host::{ConsentFlag, ForegroundState};
pub use panic::install_panic_tracking;
pub use session::SessionTracker;
pub use tracker::{Collaborators, Tracker};

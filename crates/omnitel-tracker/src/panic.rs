//! Panic autotracking
//!
//! Installs a process-wide panic hook that records each panic as an
//! `application_error` / `panic` event, then hands over to the hook that was
//! installed before it so the usual stderr output is preserved.
//!
//! A panic raised while the hook runs aborts the process, so the hook never
//! calls host code: panics of context generators are left to the
//! diagnostics sink, and tracked panics carry only built-in contexts.

use std::sync::{Arc, Weak};

use omnitel_core::domain::Event;
use tracing::debug;

use crate::context::{is_enriching, panic_text};
use crate::tracker::Tracker;

/// Event category used for tracked panics
pub const ERROR_CATEGORY: &str = "application_error";

/// Event action used for tracked panics
pub const PANIC_ACTION: &str = "panic";

/// Installs the panic hook if exception autotracking is enabled.
///
/// The hook keeps only a weak reference, so it does nothing once the tracker
/// has been dropped. Returns whether a hook was installed.
pub fn install_panic_tracking(tracker: &Arc<Tracker>) -> bool {
    if !tracker.settings().exception_autotracking {
        return false;
    }

    let weak: Weak<Tracker> = Arc::downgrade(tracker);
    let previous_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let tracker = if is_enriching() {
            None
        } else {
            weak.upgrade()
        };
        if let Some(tracker) = tracker {
            let message = panic_text(panic_info.payload());
            let location = panic_info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                .unwrap_or_default();
            let thread = std::thread::current()
                .name()
                .unwrap_or("unnamed")
                .to_string();

            tracker.track_from_panic_hook(
                Event::new(ERROR_CATEGORY, PANIC_ACTION)
                    .with_label(message)
                    .with_property("location", location)
                    .with_property("thread", thread),
            );
        }

        previous_hook(panic_info);
    }));

    debug!("Panic tracking installed");
    true
}

//! # Engine Events
//!
//! How the engine tells a front end that something changed without being
//! asked. The shell prints them; a desktop bridge would forward them as
//! window events.
//!
//! ```text
//!   "pos://tabs"      tab list, active tab, per-tab totals changed
//!   "pos://syncing"   a tab started or stopped talking to the backend
//!   "pos://checkout"  checkout state machine moved
//!   "pos://error"     a background step failed (line sync, confirm, ...)
//! ```

use crate::checkout::CheckoutStatus;
use crate::error::ErrorReport;
use crate::tab::TabSummary;

/// Sink for engine events.
pub trait PosEventEmitter: Send + Sync {
    fn emit_tabs(&self, tabs: &[TabSummary]);

    fn emit_syncing(&self, tab_id: &str, syncing: bool);

    fn emit_checkout(&self, status: &CheckoutStatus);

    /// A failure that has no caller to return to.
    fn emit_error(&self, error: &ErrorReport);
}

/// Emitter that drops everything.
pub struct NoOpEmitter;

impl PosEventEmitter for NoOpEmitter {
    fn emit_tabs(&self, _tabs: &[TabSummary]) {}
    fn emit_syncing(&self, _tab_id: &str, _syncing: bool) {}
    fn emit_checkout(&self, _status: &CheckoutStatus) {}
    fn emit_error(&self, _error: &ErrorReport) {}
}

//! Engine events printed for the cashier.

use agro_pos::{CheckoutState, CheckoutStatus, ErrorReport, PosEventEmitter, TabSummary};
use tracing::debug;

/// Writes errors and checkout progress to stdout; tab and sync changes go to
/// the debug log only.
pub struct ConsoleEmitter;

impl PosEventEmitter for ConsoleEmitter {
    fn emit_tabs(&self, tabs: &[TabSummary]) {
        debug!(tabs = tabs.len(), "Tabs changed");
    }

    fn emit_syncing(&self, tab_id: &str, syncing: bool) {
        debug!(tab_id, syncing, "Sync state");
    }

    fn emit_checkout(&self, status: &CheckoutStatus) {
        match &status.state {
            CheckoutState::Received => {
                println!("  transfer received, type `confirm` to finish");
            }
            CheckoutState::Failed { reason } => println!("  checkout failed: {}", reason),
            _ => debug!(state = status.state.name(), "Checkout state"),
        }
    }

    fn emit_error(&self, error: &ErrorReport) {
        let hint = if error.retryable { " (retry)" } else { "" };
        println!("! {}{}", error.message, hint);
    }
}

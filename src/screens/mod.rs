pub mod dashboard;

// Single-screen TUI: action menu on the left, operation output on the right,
// with popups for selectors, confirmations and module names.

pub use dashboard::{Dashboard, DashboardView};

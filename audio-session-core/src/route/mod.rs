pub mod classify;
pub mod monitor;

pub use monitor::{RouteCallback, RouteMonitor};

//! Role- and module-targeted fan-out hub
//!
//! The [`Hub`] keeps the set of live [`Connection`]s and delivers each
//! broadcast to the connections whose role set intersects the required roles
//! and whose module is one of the required modules.

pub mod connection;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod targeting;

pub use connection::{Connection, Frame, OutboundQueue};
pub use error::{DeliveryError, HubError, Result};
pub use metrics::{ConnectionSummary, HubMetrics};
pub use registry::Hub;
pub use targeting::Targeting;

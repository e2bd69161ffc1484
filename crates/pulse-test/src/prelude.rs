//! Common imports for tests.
//!
//! ```rust,ignore
//! use pulse_test::prelude::*;
//! ```

pub use crate::fixtures::{delly_fleet, fleet_agents, test_active_alert, test_resolved_alert};
pub use crate::init_test_tracing;
pub use crate::mocks::{MockAlertProvider, MockStateProvider, MockTransport, RecordedCall};

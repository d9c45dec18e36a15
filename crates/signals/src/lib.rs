pub mod error;
pub mod loader;
pub mod model;
pub mod simulate;

pub use error::{Result, SignalError};
pub use loader::{parse_rules, parse_scores, SignalLoader, SignalSources};
pub use model::{ExternalSignals, Priority, RuleTrigger, SignalProvenance};
pub use simulate::SignalSimulator;

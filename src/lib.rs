pub mod config;
pub mod correlation;
pub mod engine;
pub mod error;
pub mod gate;
pub mod position;
pub mod refresher;
pub mod returns;
pub mod stress;
pub mod var;

pub use config::{RiskEngineConfig, RiskLimits, StressScenario};
pub use engine::RiskEngine;
pub use error::{CheckResult, LimitViolation, RiskError};
pub use gate::PerformanceMetrics;
pub use position::{PositionRisk, PositionState};
pub use refresher::{spawn_background_refresher, RefresherHandle};

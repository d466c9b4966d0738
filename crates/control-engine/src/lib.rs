//! Closed-loop greenhouse control engine
//!
//! Synchronizes raw telemetry into time-series persistence, aggregates
//! daily readings into fixed time buckets for reporting, and runs the
//! periodic decision loop that consults per-device prediction models and
//! actuates fan, lamp, and pump over the pub/sub transport.

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod predictor;
pub mod publisher;
pub mod scheduler;
pub mod service;
pub mod sync;

pub use aggregate::{aggregate_daily, daily_report, AggregatedPoint, TARGET_HOURS};
pub use engine::{ControlEvent, DecisionEngine};
pub use error::{ControlError, InvocationError};
pub use predictor::{Predictor, ProcessPredictor};
pub use publisher::ActuationPublisher;
pub use scheduler::{Scheduler, SchedulerEvent};
pub use service::ControlService;
pub use sync::SensorSynchronizer;

pub mod action;
pub mod actuation;
pub mod config;
pub mod schedule;
pub mod state;

pub use action::{ModeToken, Origin, Request, RequestError, ScheduleForm, NOOP_OP_MODE};
pub use actuation::{plan, Plan};
pub use config::{LircConfig, RuntimeConfig};
pub use schedule::{
    evaluate, DayType, MatchOrdering, Schedule, ScheduleError, ScheduleErrorKind, ScheduleRule,
    Toggle,
};
pub use state::State;

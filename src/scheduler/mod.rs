pub mod actor;

pub use actor::{SchedulerActor, SchedulerAsk, SchedulerReply, SchedulerStatus, SchedulerTell};

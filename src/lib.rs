mod client;
mod error;
mod logger;
mod mapper;
mod protocol;
mod schedule;
mod session;
mod transport;
mod types;
mod wd5;
mod wg4;

pub use client::{OjClient, OjClientBuilder};
pub use error::{Error, Result};
pub use protocol::COMFORT_DURATION;
pub use schedule::{Schedule, ScheduleDay, ScheduleEvent};
pub use session::DEFAULT_SESSION_CALLS;
pub use types::*;

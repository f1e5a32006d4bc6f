pub mod command;
mod dispatcher;
mod filter;
mod handlers;
mod scheduler;
mod utils;

pub use dispatcher::start_dispatcher;
pub use scheduler::Scheduler;
use teloxide::adaptors::{CacheMe, DefaultParseMode};

pub type Bot = CacheMe<DefaultParseMode<teloxide::Bot>>;

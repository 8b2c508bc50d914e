pub mod runner;

pub use runner::{CommandError, CommandFuture, CommandRequest, CommandRunner};

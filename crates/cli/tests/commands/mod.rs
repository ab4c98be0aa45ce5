//! One module per subcommand

pub mod config;
pub mod probe;
pub mod watch;

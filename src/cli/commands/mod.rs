pub mod raw;
pub mod status;
pub mod token;

pub use raw::{RawArgs, raw_command};
pub use status::status_command;
pub use token::token_command;

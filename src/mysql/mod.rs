pub mod command;
pub mod flags;
pub mod packet;
pub mod protocol;
pub mod types;

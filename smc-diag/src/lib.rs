pub mod command;
pub mod func;

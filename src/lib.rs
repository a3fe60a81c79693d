// library crate for deskrules
// the binary is a thin clap front end over these modules

pub mod checker;
pub mod cli;
pub mod conditions;
pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod rules;
pub mod window;

pub mod action;
pub mod comparator;
pub mod config;
pub mod controller;
pub mod execution;
pub mod harness;
pub mod interactive;
pub mod language;
pub mod question;
pub mod session;
pub mod style;
pub mod submission;
pub mod timer;

pub use crate::config::Config;
pub use crate::language::Language;

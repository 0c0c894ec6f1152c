#![forbid(unsafe_code)]

pub mod chapters;
pub mod cli;
pub mod config;
pub mod epub;
pub mod formats;
pub mod html;
pub mod import;
pub mod layout;
pub mod logging;
pub mod markup;
pub mod pdf;
pub mod project;
pub mod publish;
pub mod social;
pub mod store;

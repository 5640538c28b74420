pub mod config;
pub mod cursor;
pub mod duration;
pub mod error;
pub mod io;
pub mod model;
pub mod repository;
pub mod subbands;
pub mod task;
pub mod translate;
pub mod types;
pub mod xml;

pub use error::{MomsyncError, Result};

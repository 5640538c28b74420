pub mod angles;
pub mod config;
pub mod cursor;
pub mod decode;
pub mod run;

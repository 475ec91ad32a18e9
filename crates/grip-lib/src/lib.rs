pub mod config;
pub mod error;
pub mod frame;
pub mod nav;
pub mod record;
pub mod render;
pub mod storage;
pub mod tree;

pub use error::{Error, Result};
pub use record::*;

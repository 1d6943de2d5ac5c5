//! Query token descriptors accepted by [`crate::FtIndex`]

pub mod token;

pub use token::{QueryMode, QueryToken};

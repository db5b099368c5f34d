//! Library crate for tcp-sweep exposing the scanning engine and its collaborators.
pub mod aggregate;
pub mod config;
pub mod error;
pub mod output;
pub mod ports;
pub mod probe;
pub mod progress;
pub mod scanner;
pub mod types;

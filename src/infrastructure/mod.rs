//! Gateway implementations: the backend REST API and a scripted stand-in.

pub mod http;
pub mod scripted;

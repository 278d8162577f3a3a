//! Remote file access inside a container through `kubectl exec`.

pub mod classify;
pub mod config;
pub mod credentials;
pub mod files;
pub mod gateway;
pub mod listing;
pub mod protocol;
pub mod upload;

#[cfg(test)]
mod test_support;

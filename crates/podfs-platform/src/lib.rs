// Shared types and the remote execution seam

pub mod exec;
pub mod filesystem;

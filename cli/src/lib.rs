//! Plugin image CLI - inspect and fetch Kong plugin images from OCI registries.

pub mod commands;

//! Shared configuration for DroidForge.

pub mod config;

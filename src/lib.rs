//! nvsniff - classifier and compatibility reporter for captured NVIDIA ioctls
//!
//! This library decodes a length-prefixed stream of intercepted ioctl call
//! records, classifies each call by device file and escape code, checks it
//! against a table of supported calls, aggregates what is unsupported, and
//! optionally dumps raw pre-call payloads for use as replay seeds.

pub mod classify;
pub mod cli;
pub mod config;
pub mod dump;
pub mod framing;
pub mod ioctl;
pub mod json_output;
pub mod nvgpu;
pub mod pipeline;
pub mod record;
pub mod results;
pub mod seeds;
pub mod support;

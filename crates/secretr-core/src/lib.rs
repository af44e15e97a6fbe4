//! Core library for `secretr`.
//!
//! Contains the connection-configuration resolver, the batch-file model,
//! the raw/normalized/simplified secret shapes, the concurrent retrieval
//! orchestrator, and the output rendering contract. This crate knows
//! nothing about the SOAP transport or the terminal — it consumes any
//! [`source::SecretSource`] implementation and leaves prompting behind
//! the [`config::Prompter`] seam.

pub mod batch;
pub mod config;
pub mod error;
pub mod normalize;
pub mod output;
pub mod retrieve;
pub mod secret;
pub mod source;

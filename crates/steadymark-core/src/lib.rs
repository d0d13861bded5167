//! Steadymark Core
//!
//! This crate provides core types, buffers, and error definitions
//! for the steadymark streaming markdown engine.
//!
//! # Overview
//!
//! The core crate contains:
//! - [`Token`], [`TokenKind`], [`TokenMeta`] - Tokenizer output
//! - [`Confidence`], [`ContextType`], [`ListType`], [`StrategyKind`] - State enums
//! - [`StreamBuffer`] - Append-only text with a committed boundary
//! - [`RingBuffer`] - Bounded character staging with backtrack
//! - [`SteadymarkError`] - Error types

pub mod buffer;
pub mod enums;
pub mod error;
pub mod ring;
pub mod types;

pub use buffer::StreamBuffer;
pub use enums::{Confidence, ContextType, ListType, StrategyKind};
pub use error::{Result, SteadymarkError};
pub use ring::RingBuffer;
pub use types::{Token, TokenKind, TokenMeta};

//! Storyline Core — shared scheduler abstractions.
//!
//! This crate defines the traits and value types that content authoring and
//! the runtime engine both depend on. It contains no runtime code.

pub mod clock;
pub mod context;
pub mod error;
pub mod event;
pub mod notification;
pub mod outcome;
pub mod sequence;

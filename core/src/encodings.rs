//! # Encodings
//!
//! Translations of feedback arc set questions into clauses of a [`crate::Session`].

pub mod cover;
pub mod order;
pub mod triangle;

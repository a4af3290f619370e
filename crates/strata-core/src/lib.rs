//! # strata-core
//!
//! Core types and error types for Strata.
//!
//! This crate provides the foundational types shared across all Strata crates:
//! - Entity structs for import operations, human beings, and cars
//! - The import status state machine
//! - Candidate record types decoded from import files
//! - The sparse progress payload broadcast to subscribers
//! - Cross-cutting error types

pub mod entities;
pub mod enums;
pub mod errors;
pub mod progress;
pub mod records;

pub use errors::CoreError;

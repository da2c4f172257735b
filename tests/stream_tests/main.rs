//! Tests for the byte stream layer
//!
//! These tests verify:
//! - The pull guarantee and seek clamping of every reader kind
//! - Writers produce exactly the concatenation of what was written
//! - Limiting filters, file streams and host-stream adapters

mod reader_tests;
mod writer_tests;

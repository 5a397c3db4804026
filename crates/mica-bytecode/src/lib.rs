//! Bytecode IR for the Mica programming language.
//!
//! This crate defines the flat, position-addressed instruction sequence that
//! is the sole artifact produced by the compiler and the sole input consumed
//! by the VM.

pub mod instruction;

pub use instruction::Instruction;

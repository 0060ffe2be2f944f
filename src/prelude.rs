//! # snapforge Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the snapforge library. Import this module to get quick access to the essential
//! types for building snapshot images.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all snapforge operations
pub use crate::Error;

/// The result type used throughout snapforge
pub use crate::Result;

/// Configuration for flattening and finalization
pub use crate::FlattenConfig;

// ================================================================================================
// Deferred Values and Regions
// ================================================================================================

/// Single-assignment values and their subscriptions
pub use crate::resolve::{Resolvable, Subscription};

/// Region trees and their layout
pub use crate::region::{FlattenSummary, Layout, Region};

// ================================================================================================
// Field Formats
// ================================================================================================

/// Format traits
pub use crate::format::{FieldFormat, FixedFormat};

/// Concrete formats
pub use crate::format::{
    F64Le, FixedBytes, I16Le, I32Le, I64Le, I8, Nibbles, RawBytes, Text, U16Be, U16Le, U32Be,
    U32Le, U64Le, U8,
};

// ================================================================================================
// Output
// ================================================================================================

/// Sinks and the diagnostic view
pub use crate::output::{DiagnosticView, ImageBuffer, ImageFile, Labelled, Offset, OutputSink};

// ================================================================================================
// Bytecode and Images
// ================================================================================================

/// Instruction encoding
pub use crate::bytecode::{InstructionWriter, Opcode, OpcodeEx1, OpcodeEx2, OpcodeEx3, ShortCallTable};

/// Snapshot assembly
pub use crate::image::{Snapshot, SnapshotBuilder, SnapshotHeader};

/// Post-processing derivations
pub use crate::postprocess::{checksum, digest};

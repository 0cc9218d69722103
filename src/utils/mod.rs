//! Utility modules for script output and artifact handling
//!
//! # Modules
//!
//! - [`serde_utils`]: Deserializers for tool-emitted quantities
//!   - JSON numbers and `0x` hex strings
//!
//! - [`artifact_utils`]: Contract metadata lookup
//!   - In-memory index with explicit registration
//!   - Scanning of a compiled-artifact output directory
//!
//! # Example
//!
//! ```no_run
//! use deploy_registry::{traits::ContractIndex, utils::artifact_utils::ArtifactIndex};
//!
//! # fn example() -> anyhow::Result<()> {
//! let index = ArtifactIndex::from_out_dir("out")?;
//! if let Some(info) = index.by_artifact("src/Counter.sol:Counter") {
//!     println!("{} compiled with {}", info.name, info.compiler_version);
//! }
//! # Ok(())
//! # }
//! ```

/// Contract metadata indexes
pub mod artifact_utils;

/// Serde helpers for hex/decimal quantities
pub mod serde_utils;

//! # Deployment Script Parser and Registry
//!
//! A library that turns the outputs of a smart-contract deployment script
//! run into durable registry records, and keeps that registry honest
//! against live chain state.
//!
//! ## Core Features
//!
//! - **Execution Parsing**
//!   - Typed decoding of deployment, Safe and proxy events
//!   - Prank-aware matching of simulated calls against call traces
//!   - Enrichment with chain hashes, blocks and gas from the broadcast file
//!   - Heuristic proxy classification (MINIMAL, UUPS, TRANSPARENT, BEACON)
//!
//! - **Registry**
//!   - Deployments, transactions and Safe transactions in JSON documents
//!   - Stable, collision-free deployment IDs
//!   - Atomic changesets with rebuild-only lookup indexes
//!
//! - **Pruning**
//!   - Code and receipt checks through a pluggable oracle
//!   - Conservative on error: an entry is never deleted on a failed check
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use deploy_registry::{
//!     config::{BuildContext, RegistryConfig},
//!     trace::ScriptOutput,
//!     utils::artifact_utils::ArtifactIndex,
//!     ExecutionParser, RegistryStore,
//! };
//! use std::path::Path;
//!
//! # fn example(stdout: &str) -> anyhow::Result<()> {
//! let output = ScriptOutput::from_stdout(stdout)?;
//! let parser = ExecutionParser::new(ArtifactIndex::from_out_dir("out")?);
//! let execution = parser.parse_output(
//!     &output,
//!     Some(Path::new("broadcast/Deploy.s.sol/31337/run-latest.json")),
//!     "anvil",
//!     31337,
//! )?;
//!
//! let config = RegistryConfig::from_env(".");
//! let store = RegistryStore::open(config.clone())?;
//! let changeset = store.record_execution(&execution, &BuildContext::from(&config))?;
//! println!("created {} records", changeset.create.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Structure
//!
//! - `events`: Event signature table and typed decoding
//! - `trace`: Script output, trace arenas and subtree extraction
//! - `broadcast`: Broadcast file model
//! - `parser`: Execution parser producing `ScriptExecution`
//! - `changeset`: Changesets and the changeset builder
//! - `registry`: Registry state, indexes and the file-backed store
//! - `pruner`: Chain reconciliation and the RPC oracle
//! - `types`: Persisted record types
//! - `traits`: Collaborator traits
//! - `config`: Registry location and build context
//! - `errors`: Error types and handling
//! - `utils`: Helper functions and utilities

pub mod broadcast;
pub mod changeset;
pub mod config;
pub mod errors;
pub mod events;
pub mod parser;
pub mod pruner;
pub mod registry;
pub mod trace;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export only the essential types and functions
pub use changeset::{Changeset, ChangesetBuilder};
pub use config::{BuildContext, RegistryConfig};
pub use errors::RegistryError;
pub use events::{DomainEvent, EventDecoder, RawLog};
pub use parser::{ExecutionParser, ScriptExecution};
pub use pruner::{Pruner, RpcChecker};
pub use registry::{Registry, RegistryStore};
pub use traits::{BlockchainChecker, ContractIndex, RegistryView};

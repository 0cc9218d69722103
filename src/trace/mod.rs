//! Call-trace arenas and script output
//!
//! The script tool reports its call tree as a set of labeled arenas: flat
//! node arrays where each node refers to its parent and children by index.
//! This module provides:
//! - Serde types for the tool's JSON result (`ScriptOutput`)
//! - The arena node model (`TraceArena`, `TraceNode`, `CallTraceInfo`)
//! - Self-contained subtree fragments (`TraceFragment`) cut out of an arena
//!
//! Nodes are never linked by pointers; parent/child relations are indices
//! into the owning arena, and fragments carry their own remapped indices.

mod extract;

pub use extract::extract_subtree;

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::errors::ParseError;
use crate::events::RawLog;

/// Kind of call frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallKind {
    Call,
    StaticCall,
    CallCode,
    DelegateCall,
    Create,
    Create2,
    #[serde(other)]
    Unknown,
}

impl CallKind {
    /// Whether the frame targets an existing address (as opposed to creating one)
    pub fn is_call(&self) -> bool {
        matches!(
            self,
            CallKind::Call | CallKind::StaticCall | CallKind::CallCode | CallKind::DelegateCall
        )
    }
}

/// Per-call information of a trace node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTraceInfo {
    #[serde(default)]
    pub depth: usize,
    #[serde(default)]
    pub success: bool,
    pub caller: Address,
    /// Callee, or the created address for CREATE kinds
    pub address: Address,
    pub kind: CallKind,
    #[serde(default)]
    pub value: U256,
    /// Call data, or init code for CREATE kinds
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub output: Bytes,
    #[serde(default)]
    pub gas_used: u64,
}

/// Raw log payload recorded on a trace node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceLogData {
    #[serde(default)]
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
}

/// A log emitted inside a call frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceLog {
    pub raw_log: TraceLogData,
    /// Position among the frame's children at which the log was emitted
    #[serde(default)]
    pub position: u64,
}

/// One node of a trace arena
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceNode {
    /// Index of the parent node; `None` for a root
    pub parent: Option<usize>,
    /// Indices of child nodes in call order
    #[serde(default)]
    pub children: Vec<usize>,
    /// Index of this node within its arena
    #[serde(default)]
    pub idx: usize,
    pub trace: CallTraceInfo,
    #[serde(default)]
    pub logs: Vec<TraceLog>,
}

/// Flat, index-addressed call tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceArena {
    #[serde(default)]
    pub arena: Vec<TraceNode>,
}

impl TraceArena {
    pub fn node(&self, idx: usize) -> Option<&TraceNode> {
        self.arena.get(idx)
    }

    /// The sibling called immediately before `idx` under the same parent
    pub fn previous_sibling(&self, idx: usize) -> Option<&TraceNode> {
        let parent = self.node(self.node(idx)?.parent?)?;
        let position = parent.children.iter().position(|&child| child == idx)?;
        let prev = *parent.children.get(position.checked_sub(1)?)?;
        self.node(prev)
    }
}

/// A labeled arena, e.g. `["Deployment", {"arena": [...]}]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledTrace(pub String, pub TraceArena);

impl LabeledTrace {
    pub fn label(&self) -> &str {
        &self.0
    }

    pub fn arena(&self) -> &TraceArena {
        &self.1
    }
}

/// A self-contained copy of a matched subtree
///
/// `nodes[0]` is the root and has no parent; every parent and child index
/// refers to another node of the same fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceFragment {
    pub nodes: Vec<TraceNode>,
}

impl TraceFragment {
    pub fn root(&self) -> Option<&TraceNode> {
        self.nodes.first()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// JSON result printed by the script tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptOutput {
    #[serde(default)]
    pub success: bool,
    /// Console output lines
    #[serde(default)]
    pub logs: Vec<String>,
    /// Every log emitted during the run, in emission order
    #[serde(default)]
    pub raw_logs: Vec<RawLog>,
    #[serde(default)]
    pub traces: Vec<LabeledTrace>,
    #[serde(default)]
    pub gas_used: u64,
}

impl ScriptOutput {
    pub fn from_json(json: &str) -> Result<Self, ParseError> {
        serde_json::from_str(json).map_err(ParseError::ScriptOutput)
    }

    /// Finds and parses the JSON result among the tool's stdout lines
    ///
    /// The tool interleaves progress text with its JSON result; the last line
    /// that looks like the result object wins.
    pub fn from_stdout(stdout: &str) -> Result<Self, ParseError> {
        let line = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| line.starts_with('{') && line.contains("\"raw_logs\""))
            .ok_or(ParseError::MissingScriptOutput)?;
        Self::from_json(line)
    }

    pub fn arenas(&self) -> impl Iterator<Item = &TraceArena> {
        self.traces.iter().map(LabeledTrace::arena)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = r#"{"success":true,"logs":["hello"],"raw_logs":[{"address":"0x0000000000000000000000000000000000000001","topics":[],"data":"0x"}],"traces":[["Deployment",{"arena":[{"parent":null,"children":[1],"idx":0,"trace":{"depth":0,"success":true,"caller":"0x0000000000000000000000000000000000000002","address":"0x0000000000000000000000000000000000000003","kind":"CALL","value":"0x0","data":"0x01","output":"0x","gas_used":21000,"status":"Return"},"logs":[],"ordering":[]},{"parent":0,"children":[],"idx":1,"trace":{"depth":1,"success":true,"caller":"0x0000000000000000000000000000000000000003","address":"0x0000000000000000000000000000000000000004","kind":"STATICCALL","value":"0x0","data":"0x","output":"0x"},"logs":[]}]}]],"gas_used":42}"#;

    #[test]
    fn test_parse_script_output() {
        let output = ScriptOutput::from_json(OUTPUT).unwrap();
        assert!(output.success);
        assert_eq!(output.raw_logs.len(), 1);
        assert_eq!(output.traces.len(), 1);
        assert_eq!(output.traces[0].label(), "Deployment");

        let arena = output.traces[0].arena();
        assert_eq!(arena.arena.len(), 2);
        assert_eq!(arena.arena[0].trace.kind, CallKind::Call);
        assert_eq!(arena.arena[1].trace.kind, CallKind::StaticCall);
        assert_eq!(arena.arena[1].parent, Some(0));
    }

    #[test]
    fn test_from_stdout_skips_noise() {
        let stdout = format!("Compiling 3 files...\nScript ran successfully.\n{OUTPUT}\n");
        let output = ScriptOutput::from_stdout(&stdout).unwrap();
        assert_eq!(output.gas_used, 42);

        assert!(matches!(
            ScriptOutput::from_stdout("no json here"),
            Err(ParseError::MissingScriptOutput)
        ));
    }

    #[test]
    fn test_unknown_call_kind() {
        let kind: CallKind = serde_json::from_str("\"AUTHCALL\"").unwrap();
        assert_eq!(kind, CallKind::Unknown);
        assert!(!kind.is_call());
        assert!(CallKind::DelegateCall.is_call());
        assert!(!CallKind::Create2.is_call());
    }
}

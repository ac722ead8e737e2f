use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Single-line source region. Lines and columns are 1-based; `end_col` points
/// one past the last column of the named token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub line: u32,
    pub start_col: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(line: u32, start_col: u32, end_col: u32) -> Self {
        Self {
            line,
            start_col,
            end_col,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MethodIR {
    pub signature: String,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllocationIR {
    pub id: String,
    pub span: Span,
}

/// The three maps a unit scan produces, handed as-is to the downstream
/// representation builder.
///
/// `methods` is keyed by disambiguating method signature, `allocations` by
/// final allocation identifier (`<base>/<seq>`), `field_accesses` by field
/// signature. Insertion order is traversal order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanIR {
    pub methods: IndexMap<String, MethodIR>,
    pub allocations: IndexMap<String, AllocationIR>,
    pub field_accesses: IndexMap<String, BTreeSet<Span>>,
}

impl ScanIR {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.allocations.is_empty() && self.field_accesses.is_empty()
    }
}

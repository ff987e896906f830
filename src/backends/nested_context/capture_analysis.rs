//! Capture Analysis
//!
//! One pre-order pass over the nesting tree that finds every local variable referenced
//! from a declaration nested below the function that owns it.
//!
//! Produces per declaration:
//! - the captured variables it owns, in declaration order
//! - whether it needs a context frame (functions only, iff something is captured)
//! - the ancestors whose frames it must be able to reach (`pass_through`)
//! - for aggregates, whether instances carry an `outer` link
//!
//! Context references (calls to nested functions, constructions of nested aggregates,
//! function values, `This`) never create frames. They only force `outer` links on the
//! aggregates the walk has to cross.

use crate::analysis_log;
use crate::compiler_frontend::compiler_messages::compiler_errors::{
    CompilerError, ErrorMetaDataKey,
};
use crate::compiler_frontend::declarations::decl_nodes::{
    DeclId, DeclKind, DeclTree, VarId, VarKind,
};
use crate::compiler_frontend::declarations::references::{SymbolReference, collect_references};
use rustc_hash::FxHashSet;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    /// Captured variables owned by this declaration, in declaration order
    pub captured: Vec<VarId>,
    pub frame_needed: bool,

    /// Ancestors whose frames a reference inside this declaration passes through to
    pub pass_through: BTreeSet<DeclId>,
    pub needs_outer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureAnalysis {
    /// Indexed by DeclId
    summaries: Vec<CaptureSummary>,
    captured: FxHashSet<VarId>,
}

impl CaptureAnalysis {
    pub fn analyze(tree: &DeclTree) -> Result<Self, CompilerError> {
        let mut analysis = CaptureAnalysis {
            summaries: vec![CaptureSummary::default(); tree.declarations.len()],
            captured: FxHashSet::default(),
        };

        for use_site in tree.preorder() {
            if !tree.is_function(use_site) {
                continue;
            }

            for reference in collect_references(tree, use_site)? {
                analysis.record(tree, use_site, reference)?;
            }
        }

        for decl in &tree.declarations {
            let captured: Vec<VarId> = decl
                .locals
                .iter()
                .copied()
                .filter(|var| analysis.captured.contains(var))
                .collect();

            let summary = &mut analysis.summaries[decl.id.0 as usize];
            summary.frame_needed = matches!(decl.kind, DeclKind::Function(_)) && !captured.is_empty();
            summary.captured = captured;

            if summary.frame_needed {
                analysis_log!(
                    "Frame needed: ", Yellow {tree.qualified_name(decl.id)},
                    " captures ", {summary.captured.len()}
                );
            }
        }

        Ok(analysis)
    }

    fn record(
        &mut self,
        tree: &DeclTree,
        use_site: DeclId,
        reference: SymbolReference,
    ) -> Result<(), CompilerError> {
        match reference {
            SymbolReference::Variable(var_id) => {
                let var = tree.variable(var_id)?;
                let owner = var.owner;
                if owner == use_site {
                    return Ok(());
                }

                let path = self.path_to(tree, use_site, owner).map_err(|e| {
                    e.with_metadata(ErrorMetaDataKey::Variable, tree.variable_name(var_id))
                })?;

                for decl in &path {
                    if tree.is_aggregate(*decl) {
                        self.summaries[decl.0 as usize].needs_outer = true;
                    }
                }

                // Fields are instance storage and are reached through `this`
                if var.kind == VarKind::Field {
                    return Ok(());
                }

                self.captured.insert(var_id);
                for decl in path {
                    self.summaries[decl.0 as usize].pass_through.insert(owner);
                }

                Ok(())
            }

            SymbolReference::Context(target) => {
                if target == use_site {
                    return Ok(());
                }

                for decl in self.path_to(tree, use_site, target)? {
                    if tree.is_aggregate(decl) {
                        self.summaries[decl.0 as usize].needs_outer = true;
                    }
                }

                Ok(())
            }
        }
    }

    /// Declarations from `use_site` (inclusive) up to `ancestor` (exclusive).
    fn path_to(
        &self,
        tree: &DeclTree,
        use_site: DeclId,
        ancestor: DeclId,
    ) -> Result<Vec<DeclId>, CompilerError> {
        let mut path = vec![use_site];
        for decl in tree.ancestors(use_site) {
            if decl == ancestor {
                return Ok(path);
            }
            path.push(decl);
        }

        Err(CompilerError::compiler_error(format!(
            "'{}' is referenced from '{}', which is not nested inside it",
            tree.qualified_name(ancestor),
            tree.qualified_name(use_site)
        ))
        .with_declaration(use_site)
        .with_metadata(ErrorMetaDataKey::CompilationStage, "capture analysis")
        .with_metadata(ErrorMetaDataKey::UseSite, tree.qualified_name(use_site))
        .with_metadata(ErrorMetaDataKey::Declaration, tree.qualified_name(ancestor)))
    }

    pub fn summary(&self, decl: DeclId) -> Option<&CaptureSummary> {
        self.summaries.get(decl.0 as usize)
    }

    pub fn is_captured(&self, var: VarId) -> bool {
        self.captured.contains(&var)
    }

    pub fn is_frame_needed(&self, decl: DeclId) -> bool {
        self.summary(decl).is_some_and(|s| s.frame_needed)
    }

    pub fn needs_outer(&self, decl: DeclId) -> bool {
        self.summary(decl).is_some_and(|s| s.needs_outer)
    }

    /// Frame-needed functions and every aggregate carry a context at runtime.
    pub fn is_carrier(&self, tree: &DeclTree, decl: DeclId) -> bool {
        tree.is_aggregate(decl) || self.is_frame_needed(decl)
    }

    /// The declaration itself if it is a carrier, otherwise the closest carrier above it.
    pub fn nearest_carrier(&self, tree: &DeclTree, from: DeclId) -> Option<DeclId> {
        std::iter::once(from)
            .chain(tree.ancestors(from))
            .find(|decl| self.is_carrier(tree, *decl))
    }

    pub fn captured_count(&self) -> usize {
        self.captured.len()
    }
}

impl CaptureAnalysis {
    /// Human readable table of the analysis, one line per declaration that has something to report.
    pub fn report(&self, tree: &DeclTree) -> String {
        let mut out = String::new();
        for decl in tree.preorder() {
            let Some(summary) = self.summary(decl) else {
                continue;
            };
            if summary.captured.is_empty() && summary.pass_through.is_empty() && !summary.needs_outer {
                continue;
            }

            out.push_str(&tree.qualified_name(decl));
            if summary.frame_needed {
                out.push_str(" [frame]");
            }
            if summary.needs_outer {
                out.push_str(" [outer]");
            }
            out.push('\n');

            if !summary.captured.is_empty() {
                let names: Vec<String> = summary
                    .captured
                    .iter()
                    .map(|var| tree.variable_name(*var))
                    .collect();
                out.push_str(&format!("    captures: {}\n", names.join(", ")));
            }
            if !summary.pass_through.is_empty() {
                let names: Vec<String> = summary
                    .pass_through
                    .iter()
                    .map(|decl| tree.qualified_name(*decl))
                    .collect();
                out.push_str(&format!("    reaches: {}\n", names.join(", ")));
            }
        }
        out
    }
}

//! Lint diagnostics for diagrams.
//!
//! Reports structural issues without modifying the diagram. The designer
//! itself is permissive (multiple initial states are representable and
//! savable); these rules surface what the downstream simulation layer
//! would reject or silently work around.

use crate::id::ItemId;
use crate::model::Diagram;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::collections::{HashMap, HashSet};

// ─── Diagnostic types ────────────────────────────────────────────────────

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintSeverity {
    /// Likely a mistake — the simulation layer trips over it.
    Warning,
    /// Informational.
    Info,
}

/// A single lint diagnostic.
#[derive(Debug, Clone)]
pub struct LintDiagnostic {
    /// The item this refers to; `None` for diagram-wide findings.
    pub item: Option<ItemId>,
    /// Human-readable message.
    pub message: String,
    /// Severity level.
    pub severity: LintSeverity,
    /// Short rule identifier (e.g. "no-initial-state").
    pub rule: &'static str,
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Run all lint rules over the diagram and return diagnostics.
#[must_use]
pub fn lint_diagram(diagram: &Diagram) -> Vec<LintDiagnostic> {
    let mut diags = Vec::new();
    lint_empty_diagram(diagram, &mut diags);
    lint_initial_states(diagram, &mut diags);
    lint_orphaned_transitions(diagram, &mut diags);
    lint_no_transitions(diagram, &mut diags);
    lint_unreachable_states(diagram, &mut diags);
    diags
}

// ─── Rules ────────────────────────────────────────────────────────────────

fn lint_empty_diagram(diagram: &Diagram, diags: &mut Vec<LintDiagnostic>) {
    if diagram.state_count() == 0 {
        diags.push(LintDiagnostic {
            item: None,
            message: "Diagram has no states.".to_string(),
            severity: LintSeverity::Warning,
            rule: "empty-diagram",
        });
    }
}

/// The simulator needs exactly one initial state: zero makes it fall back
/// to an arbitrary first state, more than one is rejected outright.
fn lint_initial_states(diagram: &Diagram, diags: &mut Vec<LintDiagnostic>) {
    if diagram.state_count() == 0 {
        return;
    }
    let initial: Vec<&str> = diagram
        .states()
        .filter(|(_, s)| s.is_initial)
        .map(|(_, s)| s.name.as_str())
        .collect();
    match initial.len() {
        0 => diags.push(LintDiagnostic {
            item: None,
            message: "No state is marked initial — simulation starts from an arbitrary state."
                .to_string(),
            severity: LintSeverity::Warning,
            rule: "no-initial-state",
        }),
        1 => {}
        _ => diags.push(LintDiagnostic {
            item: None,
            message: format!(
                "More than one initial state ({}) — the simulation layer rejects this.",
                initial.join(", ")
            ),
            severity: LintSeverity::Warning,
            rule: "multiple-initial-states",
        }),
    }
}

fn lint_orphaned_transitions(diagram: &Diagram, diags: &mut Vec<LintDiagnostic>) {
    for (id, t) in diagram.transitions() {
        if !diagram.transition_is_live(t) {
            diags.push(LintDiagnostic {
                item: Some(id),
                message: format!(
                    "Transition '{}' references a deleted state and will be dropped on save.",
                    t.label()
                ),
                severity: LintSeverity::Warning,
                rule: "orphaned-transition",
            });
        }
    }
}

fn lint_no_transitions(diagram: &Diagram, diags: &mut Vec<LintDiagnostic>) {
    if diagram.state_count() > 0 && diagram.transition_count() == 0 {
        diags.push(LintDiagnostic {
            item: None,
            message: "Diagram has states but no transitions.".to_string(),
            severity: LintSeverity::Info,
            rule: "no-transitions",
        });
    }
}

/// Warn on states no transition path can reach from any initial state.
/// Not reported when no initial state exists — `no-initial-state` already
/// covers that, and "unreachable from nothing" is noise.
fn lint_unreachable_states(diagram: &Diagram, diags: &mut Vec<LintDiagnostic>) {
    let initial: Vec<ItemId> = diagram
        .states()
        .filter(|(_, s)| s.is_initial)
        .map(|(id, _)| id)
        .collect();
    if initial.is_empty() {
        return;
    }

    let mut graph: DiGraph<ItemId, ()> = DiGraph::new();
    let mut index_of: HashMap<ItemId, NodeIndex> = HashMap::new();
    for (id, _) in diagram.states() {
        index_of.insert(id, graph.add_node(id));
    }
    for (_, t) in diagram.transitions() {
        if let (Some(&src), Some(&dst)) = (index_of.get(&t.source), index_of.get(&t.target)) {
            graph.add_edge(src, dst, ());
        }
    }

    let mut reached: HashSet<NodeIndex> = HashSet::new();
    for id in initial {
        let mut dfs = Dfs::new(&graph, index_of[&id]);
        while let Some(idx) = dfs.next(&graph) {
            reached.insert(idx);
        }
    }

    for (id, state) in diagram.states() {
        if !reached.contains(&index_of[&id]) {
            diags.push(LintDiagnostic {
                item: Some(id),
                message: format!(
                    "State '{}' is unreachable from any initial state.",
                    state.name
                ),
                severity: LintSeverity::Warning,
                rule: "unreachable-state",
            });
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

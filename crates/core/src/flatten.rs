// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow flattening.
//!
//! Nested workflows are inlined before deployment: edges into a child's
//! in-port re-point to that port's interior destinations, edges leaving
//! the child re-point from the interior sources, and child node names are
//! prefixed with the parent node name to keep them unique. Flattening an
//! already-flat workflow is the identity.

use indexmap::IndexMap;
use std::collections::HashSet;

use crate::error::DefinitionError;
use crate::workflow::{LinkTarget, Node, NodeKind, Workflow};

/// Inline every nested workflow, producing a graph of operation nodes
/// only. Preserves per-source-port link order.
pub fn flatten(workflow: &Workflow) -> Result<Workflow, DefinitionError> {
    if !workflow.has_nested() {
        return Ok(workflow.clone());
    }

    // Flatten children bottom-up so each nested node is one level deep.
    let mut parent = workflow.clone();
    for node in parent.nodes.values_mut() {
        if let NodeKind::Workflow { workflow: child } = &mut node.kind {
            **child = flatten(child)?;
        }
    }

    let mut flat = Workflow {
        in_ports: IndexMap::new(),
        out_ports: parent.out_ports.clone(),
        nodes: IndexMap::new(),
    };

    // Inline child nodes in place of each nested node, rewriting targets
    // as they move into the parent namespace.
    for (name, node) in &parent.nodes {
        match &node.kind {
            NodeKind::Operation { .. } => {
                let mut inlined = node.clone();
                inlined.links = resolve_links(&node.links, &parent)?;
                insert_unique(&mut flat.nodes, name.clone(), inlined)?;
            }
            NodeKind::Workflow { workflow: child } => {
                for (child_name, child_node) in &child.nodes {
                    let mut links = IndexMap::new();
                    for (port, targets) in &child_node.links {
                        let mut resolved = Vec::new();
                        for target in targets {
                            resolved.extend(lift_into_parent(
                                name,
                                target,
                                &parent,
                                &mut HashSet::new(),
                            )?);
                        }
                        links.insert(port.clone(), resolved);
                    }
                    let inlined = Node {
                        kind: child_node.kind.clone(),
                        args: child_node.args.clone(),
                        links,
                    };
                    insert_unique(&mut flat.nodes, format!("{name}_{child_name}"), inlined)?;
                }
            }
        }
    }

    for (port, targets) in &parent.in_ports {
        let mut resolved = Vec::new();
        for target in targets {
            resolved.extend(resolve_target(target, &parent, &mut HashSet::new())?);
        }
        flat.in_ports.insert(port.clone(), resolved);
    }

    Ok(flat)
}

fn insert_unique(
    nodes: &mut IndexMap<String, Node>,
    name: String,
    node: Node,
) -> Result<(), DefinitionError> {
    if nodes.insert(name.clone(), node).is_some() {
        return Err(DefinitionError::DuplicateNode(name));
    }
    Ok(())
}

fn resolve_links(
    links: &IndexMap<String, Vec<LinkTarget>>,
    parent: &Workflow,
) -> Result<IndexMap<String, Vec<LinkTarget>>, DefinitionError> {
    let mut out = IndexMap::new();
    for (port, targets) in links {
        let mut resolved = Vec::new();
        for target in targets {
            resolved.extend(resolve_target(target, parent, &mut HashSet::new())?);
        }
        out.insert(port.clone(), resolved);
    }
    Ok(out)
}

/// Resolve a parent-level target to its concrete flat targets: operation
/// ports and workflow out-ports stay as they are, nested-node in-ports
/// expand to the child's interior destinations.
///
/// The visited set breaks pass-through cycles (a child in-port wired
/// straight to a child out-port can bounce between nested nodes forever).
fn resolve_target(
    target: &LinkTarget,
    parent: &Workflow,
    visited: &mut HashSet<(String, String)>,
) -> Result<Vec<LinkTarget>, DefinitionError> {
    match target {
        LinkTarget::Out { .. } => Ok(vec![target.clone()]),
        LinkTarget::Node { node, port } => match parent.node(node).map(|n| &n.kind) {
            Some(NodeKind::Operation { .. }) => Ok(vec![target.clone()]),
            Some(NodeKind::Workflow { workflow: child }) => {
                if !visited.insert((node.clone(), port.clone())) {
                    return Err(DefinitionError::LinkCycle);
                }
                let interior =
                    child.in_ports.get(port).ok_or_else(|| DefinitionError::UnknownInPort {
                        node: node.clone(),
                        port: port.clone(),
                    })?;
                let mut resolved = Vec::new();
                for t in interior {
                    resolved.extend(lift_into_parent(node, t, parent, visited)?);
                }
                Ok(resolved)
            }
            None => Err(DefinitionError::UnknownNode(node.clone())),
        },
    }
}

/// Lift a child-level target into the parent namespace. Targets of child
/// nodes get the name prefix; targets of the child's own out-ports follow
/// the parent's links for the nested node's matching port.
fn lift_into_parent(
    nested_name: &str,
    target: &LinkTarget,
    parent: &Workflow,
    visited: &mut HashSet<(String, String)>,
) -> Result<Vec<LinkTarget>, DefinitionError> {
    match target {
        LinkTarget::Node { node, port } => Ok(vec![LinkTarget::Node {
            node: format!("{nested_name}_{node}"),
            port: port.clone(),
        }]),
        LinkTarget::Out { port } => {
            let parent_targets = parent
                .node(nested_name)
                .map(|n| n.links.get(port).cloned().unwrap_or_default())
                .unwrap_or_default();
            let mut resolved = Vec::new();
            for t in &parent_targets {
                resolved.extend(resolve_target(t, parent, visited)?);
            }
            Ok(resolved)
        }
    }
}

#[cfg(test)]
#[path = "flatten_tests.rs"]
mod tests;

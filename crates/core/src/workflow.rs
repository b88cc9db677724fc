// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow graphs.
//!
//! A workflow maps node names to operation (or nested workflow) instances
//! and records the links between their ports. Workflows serialize as JSON;
//! the same shape is used for `--deploy` description files and for
//! replication across the cluster.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{DefinitionError, Diagnostic};
use crate::operation::OperationRegistry;
use crate::Value;

/// The destination of a link, within the enclosing workflow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "to", rename_all = "snake_case")]
pub enum LinkTarget {
    /// An in-port of a sibling node.
    Node { node: String, port: String },
    /// An out-port of the enclosing workflow.
    Out { port: String },
}

/// What a workflow node instantiates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// A registered operation, by name.
    Operation { operation: String },
    /// A nested workflow, exposing its in/out ports as if they were an
    /// operation's ports.
    Workflow { workflow: Box<Workflow> },
}

/// A single named node of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Configuration passed to every strategy hook of this node.
    #[serde(default)]
    pub args: Value,
    /// Out-port name → ordered link destinations.
    #[serde(default)]
    pub links: IndexMap<String, Vec<LinkTarget>>,
}

/// A graph of operation nodes with typed ports and links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow in-port → destinations inside the workflow.
    #[serde(default)]
    pub in_ports: IndexMap<String, Vec<LinkTarget>>,
    /// Declared out-ports, fed by node links targeting [`LinkTarget::Out`].
    #[serde(default)]
    pub out_ports: Vec<String>,
    /// Node name → node, in declaration order.
    #[serde(default)]
    pub nodes: IndexMap<String, Node>,
}

impl Workflow {
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::new()
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn in_port_names(&self) -> Vec<&str> {
        self.in_ports.keys().map(String::as_str).collect()
    }

    /// True when any node holds a nested workflow.
    pub fn has_nested(&self) -> bool {
        self.nodes.values().any(|n| matches!(n.kind, NodeKind::Workflow { .. }))
    }

    /// All links in the workflow as `(source, target)` pairs, workflow
    /// in-ports first, then per-node in declaration order.
    pub fn links(&self) -> Vec<(LinkSource, &LinkTarget)> {
        let mut out = Vec::new();
        for (port, targets) in &self.in_ports {
            for target in targets {
                out.push((LinkSource::In { port: port.clone() }, target));
            }
        }
        for (name, node) in &self.nodes {
            for (port, targets) in &node.links {
                for target in targets {
                    out.push(
                        (LinkSource::Node { node: name.clone(), port: port.clone() }, target),
                    );
                }
            }
        }
        out
    }

    /// Validate the graph against the operation registry.
    ///
    /// Fatal problems (unknown operations, nodes or ports, double-linked
    /// in-ports) are errors; in-ports left without an incoming link come
    /// back as diagnostics for the deployer to report.
    pub fn validate(
        &self,
        operations: &OperationRegistry,
    ) -> Result<Vec<Diagnostic>, DefinitionError> {
        let ports = self.node_ports(operations)?;

        // Link sources must name an existing out-port of their node.
        for (name, node) in &self.nodes {
            let (_, out_ports) = &ports[name.as_str()];
            for port in node.links.keys() {
                if !out_ports.contains(port) {
                    return Err(DefinitionError::UnknownOutPort {
                        node: name.clone(),
                        port: port.clone(),
                    });
                }
            }
        }

        // Every target must exist; every destination takes a single link.
        let mut incoming: HashMap<(&str, &str), usize> = HashMap::new();
        let mut out_incoming: HashMap<&str, usize> = HashMap::new();
        for (_, target) in self.links() {
            match target {
                LinkTarget::Node { node, port } => {
                    let (in_ports, _) = ports
                        .get(node.as_str())
                        .ok_or_else(|| DefinitionError::UnknownNode(node.clone()))?;
                    if !in_ports.contains(port) {
                        return Err(DefinitionError::UnknownInPort {
                            node: node.clone(),
                            port: port.clone(),
                        });
                    }
                    let seen = incoming.entry((node.as_str(), port.as_str())).or_insert(0);
                    *seen += 1;
                    if *seen > 1 {
                        return Err(DefinitionError::PortAlreadyLinked {
                            node: node.clone(),
                            port: port.clone(),
                        });
                    }
                }
                LinkTarget::Out { port } => {
                    if !self.out_ports.contains(port) {
                        return Err(DefinitionError::UnknownWorkflowPort(port.clone()));
                    }
                    let seen = out_incoming.entry(port.as_str()).or_insert(0);
                    *seen += 1;
                    if *seen > 1 {
                        return Err(DefinitionError::OutPortAlreadyLinked(port.clone()));
                    }
                }
            }
        }

        // Unconnected in-ports are legal but worth a diagnostic.
        let mut diagnostics = Vec::new();
        for name in self.nodes.keys() {
            let (in_ports, _) = &ports[name.as_str()];
            for port in in_ports {
                if !incoming.contains_key(&(name.as_str(), port.as_str())) {
                    diagnostics.push(Diagnostic { node: name.clone(), port: port.clone() });
                }
            }
        }
        Ok(diagnostics)
    }

    /// Resolve the `(in_ports, out_ports)` of every node, consulting the
    /// registry for operation nodes and the child's own ports for nested
    /// workflows.
    fn node_ports(
        &self,
        operations: &OperationRegistry,
    ) -> Result<HashMap<&str, (Vec<String>, Vec<String>)>, DefinitionError> {
        let mut ports = HashMap::new();
        for (name, node) in &self.nodes {
            let entry = match &node.kind {
                NodeKind::Operation { operation } => {
                    let op = operations.get(operation)?;
                    (op.in_ports().to_vec(), op.out_ports().to_vec())
                }
                NodeKind::Workflow { workflow } => (
                    workflow.in_ports.keys().cloned().collect(),
                    workflow.out_ports.clone(),
                ),
            };
            ports.insert(name.as_str(), entry);
        }
        Ok(ports)
    }
}

/// The source side of a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSource {
    /// A workflow in-port.
    In { port: String },
    /// An out-port of a node.
    Node { node: String, port: String },
}

/// Builder producing a validated [`Workflow`].
///
/// Endpoints are written `node.port`; a bare name refers to a declared
/// workflow port.
#[derive(Default)]
pub struct WorkflowBuilder {
    in_ports: Vec<String>,
    out_ports: Vec<String>,
    nodes: Vec<(String, Node)>,
    links: Vec<(String, String)>,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_port(mut self, port: impl Into<String>) -> Self {
        self.in_ports.push(port.into());
        self
    }

    pub fn out_port(mut self, port: impl Into<String>) -> Self {
        self.out_ports.push(port.into());
        self
    }

    /// Add an operation node with `null` args.
    pub fn node(self, name: impl Into<String>, operation: impl Into<String>) -> Self {
        self.node_with_args(name, operation, Value::Null)
    }

    pub fn node_with_args(
        mut self,
        name: impl Into<String>,
        operation: impl Into<String>,
        args: Value,
    ) -> Self {
        self.nodes.push((
            name.into(),
            Node {
                kind: NodeKind::Operation { operation: operation.into() },
                args,
                links: IndexMap::new(),
            },
        ));
        self
    }

    /// Add a nested workflow node.
    pub fn nested(mut self, name: impl Into<String>, workflow: Workflow) -> Self {
        self.nodes.push((
            name.into(),
            Node {
                kind: NodeKind::Workflow { workflow: Box::new(workflow) },
                args: Value::Null,
                links: IndexMap::new(),
            },
        ));
        self
    }

    /// Link a source endpoint to a destination endpoint. Repeated calls
    /// with the same source fan the port out in call order.
    pub fn link(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.links.push((source.into(), target.into()));
        self
    }

    pub fn build(self, operations: &OperationRegistry) -> Result<Workflow, DefinitionError> {
        let mut workflow = Workflow {
            in_ports: self.in_ports.iter().cloned().map(|p| (p, Vec::new())).collect(),
            out_ports: self.out_ports.clone(),
            nodes: IndexMap::new(),
        };
        if workflow.in_ports.len() != self.in_ports.len() {
            let dup = duplicate_name(&self.in_ports);
            return Err(DefinitionError::DuplicatePort(dup));
        }
        for (name, node) in self.nodes {
            if workflow.nodes.insert(name.clone(), node).is_some() {
                return Err(DefinitionError::DuplicateNode(name));
            }
        }
        for (source, target) in &self.links {
            let target = parse_target(target, &workflow.out_ports)?;
            match parse_source(source, &workflow)? {
                LinkSource::In { port } => {
                    if let Some(targets) = workflow.in_ports.get_mut(&port) {
                        targets.push(target);
                    }
                }
                LinkSource::Node { node, port } => {
                    let entry = workflow
                        .nodes
                        .get_mut(&node)
                        .ok_or(DefinitionError::UnknownNode(node))?;
                    entry.links.entry(port).or_default().push(target);
                }
            }
        }
        workflow.validate(operations)?;
        Ok(workflow)
    }
}

fn duplicate_name(names: &[String]) -> String {
    for (i, name) in names.iter().enumerate() {
        if names[..i].contains(name) {
            return name.clone();
        }
    }
    String::new()
}

fn parse_source(s: &str, workflow: &Workflow) -> Result<LinkSource, DefinitionError> {
    match s.split_once('.') {
        Some((node, port)) if !node.is_empty() && !port.is_empty() => {
            Ok(LinkSource::Node { node: node.to_string(), port: port.to_string() })
        }
        Some(_) => Err(DefinitionError::MalformedEndpoint(s.to_string())),
        None if workflow.in_ports.contains_key(s) => Ok(LinkSource::In { port: s.to_string() }),
        None => Err(DefinitionError::UnknownWorkflowPort(s.to_string())),
    }
}

fn parse_target(s: &str, out_ports: &[String]) -> Result<LinkTarget, DefinitionError> {
    match s.split_once('.') {
        Some((node, port)) if !node.is_empty() && !port.is_empty() => {
            Ok(LinkTarget::Node { node: node.to_string(), port: port.to_string() })
        }
        Some(_) => Err(DefinitionError::MalformedEndpoint(s.to_string())),
        None if out_ports.iter().any(|p| p == s) => Ok(LinkTarget::Out { port: s.to_string() }),
        None => Err(DefinitionError::UnknownWorkflowPort(s.to_string())),
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;

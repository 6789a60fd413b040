//! Assembly of a flat descriptor batch into a validated command tree.
//!
//! [`build_tree`] checks the batch, then attaches children breadth-first by
//! matching each remaining descriptor's declared parent against the local id
//! of an already placed node. Anything left over afterwards points at a
//! parent that never appeared, which is also how cycles show up.
//!
//! Nodes live in an arena ([`CommandTree`]) and refer to each other by
//! [`NodeId`]; children are owned top-down and the parent link is a plain
//! index used for lookup only.
//!
//! # Examples
//!
//! ```
//! use command_dispatch_core::{CommandDescriptor, build_tree};
//!
//! let tree = build_tree(vec![
//!     CommandDescriptor::<(), ()>::new("sub1", |_, _| Ok(())).child_of("main"),
//!     CommandDescriptor::new("main", |_, _| Ok(())),
//! ])
//! .unwrap();
//!
//! let sub1 = tree.find_by_fqid("main.sub1").unwrap();
//! assert_eq!(sub1.depth(), 1);
//! assert_eq!(tree.parent(sub1.id()).unwrap().fqid(), "main");
//! ```

use std::collections::{HashSet, VecDeque};

use crate::descriptor::{CommandDescriptor, CommandSpec, ROOT_PARENT};
use crate::error::{BuildError, UnresolvedRef};

/// Separator between segments of a fully-qualified id.
pub const FQID_SEPARATOR: char = '.';

/// Index of a node inside its [`CommandTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One placed command.
pub struct CommandNode<C, T> {
    id: NodeId,
    fqid: String,
    depth: usize,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    descriptor: CommandDescriptor<C, T>,
}

impl<C, T> CommandNode<C, T> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Dot-joined path of local ids from the root.
    pub fn fqid(&self) -> &str {
        &self.fqid
    }

    /// Distance from the root level (roots are 0).
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in declaration order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn descriptor(&self) -> &CommandDescriptor<C, T> {
        &self.descriptor
    }

    pub fn spec(&self) -> &CommandSpec {
        &self.descriptor.spec
    }

    pub fn is_disabled(&self) -> bool {
        self.descriptor.spec.disabled
    }
}

impl<C, T> std::fmt::Debug for CommandNode<C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandNode")
            .field("fqid", &self.fqid)
            .field("depth", &self.depth)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("spec", &self.descriptor.spec)
            .finish()
    }
}

/// Immutable arena of command nodes.
///
/// Nodes are stored in breadth-first order, so [`iter`](Self::iter) yields
/// parents before their children.
pub struct CommandTree<C, T> {
    nodes: Vec<CommandNode<C, T>>,
    roots: Vec<NodeId>,
}

impl<C, T> CommandTree<C, T> {
    /// Returns the node for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` came from a different tree and is out of range.
    pub fn node(&self, id: NodeId) -> &CommandNode<C, T> {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&CommandNode<C, T>> {
        self.nodes.get(id.0)
    }

    /// Top-level nodes in declaration order.
    pub fn roots(&self) -> impl Iterator<Item = &CommandNode<C, T>> {
        self.roots.iter().map(|id| self.node(*id))
    }

    pub fn parent(&self, id: NodeId) -> Option<&CommandNode<C, T>> {
        self.node(id).parent.map(|parent| self.node(parent))
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &CommandNode<C, T>> {
        self.node(id).children.iter().map(|child| self.node(*child))
    }

    /// Root-to-node chain, ending with `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Vec<&CommandNode<C, T>> {
        let mut chain = vec![self.node(id)];
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            let node = self.node(parent);
            chain.push(node);
            current = node.parent;
        }
        chain.reverse();
        chain
    }

    /// True when the node and every ancestor are enabled.
    pub fn is_active(&self, id: NodeId) -> bool {
        self.ancestors(id).iter().all(|node| !node.is_disabled())
    }

    /// All nodes, breadth-first.
    pub fn iter(&self) -> impl Iterator<Item = &CommandNode<C, T>> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Linear search by fully-qualified id. Prefer
    /// [`Registry::lookup_by_id`](crate::Registry::lookup_by_id) for repeated
    /// lookups.
    pub fn find_by_fqid(&self, fqid: &str) -> Option<&CommandNode<C, T>> {
        self.nodes.iter().find(|node| node.fqid == fqid)
    }

    /// Renders an indented listing of the tree, one command per line.
    ///
    /// Each line shows the fully-qualified id, the invocation forms, any
    /// behavioral flags and the description.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        for root in &self.roots {
            self.outline_node(*root, &mut out);
        }
        out
    }

    fn outline_node(&self, id: NodeId, out: &mut String) {
        let node = self.node(id);
        let spec = node.spec();
        let indent = "  ".repeat(node.depth);
        let forms = spec
            .aliases_or_id()
            .iter()
            .map(|alias| {
                if node.depth == 0 {
                    format!("{}{alias}", spec.effective_prefix())
                } else {
                    (*alias).to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        out.push_str(&format!("{indent}{} [{forms}]", node.fqid));
        if spec.exec_with_subcommands {
            out.push_str(" (exec-with-subcommands)");
        }
        if spec.disabled {
            out.push_str(" (disabled)");
        }
        if !spec.description.is_empty() {
            out.push_str(" - ");
            out.push_str(&spec.description);
        }
        if !spec.usage.is_empty() {
            out.push_str(" usage: ");
            out.push_str(&spec.usage);
        }
        out.push('\n');

        for child in &node.children {
            self.outline_node(*child, out);
        }
    }

    fn place(&mut self, parent: Option<NodeId>, descriptor: CommandDescriptor<C, T>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let (fqid, depth) = match parent {
            Some(parent) => {
                let parent = self.node(parent);
                (
                    format!("{}{FQID_SEPARATOR}{}", parent.fqid, descriptor.spec.id),
                    parent.depth + 1,
                )
            }
            None => (descriptor.spec.id.clone(), 0),
        };

        self.nodes.push(CommandNode {
            id,
            fqid,
            depth,
            parent,
            children: Vec::new(),
            descriptor,
        });

        match parent {
            Some(parent) => self.nodes[parent.0].children.push(id),
            None => self.roots.push(id),
        }
        id
    }
}

impl<C, T> std::fmt::Debug for CommandTree<C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandTree")
            .field("nodes", &self.nodes)
            .field("roots", &self.roots)
            .finish()
    }
}

/// Builds a validated tree from a flat batch of descriptors.
///
/// Checks, in order: self-parent references, id, alias and prefix format,
/// and batch-wide id uniqueness. Then places roots and attaches children
/// breadth-first. Declaration order is preserved among siblings.
///
/// # Errors
///
/// Returns the first [`BuildError`] found. Descriptors whose parent never
/// resolves are all reported together in
/// [`BuildError::UnresolvedParent`].
pub fn build_tree<C, T>(
    descriptors: impl IntoIterator<Item = CommandDescriptor<C, T>>,
) -> Result<CommandTree<C, T>, BuildError> {
    let descriptors: Vec<_> = descriptors.into_iter().collect();
    validate_batch(&descriptors)?;

    let (top_level, mut pending): (Vec<_>, Vec<_>) = descriptors
        .into_iter()
        .partition(|descriptor| descriptor.spec.parent.is_root());

    let mut tree = CommandTree {
        nodes: Vec::with_capacity(top_level.len() + pending.len()),
        roots: Vec::new(),
    };
    let mut queue = VecDeque::new();

    for descriptor in top_level {
        queue.push_back(tree.place(None, descriptor));
    }

    while let Some(current) = queue.pop_front() {
        if pending.is_empty() {
            break;
        }
        let local_id = tree.node(current).spec().id.clone();
        let (adopted, rest): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|descriptor| descriptor.spec.parent.id() == Some(local_id.as_str()));
        pending = rest;

        for descriptor in adopted {
            queue.push_back(tree.place(Some(current), descriptor));
        }
    }

    if !pending.is_empty() {
        let unresolved = pending
            .iter()
            .map(|descriptor| UnresolvedRef {
                id: descriptor.spec.id.clone(),
                parent: descriptor.spec.parent.id().unwrap_or(ROOT_PARENT).to_string(),
            })
            .collect();
        return Err(BuildError::UnresolvedParent(unresolved));
    }

    Ok(tree)
}

fn validate_batch<C, T>(descriptors: &[CommandDescriptor<C, T>]) -> Result<(), BuildError> {
    for descriptor in descriptors {
        let spec = &descriptor.spec;
        if spec.parent.id() == Some(spec.id.as_str()) {
            return Err(BuildError::SelfParent(spec.id.clone()));
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for descriptor in descriptors {
        let spec = &descriptor.spec;
        if !is_valid_id(&spec.id) {
            return Err(BuildError::InvalidId(spec.id.clone()));
        }
        if let Some(alias) = spec.aliases.iter().find(|alias| !is_valid_alias(alias)) {
            return Err(BuildError::InvalidAlias {
                id: spec.id.clone(),
                alias: alias.clone(),
            });
        }
        let prefix = spec.effective_prefix();
        if !is_valid_prefix(prefix) {
            return Err(BuildError::InvalidPrefix {
                id: spec.id.clone(),
                prefix: prefix.to_string(),
            });
        }
        if !seen.insert(spec.id.as_str()) {
            return Err(BuildError::DuplicateId(spec.id.clone()));
        }
    }

    Ok(())
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id != ROOT_PARENT
        && !id.contains(FQID_SEPARATOR)
        && !id.chars().any(char::is_whitespace)
}

fn is_valid_alias(alias: &str) -> bool {
    !alias.is_empty() && !alias.chars().any(char::is_whitespace)
}

// Input is split on whitespace, so a prefix containing any can never match.
fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.chars().any(char::is_whitespace)
}

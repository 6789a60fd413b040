//! Raw input to resolved command chain.
//!
//! Input is split on whitespace. The first token carries the prefix glued to
//! the root alias (`!main`); the longest registered prefix wins. From the
//! root the parser descends greedily, consuming each following token that
//! names an active child of the current node. The first token that does not
//! match stops the descent, and it and everything after it become arguments.
//!
//! Disabled commands are not indexed, so their alias simply fails to match
//! and lands in the arguments of the last active ancestor.

use std::fmt;

use tracing::debug;

use crate::error::ParseError;
use crate::registry::Registry;
use crate::tree::CommandNode;

/// A parsed input: matched prefix, root-to-leaf chain and residual
/// arguments. Borrows from the registry it was resolved against.
pub struct ResolvedInvocation<'r, C, T> {
    prefix: &'r str,
    chain: Vec<&'r CommandNode<C, T>>,
    args: Vec<String>,
}

impl<'r, C, T> ResolvedInvocation<'r, C, T> {
    /// `chain` must be non-empty and ordered root to leaf.
    pub(crate) fn new(prefix: &'r str, chain: Vec<&'r CommandNode<C, T>>, args: Vec<String>) -> Self {
        debug_assert!(!chain.is_empty());
        Self {
            prefix,
            chain,
            args,
        }
    }

    pub fn prefix(&self) -> &'r str {
        self.prefix
    }

    /// Matched nodes, root first.
    pub fn chain(&self) -> &[&'r CommandNode<C, T>] {
        &self.chain
    }

    /// The deepest matched node.
    pub fn leaf(&self) -> &'r CommandNode<C, T> {
        self.chain[self.chain.len() - 1]
    }

    /// Fully-qualified id of the leaf.
    pub fn fqid(&self) -> &'r str {
        self.leaf().fqid()
    }

    /// Tokens left over after the last matched alias.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl<C, T> fmt::Debug for ResolvedInvocation<'_, C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedInvocation")
            .field("prefix", &self.prefix)
            .field(
                "chain",
                &self.chain.iter().map(|node| node.fqid()).collect::<Vec<_>>(),
            )
            .field("args", &self.args)
            .finish()
    }
}

/// Resolves `raw` against `registry`.
///
/// # Errors
///
/// - [`ParseError::NoPrefix`] when the input is blank or its first token
///   starts with no registered prefix.
/// - [`ParseError::NotFound`] when no active root command carries the alias
///   following the prefix.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::{CommandDescriptor, Registry, parse};
///
/// let registry = Registry::build(vec![
///     CommandDescriptor::<(), ()>::new("main", |_, _| Ok(())).with_prefix("!"),
///     CommandDescriptor::new("sub1", |_, _| Ok(())).child_of("main").with_prefix("!"),
/// ])
/// .unwrap();
///
/// let resolved = parse("!main sub1 arg1 arg2", &registry).unwrap();
/// assert_eq!(resolved.fqid(), "main.sub1");
/// assert_eq!(resolved.args(), ["arg1", "arg2"]);
/// ```
pub fn parse<'r, C, T>(
    raw: &str,
    registry: &'r Registry<C, T>,
) -> Result<ResolvedInvocation<'r, C, T>, ParseError> {
    let no_prefix = || ParseError::NoPrefix {
        input: raw.to_string(),
    };

    let mut tokens = raw.split_whitespace().peekable();
    let first = tokens.next().ok_or_else(no_prefix)?;
    let prefix = registry.match_prefix(first).ok_or_else(no_prefix)?;
    let alias = &first[prefix.len()..];

    let root = registry
        .lookup_root(prefix, alias)
        .ok_or_else(|| ParseError::NotFound {
            prefix: prefix.to_string(),
            alias: alias.to_string(),
        })?;

    let mut chain = vec![root];
    let mut current = root;
    while let Some(token) = tokens.peek() {
        let Some(child) = registry.lookup_child(current.id(), prefix, token) else {
            break;
        };
        chain.push(child);
        current = child;
        tokens.next();
    }

    let args: Vec<String> = tokens.map(str::to_string).collect();
    debug!(
        input = raw,
        command = current.fqid(),
        depth = chain.len(),
        args = args.len(),
        "input resolved"
    );

    Ok(ResolvedInvocation::new(prefix, chain, args))
}

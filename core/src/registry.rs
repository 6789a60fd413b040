//! Lookup indexes over a built [`CommandTree`].
//!
//! The registry owns the tree and adds three indexes, all computed once at
//! construction:
//!
//! - fully-qualified id to node;
//! - (parent scope, effective prefix, alias) to node, covering every alias of
//!   every active command (enabled, with all ancestors enabled);
//! - a per-parent alias fallback that resolves a child regardless of its
//!   prefix, preferring the first declared sibling.
//!
//! Alias uniqueness is checked against the configured [`AliasScope`] before
//! any index is populated, so a built registry can never return two
//! candidates for the same lookup.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::descriptor::CommandDescriptor;
use crate::error::{BuildError, DispatchError};
use crate::executor::{CommandResult, execute};
use crate::parser::parse;
use crate::tree::{CommandNode, CommandTree, NodeId, build_tree};

/// Where alias uniqueness is enforced.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::AliasScope;
///
/// assert_eq!(AliasScope::default(), AliasScope::PerParent);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasScope {
    /// Siblings under one parent may not share an alias within one prefix.
    #[default]
    PerParent,
    /// No two commands anywhere may share an alias within one prefix.
    PerPrefix,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ScopeKey {
    parent: Option<NodeId>,
    prefix: String,
    alias: String,
}

/// Read-only command index, safe to share across threads.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::{CommandDescriptor, Registry};
///
/// let registry = Registry::build(vec![
///     CommandDescriptor::<(), ()>::new("main", |_, _| Ok(())).with_prefix("!"),
///     CommandDescriptor::new("sub1", |_, _| Ok(())).child_of("main").with_prefix("!"),
/// ])
/// .unwrap();
///
/// assert_eq!(registry.lookup("!", &["main", "sub1"]).unwrap().fqid(), "main.sub1");
/// assert!(registry.lookup_by_id("main.sub1").is_some());
/// assert_eq!(registry.match_prefix("!main"), Some("!"));
/// ```
pub struct Registry<C, T> {
    tree: CommandTree<C, T>,
    scope: AliasScope,
    by_fqid: HashMap<String, NodeId>,
    by_alias: HashMap<ScopeKey, NodeId>,
    child_fallback: HashMap<(NodeId, String), NodeId>,
    prefixes: Vec<String>,
}

impl<C, T> Registry<C, T> {
    /// Builds the tree and indexes it with the default [`AliasScope`].
    ///
    /// # Errors
    ///
    /// Returns any [`BuildError`] from tree assembly or alias checking.
    pub fn build(
        descriptors: impl IntoIterator<Item = CommandDescriptor<C, T>>,
    ) -> Result<Self, BuildError> {
        Self::build_with_scope(descriptors, AliasScope::default())
    }

    /// Builds the tree and indexes it with an explicit [`AliasScope`].
    ///
    /// # Errors
    ///
    /// Returns any [`BuildError`] from tree assembly or alias checking.
    pub fn build_with_scope(
        descriptors: impl IntoIterator<Item = CommandDescriptor<C, T>>,
        scope: AliasScope,
    ) -> Result<Self, BuildError> {
        Self::new(build_tree(descriptors)?, scope)
    }

    /// Indexes an already built tree.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::DuplicateAlias`] when two commands claim the
    /// same alias within `scope`.
    pub fn new(tree: CommandTree<C, T>, scope: AliasScope) -> Result<Self, BuildError> {
        check_alias_uniqueness(&tree, scope)?;

        let mut by_fqid = HashMap::with_capacity(tree.len());
        let mut by_alias = HashMap::new();
        let mut child_fallback = HashMap::new();
        let mut prefixes: Vec<String> = Vec::new();

        for node in tree.iter() {
            by_fqid.insert(node.fqid().to_string(), node.id());
            if !tree.is_active(node.id()) {
                continue;
            }

            let spec = node.spec();
            let prefix = spec.effective_prefix();
            for alias in spec.aliases_or_id() {
                by_alias.insert(
                    ScopeKey {
                        parent: node.parent(),
                        prefix: prefix.to_string(),
                        alias: alias.to_string(),
                    },
                    node.id(),
                );
                if let Some(parent) = node.parent() {
                    child_fallback
                        .entry((parent, alias.to_string()))
                        .or_insert(node.id());
                }
            }

            if node.parent().is_none() && !prefixes.iter().any(|known| known == prefix) {
                prefixes.push(prefix.to_string());
            }
        }

        prefixes.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        info!(
            commands = tree.len(),
            aliases = by_alias.len(),
            prefixes = ?prefixes,
            scope = ?scope,
            "command registry built"
        );

        Ok(Self {
            tree,
            scope,
            by_fqid,
            by_alias,
            child_fallback,
            prefixes,
        })
    }

    pub fn tree(&self) -> &CommandTree<C, T> {
        &self.tree
    }

    pub fn alias_scope(&self) -> AliasScope {
        self.scope
    }

    /// Prefixes of active root commands, longest first.
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Number of commands in the tree, disabled ones included.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Active commands in breadth-first order.
    pub fn commands(&self) -> impl Iterator<Item = &CommandNode<C, T>> {
        self.tree
            .iter()
            .filter(|node| self.tree.is_active(node.id()))
    }

    /// Longest registered prefix that `token` starts with.
    pub fn match_prefix(&self, token: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|prefix| token.starts_with(prefix.as_str()))
            .map(String::as_str)
    }

    /// Active command by fully-qualified id.
    pub fn lookup_by_id(&self, fqid: &str) -> Option<&CommandNode<C, T>> {
        self.by_fqid
            .get(fqid)
            .filter(|id| self.tree.is_active(**id))
            .map(|id| self.tree.node(*id))
    }

    /// Active root command with `alias` under `prefix`.
    pub fn lookup_root(&self, prefix: &str, alias: &str) -> Option<&CommandNode<C, T>> {
        self.scoped(None, prefix, alias)
    }

    /// Active child of `parent` with `alias`.
    ///
    /// A child declared under `prefix` wins; otherwise the first declared
    /// sibling carrying the alias is returned.
    pub fn lookup_child(
        &self,
        parent: NodeId,
        prefix: &str,
        alias: &str,
    ) -> Option<&CommandNode<C, T>> {
        self.scoped(Some(parent), prefix, alias).or_else(|| {
            self.child_fallback
                .get(&(parent, alias.to_string()))
                .map(|id| self.tree.node(*id))
        })
    }

    /// Resolves a full alias path under `prefix`. Every segment must match.
    pub fn lookup(&self, prefix: &str, path: &[&str]) -> Option<&CommandNode<C, T>> {
        let (first, rest) = path.split_first()?;
        let mut node = self.lookup_root(prefix, first)?;
        for alias in rest {
            node = self.lookup_child(node.id(), prefix, alias)?;
        }
        Some(node)
    }

    /// Parses `raw` and executes the resolved chain on the caller's thread.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Parse`] when the input does not resolve, or
    /// the executor's error when a body fails without recovery.
    pub fn dispatch(&self, raw: &str, ctx: &C) -> Result<CommandResult<T>, DispatchError> {
        let resolved = parse(raw, self)?;
        execute(&resolved, ctx)
    }

    fn scoped(&self, parent: Option<NodeId>, prefix: &str, alias: &str) -> Option<&CommandNode<C, T>> {
        let key = ScopeKey {
            parent,
            prefix: prefix.to_string(),
            alias: alias.to_string(),
        };
        self.by_alias.get(&key).map(|id| self.tree.node(*id))
    }
}

impl<C, T> std::fmt::Debug for Registry<C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("scope", &self.scope)
            .field("commands", &self.tree.len())
            .field("prefixes", &self.prefixes)
            .finish_non_exhaustive()
    }
}

fn check_alias_uniqueness<C, T>(tree: &CommandTree<C, T>, scope: AliasScope) -> Result<(), BuildError> {
    let mut claimed: HashMap<ScopeKey, &str> = HashMap::new();

    for node in tree.iter() {
        let spec = node.spec();
        let parent = match scope {
            AliasScope::PerParent => node.parent(),
            AliasScope::PerPrefix => None,
        };
        for alias in spec.aliases_or_id() {
            let key = ScopeKey {
                parent,
                prefix: spec.effective_prefix().to_string(),
                alias: alias.to_string(),
            };
            if let Some(first) = claimed.get(&key) {
                if *first != node.fqid() {
                    return Err(BuildError::DuplicateAlias {
                        prefix: key.prefix,
                        alias: key.alias,
                        first: (*first).to_string(),
                        second: node.fqid().to_string(),
                    });
                }
                continue;
            }
            claimed.insert(key, node.fqid());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(id: &str) -> CommandDescriptor<(), ()> {
        CommandDescriptor::new(id, |_, _| Ok(()))
    }

    #[test]
    fn test_longest_prefix_wins() {
        let registry = Registry::build(vec![
            cmd("short").with_prefix("!"),
            cmd("long").with_prefix("!!"),
            cmd("bare"),
        ])
        .unwrap();

        assert_eq!(registry.prefixes(), ["!!", "!", ""]);
        assert_eq!(registry.match_prefix("!!long"), Some("!!"));
        assert_eq!(registry.match_prefix("!short"), Some("!"));
        assert_eq!(registry.match_prefix("bare"), Some(""));
    }

    #[test]
    fn test_unknown_prefix_has_no_match() {
        let registry = Registry::build(vec![cmd("main").with_prefix("!")]).unwrap();
        assert_eq!(registry.match_prefix("?main"), None);
    }

    #[test]
    fn test_per_parent_scope_allows_cousins_to_share_aliases() {
        let registry = Registry::build(vec![
            cmd("a").with_prefix("!"),
            cmd("b").with_prefix("!"),
            cmd("a_list").child_of("a").with_alias("list").with_prefix("!"),
            cmd("b_list").child_of("b").with_alias("list").with_prefix("!"),
        ])
        .unwrap();

        assert_eq!(registry.lookup("!", &["a", "list"]).unwrap().fqid(), "a.a_list");
        assert_eq!(registry.lookup("!", &["b", "list"]).unwrap().fqid(), "b.b_list");
    }

    #[test]
    fn test_per_prefix_scope_rejects_cousins_sharing_aliases() {
        let err = Registry::build_with_scope(
            vec![
                cmd("a").with_prefix("!"),
                cmd("b").with_prefix("!"),
                cmd("a_list").child_of("a").with_alias("list").with_prefix("!"),
                cmd("b_list").child_of("b").with_alias("list").with_prefix("!"),
            ],
            AliasScope::PerPrefix,
        )
        .unwrap_err();

        assert_eq!(
            err,
            BuildError::DuplicateAlias {
                prefix: "!".into(),
                alias: "list".into(),
                first: "a.a_list".into(),
                second: "b.b_list".into(),
            }
        );
    }

    #[test]
    fn test_siblings_cannot_share_alias_and_prefix() {
        let err = Registry::build(vec![
            cmd("ping").with_prefix("!"),
            cmd("pong").with_alias("ping").with_prefix("!"),
        ])
        .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateAlias { alias, .. } if alias == "ping"));
    }

    #[test]
    fn test_same_alias_under_different_prefixes() {
        let registry = Registry::build(vec![
            cmd("bang_help").with_alias("help").with_prefix("!"),
            cmd("slash_help").with_alias("help").with_prefix("/"),
        ])
        .unwrap();

        assert_eq!(registry.lookup("!", &["help"]).unwrap().fqid(), "bang_help");
        assert_eq!(registry.lookup("/", &["help"]).unwrap().fqid(), "slash_help");
    }

    #[test]
    fn test_disabled_commands_are_hidden_from_lookup() {
        let registry = Registry::build(vec![
            cmd("main").with_prefix("!"),
            cmd("sub1").child_of("main").with_prefix("!").disabled(),
            cmd("deep").child_of("sub1").with_prefix("!"),
        ])
        .unwrap();

        assert!(registry.lookup_by_id("main.sub1").is_none());
        assert!(registry.lookup_by_id("main.sub1.deep").is_none());
        assert!(registry.lookup("!", &["main", "sub1"]).is_none());
        assert!(registry.tree().find_by_fqid("main.sub1").is_some());
        assert_eq!(registry.commands().count(), 1);
    }

    #[test]
    fn test_disabled_command_still_claims_its_alias() {
        let err = Registry::build(vec![
            cmd("main").with_prefix("!"),
            cmd("old").child_of("main").with_alias("go").with_prefix("!").disabled(),
            cmd("new").child_of("main").with_alias("go").with_prefix("!"),
        ])
        .unwrap_err();

        assert_eq!(
            err,
            BuildError::DuplicateAlias {
                prefix: "!".into(),
                alias: "go".into(),
                first: "main.old".into(),
                second: "main.new".into(),
            }
        );
    }

    #[test]
    fn test_dispatch_picks_command_under_longest_prefix() {
        let echo = |name: &'static str| {
            CommandDescriptor::<(), String>::new(name, move |_, args| {
                Ok(format!("{name}:{}", args.join(",")))
            })
        };
        let registry = Registry::build(vec![
            echo("short").with_prefix("!"),
            echo("long").with_prefix("!!"),
        ])
        .unwrap();

        let result = registry.dispatch("!!long a", &()).unwrap();
        assert_eq!(result.command, "long");
        assert_eq!(result.payload.as_deref(), Some("long:a"));

        let result = registry.dispatch("!short b", &()).unwrap();
        assert_eq!(result.command, "short");
        assert_eq!(result.payload.as_deref(), Some("short:b"));

        // "!!" is matched first and does not fall back to "!".
        assert_eq!(
            registry.dispatch("!!short", &()).unwrap_err().kind(),
            crate::ErrorKind::NotFound
        );
        assert_eq!(
            registry.dispatch("!long", &()).unwrap_err().kind(),
            crate::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_disabled_root_removes_its_prefix() {
        let registry = Registry::build(vec![
            cmd("main").with_prefix("!"),
            cmd("hidden").with_prefix("?").disabled(),
        ])
        .unwrap();
        assert_eq!(registry.prefixes(), ["!"]);
    }

    #[test]
    fn test_child_lookup_falls_back_to_first_declared_sibling() {
        let registry = Registry::build(vec![
            cmd("main").with_prefix("!"),
            cmd("first").child_of("main").with_alias("go").with_prefix("/"),
            cmd("second").child_of("main").with_alias("go").with_prefix("%"),
        ])
        .unwrap();

        let main = registry.lookup_root("!", "main").unwrap();
        assert_eq!(
            registry.lookup_child(main.id(), "!", "go").unwrap().fqid(),
            "main.first"
        );
        assert_eq!(
            registry.lookup_child(main.id(), "%", "go").unwrap().fqid(),
            "main.second"
        );
    }

    #[test]
    fn test_lookup_requires_every_segment() {
        let registry = Registry::build(vec![cmd("main").with_prefix("!")]).unwrap();
        assert!(registry.lookup("!", &[]).is_none());
        assert!(registry.lookup("!", &["main", "nope"]).is_none());
        assert!(registry.lookup("", &["main"]).is_none());
    }

    #[test]
    fn test_registry_is_send_and_sync() {
        fn assert_send_sync<S: Send + Sync>() {}
        assert_send_sync::<Registry<(), ()>>();
        assert_send_sync::<Registry<std::sync::Mutex<Vec<String>>, String>>();
    }
}

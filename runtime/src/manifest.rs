//! Declaration manifests and body binding.
//!
//! A manifest declares command metadata in YAML or JSON, grouped the way
//! handlers are usually declared in code: one group per owning declaration,
//! with an optional group prefix. Bodies cannot live in a file, so they are
//! bound afterwards by command id, either from a [`HandlerTable`] or from a
//! factory closure.
//!
//! Parents can be declared from either side: a command may name its
//! `parent`, or a parent may list its `subcommands`. Both forms normalize to
//! the child's parent reference.
//!
//! # Example YAML
//!
//! ```yaml
//! groups:
//!   - name: chat
//!     prefix: "!"
//!     commands:
//!       - id: single
//!         description: single command test
//!       - id: main
//!         description: sub command test
//!         exec_with_subcommands: true
//!         subcommands: [sub1]
//!       - id: sub1
//!         aliases: [sub1, s1]
//!         description: sub command of main
//! ```

use std::collections::{BTreeMap, HashMap};
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use command_dispatch_core::{
    AliasScope, BoxError, CommandBody, CommandDescriptor, CommandSpec, ErrorHandler, Parent,
    Registry,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, RuntimeError};

/// One declared command.
///
/// Keys that match no spec field are kept in `extra` rather than rejected,
/// and [`Manifest::specs`] logs a warning for each of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEntry {
    #[serde(flatten)]
    pub spec: CommandSpec,
    /// Ids of commands that become children of this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcommands: Vec<String>,
    /// Unrecognized keys.
    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Commands declared together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Overrides the local prefix of every member.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default)]
    pub commands: Vec<CommandEntry>,
}

/// A full declaration file.
///
/// # Examples
///
/// ```
/// use command_dispatch_runtime::Manifest;
///
/// let manifest = Manifest::from_yaml_str(r#"
/// groups:
///   - prefix: "!"
///     commands:
///       - id: main
///         subcommands: [sub1]
///       - id: sub1
/// "#).unwrap();
///
/// let specs = manifest.specs().unwrap();
/// assert_eq!(specs[1].parent.id(), Some("main"));
/// assert_eq!(specs[1].effective_prefix(), "!");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub groups: Vec<GroupEntry>,
}

impl Manifest {
    /// Loads a manifest file. `.json` files are read as JSON, anything else
    /// as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](RuntimeError::IoError) if the file cannot be read,
    /// or [`JsonError`](RuntimeError::JsonError) /
    /// [`YamlError`](RuntimeError::YamlError) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(std::fs::File::open(path)?);
        let manifest: Self = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_reader(reader)?
        } else {
            serde_yaml::from_reader(reader)?
        };
        debug!(
            path = %path.display(),
            groups = manifest.groups.len(),
            commands = manifest.command_count(),
            "manifest loaded"
        );
        Ok(manifest)
    }

    /// Parses a YAML manifest.
    ///
    /// # Errors
    ///
    /// Returns [`YamlError`](RuntimeError::YamlError) on malformed input.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parses a JSON manifest.
    ///
    /// # Errors
    ///
    /// Returns [`JsonError`](RuntimeError::JsonError) on malformed input.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Total number of declared commands across groups.
    pub fn command_count(&self) -> usize {
        self.groups.iter().map(|group| group.commands.len()).sum()
    }

    /// Flattens the manifest into normalized specs, in declaration order.
    ///
    /// Group prefixes are stamped onto their members and `subcommands` lists
    /// become parent references on the listed children.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::UnknownSubcommand`] if a list names an undeclared id.
    /// - [`RuntimeError::ConflictingParent`] if a child ends up with two
    ///   different parents.
    pub fn specs(&self) -> Result<Vec<CommandSpec>> {
        let mut specs = Vec::with_capacity(self.command_count());
        let mut listings: Vec<(&str, &str)> = Vec::new();

        for group in &self.groups {
            for entry in &group.commands {
                for key in entry.extra.keys() {
                    warn!(command = %entry.spec.id, key = %key, "ignoring unknown manifest key");
                }
                let mut spec = entry.spec.clone();
                if let Some(prefix) = &group.prefix {
                    spec.group_prefix = Some(prefix.clone());
                }
                specs.push(spec);
                listings.extend(
                    entry
                        .subcommands
                        .iter()
                        .map(|child| (entry.spec.id.as_str(), child.as_str())),
                );
            }
        }

        let positions: HashMap<String, usize> = specs
            .iter()
            .enumerate()
            .rev()
            .map(|(position, spec)| (spec.id.clone(), position))
            .collect();

        for (parent, child) in listings {
            let position = *positions
                .get(child)
                .ok_or_else(|| RuntimeError::UnknownSubcommand {
                    parent: parent.to_string(),
                    child: child.to_string(),
                })?;

            let spec = &mut specs[position];
            match spec.parent.id().map(str::to_string) {
                None => spec.parent = Parent::Command(parent.to_string()),
                Some(existing) if existing == parent => {}
                Some(existing) => {
                    return Err(RuntimeError::ConflictingParent {
                        child: child.to_string(),
                        first: existing,
                        second: parent.to_string(),
                    });
                }
            }
        }

        Ok(specs)
    }

    /// Pairs every spec with the body produced by `factory`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::MissingBody`] for the first spec the factory
    /// has no body for, plus any error from [`specs`](Self::specs).
    pub fn bind_with<C, T, F>(&self, mut factory: F) -> Result<Vec<CommandDescriptor<C, T>>>
    where
        F: FnMut(&CommandSpec) -> Option<Arc<dyn CommandBody<C, T>>>,
    {
        self.specs()?
            .into_iter()
            .map(|spec| {
                let body = factory(&spec).ok_or_else(|| RuntimeError::MissingBody(spec.id.clone()))?;
                Ok(CommandDescriptor::from_spec(spec, body))
            })
            .collect()
    }

    /// Pairs every spec with its body and error handler from `table`.
    ///
    /// # Errors
    ///
    /// Same as [`bind_with`](Self::bind_with).
    pub fn bind<C, T>(&self, table: &HandlerTable<C, T>) -> Result<Vec<CommandDescriptor<C, T>>> {
        let descriptors = self.bind_with(|spec| table.body(&spec.id))?;
        Ok(descriptors
            .into_iter()
            .map(|descriptor| match table.error_handler(descriptor.id()) {
                Some(handler) => descriptor.with_shared_error_handler(handler),
                None => descriptor,
            })
            .collect())
    }

    /// Binds `table` and builds a registry in one step.
    ///
    /// # Errors
    ///
    /// Any binding error, or [`RuntimeError::BuildError`] from the registry.
    pub fn build_registry<C, T>(
        &self,
        table: &HandlerTable<C, T>,
        scope: AliasScope,
    ) -> Result<Registry<C, T>> {
        Ok(Registry::build_with_scope(self.bind(table)?, scope)?)
    }
}

/// Bodies and error handlers keyed by command id.
///
/// # Examples
///
/// ```
/// use command_dispatch_runtime::HandlerTable;
///
/// let table = HandlerTable::<(), String>::new()
///     .with_body("echo", |_, args| Ok(args.join(" ")));
/// assert!(table.contains("echo"));
/// ```
pub struct HandlerTable<C, T> {
    bodies: HashMap<String, Arc<dyn CommandBody<C, T>>>,
    error_handlers: HashMap<String, Arc<dyn ErrorHandler<C, T>>>,
}

impl<C, T> Default for HandlerTable<C, T> {
    fn default() -> Self {
        Self {
            bodies: HashMap::new(),
            error_handlers: HashMap::new(),
        }
    }
}

impl<C, T> HandlerTable<C, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the body for `id`, replacing any previous one.
    pub fn with_body<F>(mut self, id: impl Into<String>, body: F) -> Self
    where
        F: Fn(&C, &[String]) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        self.insert_body(id, body);
        self
    }

    pub fn insert_body<F>(&mut self, id: impl Into<String>, body: F)
    where
        F: Fn(&C, &[String]) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        self.bodies.insert(id.into(), Arc::new(body));
    }

    /// Registers the error handler for `id`.
    pub fn with_error_handler(
        mut self,
        id: impl Into<String>,
        handler: impl ErrorHandler<C, T> + 'static,
    ) -> Self {
        self.error_handlers.insert(id.into(), Arc::new(handler));
        self
    }

    pub fn body(&self, id: &str) -> Option<Arc<dyn CommandBody<C, T>>> {
        self.bodies.get(id).cloned()
    }

    pub fn error_handler(&self, id: &str) -> Option<Arc<dyn ErrorHandler<C, T>>> {
        self.error_handlers.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.bodies.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

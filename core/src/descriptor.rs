//! Command metadata and callable capabilities.
//!
//! A command is declared as a [`CommandDescriptor`]: serializable metadata
//! ([`CommandSpec`]) plus a [`CommandBody`] and an [`ErrorHandler`]. How the
//! descriptors are produced (manual registration, a manifest file, a macro)
//! is up to the caller; the engine only consumes the flat list.
//!
//! Descriptors that share a prefix are usually declared together in a
//! [`CommandGroup`], whose prefix overrides whatever the members declare
//! locally.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::BoxError;

/// Sentinel parent id for top-level commands.
pub const ROOT_PARENT: &str = "root";

/// Declared parent of a command.
///
/// Serialized as a plain string, with [`ROOT_PARENT`] standing for
/// [`Parent::Root`].
///
/// # Examples
///
/// ```
/// use command_dispatch_core::Parent;
///
/// assert_eq!(Parent::from("root".to_string()), Parent::Root);
/// assert_eq!(Parent::from("main".to_string()), Parent::Command("main".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Parent {
    /// Top-level command.
    #[default]
    Root,
    /// Child of the command with this local id.
    Command(String),
}

impl Parent {
    /// Returns the parent id, or `None` for top-level commands.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Root => None,
            Self::Command(id) => Some(id.as_str()),
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }
}

impl From<String> for Parent {
    fn from(value: String) -> Self {
        if value == ROOT_PARENT {
            Self::Root
        } else {
            Self::Command(value)
        }
    }
}

impl From<Parent> for String {
    fn from(value: Parent) -> Self {
        match value {
            Parent::Root => ROOT_PARENT.to_string(),
            Parent::Command(id) => id,
        }
    }
}

/// Declarative metadata for one command.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::CommandSpec;
///
/// let spec = CommandSpec::new("sub1").child_of("main").with_prefix("!");
/// assert_eq!(spec.aliases_or_id(), vec!["sub1"]);
/// assert_eq!(spec.effective_prefix(), "!");
/// assert_eq!(spec.parent.id(), Some("main"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Local id, unique within one build batch.
    pub id: String,
    /// Declared parent.
    #[serde(default)]
    pub parent: Parent,
    /// Invocation names; the id is used when empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Locally declared prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Prefix inherited from the declaring group. Wins over `prefix`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_prefix: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub usage: String,
    /// Run this command's body before any resolved descendant's.
    #[serde(default)]
    pub exec_with_subcommands: bool,
    /// Keep in the tree but hide from lookup and execution.
    #[serde(default)]
    pub disabled: bool,
}

impl CommandSpec {
    /// Creates a top-level spec with no aliases, prefix or flags.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: Parent::Root,
            aliases: Vec::new(),
            prefix: None,
            group_prefix: None,
            description: String::new(),
            usage: String::new(),
            exec_with_subcommands: false,
            disabled: false,
        }
    }

    pub fn child_of(mut self, parent: impl Into<String>) -> Self {
        self.parent = Parent::from(parent.into());
        self
    }

    pub fn with_parent(mut self, parent: Parent) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    pub fn exec_with_subcommands(mut self) -> Self {
        self.exec_with_subcommands = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Returns the declared aliases, or the id when none were declared.
    pub fn aliases_or_id(&self) -> Vec<&str> {
        if self.aliases.is_empty() {
            vec![self.id.as_str()]
        } else {
            self.aliases.iter().map(String::as_str).collect()
        }
    }

    /// Group prefix, else local prefix, else the empty string.
    pub fn effective_prefix(&self) -> &str {
        self.group_prefix
            .as_deref()
            .or(self.prefix.as_deref())
            .unwrap_or("")
    }
}

/// Callable body of a command.
///
/// Implemented for every `Fn(&C, &[String]) -> Result<T, BoxError>`.
pub trait CommandBody<C, T>: Send + Sync {
    fn call(&self, ctx: &C, args: &[String]) -> Result<T, BoxError>;
}

impl<C, T, F> CommandBody<C, T> for F
where
    F: Fn(&C, &[String]) -> Result<T, BoxError> + Send + Sync,
{
    fn call(&self, ctx: &C, args: &[String]) -> Result<T, BoxError> {
        self(ctx, args)
    }
}

/// What an [`ErrorHandler`] decided to do with a failure.
#[derive(Debug)]
pub enum Recovery<T> {
    /// Failure is swallowed; the optional value stands in for the body's.
    Recovered(Option<T>),
    /// Failure is re-raised to the caller.
    Unhandled(BoxError),
}

/// Per-command failure policy.
///
/// Implemented for every `Fn(&C, &str, BoxError) -> Recovery<T>`, where the
/// `&str` is the failing command's fully-qualified id.
pub trait ErrorHandler<C, T>: Send + Sync {
    fn handle(&self, ctx: &C, command: &str, cause: BoxError) -> Recovery<T>;
}

impl<C, T, F> ErrorHandler<C, T> for F
where
    F: Fn(&C, &str, BoxError) -> Recovery<T> + Send + Sync,
{
    fn handle(&self, ctx: &C, command: &str, cause: BoxError) -> Recovery<T> {
        self(ctx, command, cause)
    }
}

/// Logs the failure and re-raises it. The default handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropagateFailure;

impl<C, T> ErrorHandler<C, T> for PropagateFailure {
    fn handle(&self, _ctx: &C, command: &str, cause: BoxError) -> Recovery<T> {
        warn!(command, error = %cause, "command failed");
        Recovery::Unhandled(cause)
    }
}

/// Logs the failure and swallows it without a replacement value.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAndRecover;

impl<C, T> ErrorHandler<C, T> for LogAndRecover {
    fn handle(&self, _ctx: &C, command: &str, cause: BoxError) -> Recovery<T> {
        warn!(command, error = %cause, "command failed, recovering");
        Recovery::Recovered(None)
    }
}

/// Metadata plus capabilities for one command.
///
/// `C` is the caller-supplied execution context passed through to every body
/// and handler; `T` is the payload a body produces.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::CommandDescriptor;
///
/// let echo = CommandDescriptor::<(), String>::new("echo", |_ctx, args| Ok(args.join(" ")))
///     .with_alias("say")
///     .with_description("Print the arguments");
///
/// assert_eq!(echo.spec.aliases, vec!["say"]);
/// assert_eq!(echo.invoke(&(), &["hi".to_string()]).unwrap(), "hi");
/// ```
pub struct CommandDescriptor<C, T> {
    pub spec: CommandSpec,
    body: Arc<dyn CommandBody<C, T>>,
    error_handler: Arc<dyn ErrorHandler<C, T>>,
}

impl<C, T> CommandDescriptor<C, T> {
    /// Creates a top-level descriptor from a closure body.
    pub fn new<F>(id: impl Into<String>, body: F) -> Self
    where
        F: Fn(&C, &[String]) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self::from_spec(CommandSpec::new(id), Arc::new(body))
    }

    /// Pairs existing metadata with a shared body and the default handler.
    pub fn from_spec(spec: CommandSpec, body: Arc<dyn CommandBody<C, T>>) -> Self {
        Self {
            spec,
            body,
            error_handler: Arc::new(PropagateFailure),
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn child_of(mut self, parent: impl Into<String>) -> Self {
        self.spec = self.spec.child_of(parent);
        self
    }

    pub fn with_parent(mut self, parent: Parent) -> Self {
        self.spec = self.spec.with_parent(parent);
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.spec = self.spec.with_alias(alias);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.spec = self.spec.with_prefix(prefix);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.spec = self.spec.with_description(description);
        self
    }

    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.spec = self.spec.with_usage(usage);
        self
    }

    pub fn exec_with_subcommands(mut self) -> Self {
        self.spec = self.spec.exec_with_subcommands();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.spec = self.spec.disabled();
        self
    }

    /// Replaces the error handler.
    pub fn with_error_handler(mut self, handler: impl ErrorHandler<C, T> + 'static) -> Self {
        self.error_handler = Arc::new(handler);
        self
    }

    /// Replaces the error handler with a closure.
    pub fn on_error<F>(self, handler: F) -> Self
    where
        F: Fn(&C, &str, BoxError) -> Recovery<T> + Send + Sync + 'static,
    {
        self.with_error_handler(handler)
    }

    /// Shares an already type-erased error handler.
    pub fn with_shared_error_handler(mut self, handler: Arc<dyn ErrorHandler<C, T>>) -> Self {
        self.error_handler = handler;
        self
    }

    /// Runs the body.
    pub fn invoke(&self, ctx: &C, args: &[String]) -> Result<T, BoxError> {
        self.body.call(ctx, args)
    }

    /// Hands a body failure to this command's error handler.
    pub fn handle_failure(&self, ctx: &C, command: &str, cause: BoxError) -> Recovery<T> {
        self.error_handler.handle(ctx, command, cause)
    }
}

impl<C, T> Clone for CommandDescriptor<C, T> {
    fn clone(&self) -> Self {
        Self {
            spec: self.spec.clone(),
            body: Arc::clone(&self.body),
            error_handler: Arc::clone(&self.error_handler),
        }
    }
}

impl<C, T> fmt::Debug for CommandDescriptor<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Descriptors declared together under one optional prefix.
///
/// The group prefix overrides every member's local prefix.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::{CommandDescriptor, CommandGroup};
///
/// let group = CommandGroup::<(), ()>::new()
///     .with_prefix("!")
///     .command(CommandDescriptor::new("ping", |_, _| Ok(())).with_prefix("/"));
///
/// let descriptors = group.into_descriptors();
/// assert_eq!(descriptors[0].spec.effective_prefix(), "!");
/// ```
pub struct CommandGroup<C, T> {
    prefix: Option<String>,
    commands: Vec<CommandDescriptor<C, T>>,
}

impl<C, T> Default for CommandGroup<C, T> {
    fn default() -> Self {
        Self {
            prefix: None,
            commands: Vec::new(),
        }
    }
}

impl<C, T> CommandGroup<C, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Adds a descriptor to the group.
    pub fn command(mut self, descriptor: CommandDescriptor<C, T>) -> Self {
        self.commands.push(descriptor);
        self
    }

    pub fn push(&mut self, descriptor: CommandDescriptor<C, T>) {
        self.commands.push(descriptor);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Flattens the group, stamping its prefix onto every member.
    pub fn into_descriptors(self) -> Vec<CommandDescriptor<C, T>> {
        let prefix = self.prefix;
        self.commands
            .into_iter()
            .map(|mut descriptor| {
                if let Some(prefix) = &prefix {
                    descriptor.spec.group_prefix = Some(prefix.clone());
                }
                descriptor
            })
            .collect()
    }
}

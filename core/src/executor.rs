//! Execution of a resolved command chain.
//!
//! The chain runs strictly root to leaf. A non-terminal node runs only when
//! it is flagged `exec_with_subcommands`; the leaf always runs, last. Every
//! node receives the same context and residual arguments, and runs at most
//! once per dispatch.
//!
//! A failing body is handed to that node's own error handler. A recovered
//! failure is recorded and execution continues; an unhandled one stops the
//! chain immediately and becomes [`DispatchError::Unhandled`].

use tracing::debug;

use crate::descriptor::Recovery;
use crate::error::DispatchError;
use crate::parser::ResolvedInvocation;
use crate::tree::CommandNode;

/// A body failure that its error handler swallowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredFailure {
    /// Fully-qualified id of the command that failed.
    pub command: String,
    /// Rendered failure.
    pub message: String,
}

/// Outcome of a successful dispatch.
///
/// # Examples
///
/// ```
/// use command_dispatch_core::{CommandDescriptor, Registry};
///
/// let registry = Registry::build(vec![
///     CommandDescriptor::<(), usize>::new("count", |_, args| Ok(args.len())).with_prefix("!"),
/// ])
/// .unwrap();
///
/// let result = registry.dispatch("!count a b c", &()).unwrap();
/// assert_eq!(result.command, "count");
/// assert_eq!(result.payload, Some(3));
/// assert!(result.is_clean());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult<T> {
    /// Fully-qualified id of the leaf command.
    pub command: String,
    /// The leaf's value, or its handler's recovery value.
    pub payload: Option<T>,
    /// Commands whose bodies ran, in order.
    pub executed: Vec<String>,
    /// Failures swallowed by error handlers along the way.
    pub recovered: Vec<RecoveredFailure>,
}

impl<T> CommandResult<T> {
    /// True when no body failed.
    pub fn is_clean(&self) -> bool {
        self.recovered.is_empty()
    }

    pub fn into_payload(self) -> Option<T> {
        self.payload
    }
}

/// Runs the resolved chain against `ctx`.
///
/// # Errors
///
/// - [`DispatchError::Unhandled`] when a body fails and its handler re-raises.
///   Nodes after the failing one do not run.
/// - [`DispatchError::Internal`] when the chain contains a disabled node.
pub fn execute<C, T>(
    resolved: &ResolvedInvocation<'_, C, T>,
    ctx: &C,
) -> Result<CommandResult<T>, DispatchError> {
    let chain = resolved.chain();
    if let Some(node) = chain.iter().find(|node| node.is_disabled()) {
        return Err(DispatchError::Internal(format!(
            "disabled command {} in resolved chain",
            node.fqid()
        )));
    }
    let Some((leaf, ancestors)) = chain.split_last() else {
        return Err(DispatchError::Internal("empty resolved chain".to_string()));
    };

    let args = resolved.args();
    let mut result = CommandResult {
        command: leaf.fqid().to_string(),
        payload: None,
        executed: Vec::with_capacity(chain.len()),
        recovered: Vec::new(),
    };

    for node in ancestors.iter().filter(|node| node.spec().exec_with_subcommands) {
        debug!(command = node.fqid(), leaf = leaf.fqid(), "running ancestor");
        run_node(node, ctx, args, &mut result)?;
    }

    debug!(command = leaf.fqid(), args = args.len(), "running command");
    let payload = run_node(leaf, ctx, args, &mut result)?;
    result.payload = payload;
    Ok(result)
}

fn run_node<C, T>(
    node: &CommandNode<C, T>,
    ctx: &C,
    args: &[String],
    result: &mut CommandResult<T>,
) -> Result<Option<T>, DispatchError> {
    let command = node.fqid();
    result.executed.push(command.to_string());

    let cause = match node.descriptor().invoke(ctx, args) {
        Ok(value) => return Ok(Some(value)),
        Err(cause) => cause,
    };

    let message = cause.to_string();
    match node.descriptor().handle_failure(ctx, command, cause) {
        Recovery::Recovered(value) => {
            debug!(command, error = %message, "failure recovered");
            result.recovered.push(RecoveredFailure {
                command: command.to_string(),
                message,
            });
            Ok(value)
        }
        Recovery::Unhandled(source) => Err(DispatchError::Unhandled {
            command: command.to_string(),
            source,
        }),
    }
}

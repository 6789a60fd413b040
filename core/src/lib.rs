//! Command registration and dispatch engine.
//!
//! This crate turns a flat list of declared commands into an addressable
//! tree, resolves free-form input against it and runs the matching handlers:
//!
//! - [`CommandDescriptor`]: metadata ([`CommandSpec`]) plus a body and an
//!   error handler. [`CommandGroup`] declares several under one prefix.
//! - [`build_tree`]: validates the batch and assembles a [`CommandTree`]
//!   with dot-joined fully-qualified ids (`main.sub1`).
//! - [`Registry`]: indexes the tree by id, alias and prefix under a
//!   configurable [`AliasScope`].
//! - [`parse`]: maps `"!main sub1 arg1"` to a [`ResolvedInvocation`].
//! - [`execute`]: runs the resolved chain and isolates failures per
//!   command, producing a [`CommandResult`].
//!
//! The registry is immutable once built and can be shared across threads;
//! the `command-dispatch-runtime` crate adds non-blocking dispatch on a
//! worker pool.
//!
//! # Example
//!
//! ```
//! use command_dispatch_core::*;
//!
//! let commands = CommandGroup::<(), String>::new()
//!     .with_prefix("!")
//!     .command(
//!         CommandDescriptor::new("main", |_, _| Ok("main".to_string()))
//!             .with_description("sub command test")
//!             .exec_with_subcommands(),
//!     )
//!     .command(
//!         CommandDescriptor::new("sub1", |_, args| Ok(format!("sub1 {}", args.join(" "))))
//!             .child_of("main"),
//!     );
//!
//! let registry = Registry::build(commands.into_descriptors()).unwrap();
//!
//! let result = registry.dispatch("!main sub1 arg1 arg2", &()).unwrap();
//! assert_eq!(result.executed, vec!["main", "main.sub1"]);
//! assert_eq!(result.payload.as_deref(), Some("sub1 arg1 arg2"));
//!
//! let err = registry.dispatch("?main", &()).unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::NoPrefix);
//! ```

mod descriptor;
mod error;
mod executor;
mod parser;
mod registry;
mod tree;

pub use descriptor::{
    CommandBody, CommandDescriptor, CommandGroup, CommandSpec, ErrorHandler, LogAndRecover,
    Parent, PropagateFailure, ROOT_PARENT, Recovery,
};
pub use error::{BoxError, BuildError, DispatchError, ErrorKind, ParseError, UnresolvedRef};
pub use executor::{CommandResult, RecoveredFailure, execute};
pub use parser::{ResolvedInvocation, parse};
pub use registry::{AliasScope, Registry};
pub use tree::{CommandNode, CommandTree, FQID_SEPARATOR, NodeId, build_tree};

//! Runtime services around the command-dispatch engine.
//!
//! - [`Dispatcher`]: shares one registry between blocking dispatch on the
//!   caller's thread and non-blocking dispatch on a rayon worker pool
//!   ([`Dispatcher::dispatch_async`] returns a [`DispatchHandle`]).
//! - [`Manifest`]: YAML/JSON command declarations, normalized into specs
//!   and bound to bodies through a [`HandlerTable`].
//! - [`RuntimeConfig`]: alias scope and pool sizing, loaded from YAML.
//!
//! # Quick start
//!
//! ```
//! use command_dispatch_runtime::{Dispatcher, HandlerTable, Manifest, RuntimeConfig};
//!
//! let manifest = Manifest::from_yaml_str(r#"
//! groups:
//!   - prefix: "!"
//!     commands:
//!       - id: main
//!         exec_with_subcommands: true
//!         subcommands: [sub1]
//!       - id: sub1
//! "#).unwrap();
//!
//! let table = HandlerTable::<(), String>::new()
//!     .with_body("main", |_, _| Ok("main".into()))
//!     .with_body("sub1", |_, args| Ok(args.join(",")));
//!
//! let dispatcher = Dispatcher::from_manifest(&manifest, &table, &RuntimeConfig::default()).unwrap();
//! let result = dispatcher.dispatch_async("!main sub1 arg1 arg2", ()).wait().unwrap();
//! assert_eq!(result.executed, vec!["main", "main.sub1"]);
//! assert_eq!(result.payload.as_deref(), Some("arg1,arg2"));
//! ```

mod config;
mod dispatcher;
mod error;
mod manifest;

pub use config::{DEFAULT_THREAD_NAME, RuntimeConfig};
pub use dispatcher::{DispatchHandle, DispatchOutcome, Dispatcher};
pub use error::{Result, RuntimeError};
pub use manifest::{CommandEntry, GroupEntry, HandlerTable, Manifest};

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use command_dispatch_core::{
    AliasScope, BoxError, CommandBody, CommandNode, Registry, parse,
};
use command_dispatch_runtime::{Manifest, RuntimeConfig};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Commands are only inspected here, never executed.
type InertRegistry = Registry<(), ()>;

#[derive(Debug, Parser)]
#[command(name = "cmd-dispatch")]
#[command(about = "Inspect and resolve command-dispatch manifests")]
#[command(version)]
struct Cli {
    /// Enable debug logging (overrides RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the registry from a manifest and report any declaration errors.
    Validate(ManifestArgs),
    /// Print the command tree declared by a manifest.
    Tree(TreeArgs),
    /// Resolve an input line to a command chain without executing it.
    Resolve(ResolveArgs),
}

#[derive(Debug, Args)]
struct ManifestArgs {
    /// Manifest file (.json, otherwise YAML).
    manifest: PathBuf,
    /// Runtime configuration YAML (alias scope, workers).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct TreeArgs {
    #[command(flatten)]
    source: ManifestArgs,
    /// Print the tree as JSON instead of an outline.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ResolveArgs {
    #[command(flatten)]
    source: ManifestArgs,
    /// Input line, e.g. "!main sub1 arg1".
    input: String,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Validate(args) => run_validate(args),
        Command::Tree(args) => run_tree(args),
        Command::Resolve(args) => run_resolve(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn alias_scope(config: Option<&PathBuf>) -> Result<AliasScope, String> {
    match config {
        Some(path) => RuntimeConfig::load(path)
            .map(|config| config.alias_scope)
            .map_err(|e| format!("{}: {e}", path.display())),
        None => Ok(AliasScope::default()),
    }
}

fn load_registry(args: &ManifestArgs) -> Result<(Manifest, InertRegistry), String> {
    let manifest =
        Manifest::load(&args.manifest).map_err(|e| format!("{}: {e}", args.manifest.display()))?;
    let scope = alias_scope(args.config.as_ref())?;

    let inert: Arc<dyn CommandBody<(), ()>> = Arc::new(|_: &(), _: &[String]| Ok::<(), BoxError>(()));
    let descriptors = manifest
        .bind_with(|_| Some(Arc::clone(&inert)))
        .map_err(|e| e.to_string())?;
    let registry = Registry::build_with_scope(descriptors, scope).map_err(|e| e.to_string())?;

    debug!(
        manifest = %args.manifest.display(),
        commands = registry.len(),
        ?scope,
        "manifest loaded"
    );
    Ok((manifest, registry))
}

fn run_validate(args: ManifestArgs) -> Result<(), String> {
    let (manifest, registry) = load_registry(&args)?;
    let tree = registry.tree();
    let inactive = tree.iter().filter(|node| !tree.is_active(node.id())).count();

    println!(
        "Validated {} command(s) in {} group(s): {} root(s), {} prefix(es), {} inactive.",
        tree.len(),
        manifest.groups.len(),
        tree.roots().count(),
        registry.prefixes().len(),
        inactive
    );
    Ok(())
}

fn run_tree(args: TreeArgs) -> Result<(), String> {
    let (_, registry) = load_registry(&args.source)?;

    if args.json {
        let nodes: Vec<_> = registry
            .tree()
            .iter()
            .map(|node| node_json(&registry, node))
            .collect();
        let rendered = serde_json::to_string_pretty(&nodes).map_err(|e| e.to_string())?;
        println!("{rendered}");
    } else {
        print!("{}", registry.tree().outline());
    }
    Ok(())
}

fn node_json(registry: &InertRegistry, node: &CommandNode<(), ()>) -> serde_json::Value {
    let tree = registry.tree();
    serde_json::json!({
        "fqid": node.fqid(),
        "depth": node.depth(),
        "parent": node.parent().map(|parent| tree.node(parent).fqid()),
        "active": tree.is_active(node.id()),
        "spec": node.spec(),
    })
}

fn run_resolve(args: ResolveArgs) -> Result<(), String> {
    let (_, registry) = load_registry(&args.source)?;
    let resolved = parse(&args.input, &registry).map_err(|e| e.to_string())?;

    let chain: Vec<&str> = resolved.chain().iter().map(|node| node.fqid()).collect();
    let executes: Vec<&str> = resolved
        .chain()
        .iter()
        .enumerate()
        .filter(|(index, node)| {
            *index + 1 == resolved.chain().len() || node.spec().exec_with_subcommands
        })
        .map(|(_, node)| node.fqid())
        .collect();

    let output = serde_json::json!({
        "prefix": resolved.prefix(),
        "command": resolved.fqid(),
        "chain": chain,
        "executes": executes,
        "args": resolved.args(),
    });
    let rendered = serde_json::to_string_pretty(&output).map_err(|e| e.to_string())?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_missing_config_defaults_to_per_parent() {
        assert_eq!(alias_scope(None).unwrap(), AliasScope::PerParent);
    }

    #[test]
    fn test_unreadable_config_names_path() {
        let path = PathBuf::from("/nonexistent/runtime.yaml");
        let err = alias_scope(Some(&path)).unwrap_err();
        assert!(err.starts_with("/nonexistent/runtime.yaml"));
    }
}

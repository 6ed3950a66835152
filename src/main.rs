mod alias;
mod config;
mod editor;
mod error;
mod kube;
mod kubeconfig;
mod logging;
mod marker;
mod picker;
mod store;
mod switch;

use std::borrow::Cow;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand, ValueEnum};

use crate::config::Config;
use crate::editor::CommandEditor;
use crate::kube::ApiNamespaceLister;
use crate::picker::FzfPicker;
use crate::store::FileStore;
use crate::switch::{render_table, SetOutcome, Switcher};

/// Switch between kubernetes clusters and namespaces.
#[derive(Parser, Debug)]
#[command(author, about)]
#[command(disable_version_flag = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Use this kubeconfig file rather than the default one.
    #[clap(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Show build info.
    #[clap(long)]
    build: bool,

    /// Show version
    #[clap(long, short)]
    version: bool,

    /// Generate completion items. PLEASE DONOT USE DIRECTLY.
    #[clap(long, hide = true, value_enum)]
    comp: Option<CompleteKind>,

    /// The completion args. PLEASE DONOT USE DIRECTLY.
    #[clap(last = true, hide = true)]
    comp_args: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Switch to a cluster, `-` switches back to the last one.
    Use {
        /// The cluster name, select one interactively if omitted.
        name: Option<String>,
    },

    /// Switch to a namespace, `-` switches back to the last one.
    Ns {
        /// The namespace name, select one interactively if omitted.
        name: Option<String>,
    },

    /// Set cluster, open an editor to edit its cluster and user.
    Set {
        /// The merge config filename, if not provided, will open an editor to edit config.
        #[clap(long, short)]
        file: Option<PathBuf>,

        name: String,
    },

    /// Delete a cluster.
    Del { name: String },

    /// List clusters.
    List {
        /// Show more info.
        #[clap(long, short)]
        wide: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CompleteKind {
    Context,
    Namespace,
}

impl Args {
    fn parse_with_name(name: &'static str) -> Args {
        let matches = Args::command().name(name).bin_name(name).get_matches();
        match Args::from_arg_matches(&matches) {
            Ok(args) => args,
            Err(err) => err.exit(),
        }
    }

    fn run(&self, cfg: &Config) -> Result<()> {
        let store = FileStore::new(cfg.kubeconfig_path(self.kubeconfig.as_deref())?);
        let picker = FzfPicker::new(cfg.picker.as_str());
        let editor = CommandEditor::new(cfg.editor.as_str());
        let switcher = Switcher {
            cfg,
            store: &store,
            picker: &picker,
            lister: &ApiNamespaceLister,
            editor: &editor,
        };

        match self.command.as_ref() {
            None => {
                let current = switcher.current()?;
                eprintln!("Current cluster: {}", current.context);
                eprintln!("Current namespace: {}", current.namespace);
            }
            Some(Commands::Use { name }) => {
                let name = switcher.use_context(name.as_deref())?;
                eprintln!("Switch to cluster {name}");
            }
            Some(Commands::Ns { name }) => {
                let ns = switcher.use_namespace(name.as_deref())?;
                eprintln!("Switch to namespace {ns}");
            }
            Some(Commands::Set { file, name }) => {
                match switcher.set_cluster(name, file.as_deref())? {
                    SetOutcome::Updated => eprintln!("Set cluster {name:?} done."),
                    SetOutcome::Cancelled => eprintln!("None cluster, cancel set"),
                }
            }
            Some(Commands::Del { name }) => {
                switcher.delete_cluster(name)?;
                eprintln!("Delete cluster {name:?}");
            }
            Some(Commands::List { wide }) => {
                let rows = switcher.list(*wide)?;
                eprint!("{}", render_table(&rows));
            }
        }

        Ok(())
    }

    /// Print completion candidates on stdout. Nothing here may fail loudly,
    /// the caller is a shell completion function.
    fn complete(&self, cfg: &Config, kind: CompleteKind) {
        let path = match cfg.kubeconfig_path(self.kubeconfig.as_deref()) {
            Ok(path) => path,
            Err(_) => return,
        };
        let store = FileStore::new(path);
        let picker = FzfPicker::new(cfg.picker.as_str());
        let editor = CommandEditor::new(cfg.editor.as_str());
        let switcher = Switcher {
            cfg,
            store: &store,
            picker: &picker,
            lister: &ApiNamespaceLister,
            editor: &editor,
        };

        let (consumed, prefix) = match self.comp_args.split_last() {
            Some((prefix, consumed)) => (consumed, prefix.as_str()),
            None => (&[][..], ""),
        };
        let items = match kind {
            CompleteKind::Context => switcher.complete_contexts(consumed, prefix),
            CompleteKind::Namespace => switcher.complete_namespaces(consumed, prefix),
        };
        for item in items {
            println!("{item}");
        }
    }
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cfg = Config::load().context("load config");
    let cmd_name = match cfg.as_ref() {
        Ok(cfg) => get_cmd_name(cfg),
        Err(_) => "kubeswitch",
    };

    let args = Args::parse_with_name(cmd_name);
    if let Some(kind) = args.comp {
        if let Ok(cfg) = cfg.as_ref() {
            args.complete(cfg, kind);
        }
        return Ok(());
    }

    let cfg = cfg?;
    if args.version {
        show_version(&cfg);
        return Ok(());
    }

    if args.build {
        show_build_info(&cfg);
        return Ok(());
    }

    args.run(&cfg)
}

fn show_version(cfg: &Config) {
    eprintln!("{} {}", get_cmd_name(cfg), env!("BUILD_VERSION"));
}

fn show_build_info(cfg: &Config) {
    show_version(cfg);
    eprintln!(
        "rustc {}-{}-{}",
        env!("VERGEN_RUSTC_SEMVER"),
        env!("VERGEN_RUSTC_LLVM_VERSION"),
        env!("VERGEN_RUSTC_CHANNEL")
    );

    eprintln!();
    eprintln!("Build type:   {}", env!("BUILD_TYPE"));
    eprintln!("Build target: {}", env!("BUILD_TARGET"));
    eprintln!("Commit SHA:   {}", env!("BUILD_SHA"));
    eprintln!("Build time:   {}", env!("VERGEN_BUILD_TIMESTAMP"));

    eprintln!();
    let path = match cfg.path.as_ref() {
        Some(path) => Cow::Owned(format!("{}", path.display())),
        None => Cow::Borrowed("N/A"),
    };
    eprintln!("Config path: {path}");
}

fn get_cmd_name(cfg: &Config) -> &'static str {
    Box::leak(cfg.cmd.clone().into_boxed_str())
}

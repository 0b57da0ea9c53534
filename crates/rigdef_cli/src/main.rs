// SPDX-License-Identifier: MIT OR Apache-2.0
//! rigdef - load a rig definition and print its evaluation order
//!
//! The rig file is loaded into a scene graph, every loaded item is handed
//! to a traverser, and the traversal order is printed one item per line
//! as `index path [type]`.

mod rig_file;
mod settings;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use rigdef_graph::{DiscoveryMode, LoadReport, Loader, Record, SceneGraph, SceneItem, Traverser};
use settings::RigdefSettings;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "rigdef")]
#[command(about = "Load a rig definition and print its evaluation order")]
#[command(version)]
struct Cli {
    /// Rig file (`.json`, otherwise RON)
    rig_file: PathBuf,

    /// RON settings file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Relation followed while ordering items
    #[arg(long, value_enum)]
    discovery: Option<Discovery>,

    /// Emit every item after the items it discovers
    #[arg(long)]
    post_order: bool,

    /// Only print items built as one of these type names
    #[arg(long = "type", value_name = "NAME")]
    types: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Discovery {
    /// Follow sources
    Sources,
    /// Follow owned children
    Children,
}

impl From<Discovery> for DiscoveryMode {
    fn from(discovery: Discovery) -> Self {
        match discovery {
            Discovery::Sources => Self::Sources,
            Discovery::Children => Self::Children,
        }
    }
}

impl Cli {
    /// Settings file merged with command line overrides
    fn resolved_settings(&self) -> anyhow::Result<RigdefSettings> {
        let mut settings = match &self.settings {
            Some(path) => RigdefSettings::load(path)?,
            None => RigdefSettings::default(),
        };
        if let Some(discovery) = self.discovery {
            settings.traversal.discovery = discovery.into();
        }
        if self.post_order {
            settings.traversal.discovered_items_first = false;
        }
        Ok(settings)
    }
}

/// Loaded rig in evaluation order
struct Evaluation {
    lines: Vec<String>,
    report: LoadReport,
}

fn evaluate(records: &[Record], settings: &RigdefSettings, types: &[String]) -> anyhow::Result<Evaluation> {
    let mut graph = SceneGraph::new();
    let mut loader = Loader::new(&mut graph).with_settings(&settings.load);
    loader.load_records(records).context("loading rig")?;
    let report = loader.finish();

    // Source discovery walks towards drivers, so every item is a root.
    let mut traverser = Traverser::new();
    traverser.add_root_items(graph.items().map(SceneItem::id));
    traverser.traverse_with(&graph, &settings.traversal, |item| {
        tracing::trace!(item = %item.id(), name = %item.name, "ordered");
    });

    let selected = if types.is_empty() {
        traverser.items().to_vec()
    } else {
        let types: Vec<&str> = types.iter().map(String::as_str).collect();
        traverser.get_items_of_type(&graph, &types)
    };

    let lines = selected
        .iter()
        .enumerate()
        .filter_map(|(index, id)| {
            let item = graph.item(*id)?;
            let path = graph.path(*id)?;
            Some(format!("{index} {path} [{}]", item.type_name()))
        })
        .collect();

    Ok(Evaluation { lines, report })
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let settings = cli.resolved_settings()?;
    let records = rig_file::read_records(&cli.rig_file)?;
    tracing::info!(
        file = %cli.rig_file.display(),
        roots = records.len(),
        "loading rig definition"
    );

    let evaluation = evaluate(&records, &settings, &cli.types)?;
    for path in &evaluation.report.unresolved {
        tracing::warn!(path = %path, "unresolved reference");
    }
    for line in &evaluation.lines {
        println!("{line}");
    }
    tracing::info!(
        built = evaluation.report.built,
        printed = evaluation.lines.len(),
        "done"
    );
    Ok(())
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rigdef_graph=info,rigdef=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

//! Scene file tool
//!
//! Run with: cargo run -p void_scene -- <command>
//!
//! Commands:
//!   compose <out.json> <model>...     Write a scene with one node per model
//!   import <scene.json> [asset_dir]   Load a scene and print the result
//!   show <scene.json>                 Print the records of a scene file

use std::path::{Path, PathBuf};
use std::time::Duration;

use void_asset::{AssetServer, AssetServerConfig};
use void_scene::{
    ImportReport, NodeHandle, RecordOutcome, SceneError, SceneGraph, SceneLoadListener,
    SceneSerializer, SerializerConfig,
};

const USAGE: &str = "usage:
  void_scene compose <out.json> <model>...
  void_scene import <scene.json> [asset_dir]
  void_scene show <scene.json>";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        Some("compose") if args.len() >= 3 => compose(Path::new(&args[1]), &args[2..]),
        Some("import") if args.len() >= 2 => {
            import(Path::new(&args[1]), args.get(2).map(PathBuf::from))
        }
        Some("show") if args.len() == 2 => show(Path::new(&args[1])),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn compose(out: &Path, models: &[String]) -> Result<(), SceneError> {
    let mut graph = SceneGraph::new();
    let root = graph.root();
    let mut serializer = SceneSerializer::new(SerializerConfig::load_or_default());

    for model in models {
        let node = graph.create_node(model.as_str());
        graph.add_child(root, node);
        serializer.add_to_scene_data(&mut graph, node, model)?;
    }

    serializer.export_scene_to(&graph, out)?;
    println!("Wrote {} nodes to {}", models.len(), out.display());
    Ok(())
}

/// Prints import progress as it happens
struct ConsoleListener {
    report: Option<ImportReport>,
}

impl SceneLoadListener for ConsoleListener {
    fn on_environment_loaded(&mut self, graph: &mut SceneGraph, environment: Option<NodeHandle>) {
        match environment.and_then(|h| graph.get(h)) {
            Some(node) => {
                let (scale, _, _) = node.transform.to_scale_rotation_translation();
                println!("environment: {:?}", scale)
            }
            None => println!("environment: none"),
        }
    }

    fn on_node_loaded(&mut self, graph: &mut SceneGraph, node: NodeHandle) {
        if let Some(n) = graph.get(node) {
            println!("loaded {}", n.name);
        }
    }

    fn on_record_outcome(&mut self, name: &str, source_path: &str, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Loaded { texture_errors, .. } if *texture_errors > 0 => {
                println!("  {} has {} missing textures", name, texture_errors)
            }
            RecordOutcome::Loaded { .. } => {}
            RecordOutcome::LoadFailed(e) | RecordOutcome::NotIssued(e) => {
                println!("dropped {} ({}): {}", name, source_path, e)
            }
            RecordOutcome::Cancelled => println!("cancelled {}", name),
        }
    }

    fn on_import_finished(&mut self, report: &ImportReport) {
        self.report = Some(report.clone());
    }
}

fn import(scene: &Path, asset_dir: Option<PathBuf>) -> Result<(), SceneError> {
    let mut server_config = AssetServerConfig::default();
    if let Some(dir) = asset_dir {
        server_config.asset_dir = dir;
    } else if let Some(parent) = scene.parent() {
        server_config.asset_dir = parent.to_path_buf();
    }
    let server = AssetServer::new(server_config).map_err(|e| SceneError::Config(e.to_string()))?;

    let mut graph = SceneGraph::new();
    let root = graph.root();
    let mut serializer = SceneSerializer::new(SerializerConfig::load_or_default());
    let mut listener = ConsoleListener { report: None };

    serializer.import_scene_from(scene, &mut graph, root, &server, &mut listener);
    while serializer.is_importing() {
        match server.wait_event(Duration::from_secs(30)) {
            Some(event) => {
                serializer.handle_event(&event, &mut graph, &server, &mut listener);
            }
            None => {
                log::warn!("Timed out waiting for assets");
                serializer.cancel_import(&mut listener);
            }
        }
    }

    if let Some(report) = &listener.report {
        println!(
            "{} loaded, {} failed, {} not issued",
            report.loaded, report.failed, report.not_issued
        );
    }
    print_tree(&graph, root, 0);
    Ok(())
}

fn print_tree(graph: &SceneGraph, node: NodeHandle, depth: usize) {
    let Some(n) = graph.get(node) else {
        return;
    };
    let translation = n.transform.w_axis;
    println!(
        "{}{} @ ({:.2}, {:.2}, {:.2})",
        "  ".repeat(depth),
        n.name,
        translation.x,
        translation.y,
        translation.z
    );
    for child in n.children() {
        print_tree(graph, *child, depth + 1);
    }
}

fn show(scene: &Path) -> Result<(), SceneError> {
    let snapshot = SceneSerializer::read_snapshot(scene)?;

    match snapshot.environment() {
        Some(env) => println!("environment: {} (scale {})", env.source_path, env.scale),
        None => println!("environment: none"),
    }
    for record in snapshot.nodes() {
        let t = record.transform().w_axis;
        println!(
            "{:<24} {:<32} @ ({:.2}, {:.2}, {:.2})",
            record.name, record.source_path, t.x, t.y, t.z
        );
    }
    Ok(())
}

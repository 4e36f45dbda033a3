//! Layer editor demo binary.

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use editor::{EditorConfig, EditorSession};
use layers::{InsertTarget, PanelEdit, RenderEnv};

/// Layer editor - builds a small design and renders it to a scene tree
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<String>,

    /// Render as a read-only preview
    #[arg(long)]
    preview: bool,

    /// Canvas width
    #[arg(long)]
    width: Option<f32>,

    /// Canvas height
    #[arg(long)]
    height: Option<f32>,

    /// Quiet period before derived content is recomputed
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the scene tree
    #[arg(long)]
    dump_scene: bool,
}

impl Args {
    fn editor_config(&self) -> Result<EditorConfig> {
        let mut config = match &self.config {
            Some(path) => EditorConfig::from_json_file(path)?,
            None => EditorConfig::default(),
        };
        if self.preview {
            config = config.with_env(RenderEnv::Preview);
        }
        if self.width.is_some() || self.height.is_some() {
            let width = self.width.unwrap_or(config.canvas_width);
            let height = self.height.unwrap_or(config.canvas_height);
            config = config.with_canvas(width, height);
        }
        if let Some(ms) = self.debounce_ms {
            config = config.with_debounce_ms(ms);
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_logging(verbose: bool) -> Result<()> {
    if std::env::var_os("RUST_LOG").is_some() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let log_level = if verbose { Level::DEBUG } else { Level::INFO };
        let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose)?;

    info!("Layer editor v{}", editor::VERSION);
    let config = args.editor_config()?;
    let settle = config.debounce() + std::time::Duration::from_millis(50);
    let mut session = EditorSession::new(config)?;

    let types: Vec<String> = session.registry().type_ids().map(str::to_string).collect();
    info!(types = ?types, "plugins registered");

    let backdrop = session.create_layer("rect", &json!({"name": "Backdrop", "x": 40.0, "y": 40.0}));
    let code = session.create_layer("qrcode", &json!({"x": 80.0, "y": 80.0, "width": 240.0, "height": 240.0}));
    if let Some(group) = session.create_layer("group", &json!({"name": "Badge", "x": 400.0, "y": 60.0})) {
        let caption = session.registry().create("rect", &json!({"name": "Caption", "height": 40.0}))?;
        session.add_layer(caption, InsertTarget::into_group(group))?;
    }
    if session.create_layer("sticker", &json!({})).is_none() {
        for notice in session.store().take_notices() {
            info!(level = ?notice.level, "{}", notice.message);
        }
    }

    let report = session.flush();
    info!(mounted = report.mounted, "initial render");

    if let Some(id) = code {
        session.select(&[id]);
        for text in ["https://example.com/a", "https://example.com/ab"] {
            session.edit(PanelEdit::input("content", json!(text)))?;
            session.flush();
        }
        session.edit(PanelEdit::commit("content", json!("https://example.com/abc")))?;
        session.flush();
    }
    if backdrop.is_none() {
        warn!("backdrop layer missing");
    }

    tokio::time::sleep(settle).await;
    session.flush();

    let debouncer = session.store().debouncer();
    info!(
        layers = session.stage().mounted_count(),
        encodes = debouncer.applied_count(),
        superseded = debouncer.superseded_count(),
        history = session.store().history_entries().len(),
        "design ready"
    );

    if args.dump_scene {
        println!("Scene:");
        println!("{}", session.dump_scene());
    }

    session.shutdown();
    info!("Editor shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default() {
        let args = Args::parse_from(["layer-editor"]);
        assert!(!args.preview);
        assert!(!args.dump_scene);
        assert_eq!(args.editor_config().unwrap(), EditorConfig::default());
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::parse_from(["layer-editor", "--preview", "--width", "640", "--debounce-ms", "20"]);
        let config = args.editor_config().unwrap();
        assert_eq!(config.env, RenderEnv::Preview);
        assert_eq!(config.canvas_width, 640.0);
        assert_eq!(config.canvas_height, 720.0);
        assert_eq!(config.debounce_ms, 20);
    }

    #[test]
    fn test_args_invalid_size() {
        let args = Args::parse_from(["layer-editor", "--height", "0"]);
        assert!(args.editor_config().is_err());
    }
}

//! Query CLI
//!
//! Drives the feature query engine against a live map server: list layers,
//! inspect searchable fields, identify features at a point, select by box,
//! run attribute searches and fetch value suggestions.

mod catalog;
mod output;

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use feature_query::{Credential, EngineConfig, FeatureQueryEngine, ServiceEndpoint, ViewState};
use map_common::{ComparisonOperator, CrsCode, Extent};

use catalog::{load_catalog, parse_layer_ids};
use output::{
    render_layers, render_resolution, render_schema, render_search, render_suggestions,
    OutputFormat,
};

#[derive(Parser, Debug)]
#[command(name = "query-cli")]
#[command(about = "Point, box and attribute queries against a WMS/WFS map server")]
struct Cli {
    /// Base URL of the map server (WMS at {url}/wms, WFS at {url}/wfs)
    #[arg(long, env = "QUERY_BASE_URL")]
    url: String,

    /// Layer catalog (YAML)
    #[arg(long, env = "QUERY_CATALOG")]
    catalog: PathBuf,

    /// Engine configuration (YAML); defaults apply when omitted
    #[arg(long, env = "QUERY_CONFIG")]
    config: Option<PathBuf>,

    /// Basic auth user
    #[arg(long, env = "QUERY_USER")]
    user: Option<String>,

    /// Basic auth password
    #[arg(long, env = "QUERY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Raw Authorization header value, used instead of basic auth
    #[arg(long, env = "QUERY_AUTH_HEADER", hide_env_values = true)]
    auth_header: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Log level
    #[arg(long, default_value = "warn", env = "RUST_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List catalog layers
    Layers {
        /// Only show layers of these workspaces
        #[arg(short, long)]
        workspace: Vec<String>,
    },

    /// Show the searchable fields of a layer
    Fields {
        /// Layer name (workspace:name)
        layer: String,
    },

    /// Identify the first feature at a map coordinate
    Point {
        /// X coordinate in the view CRS
        #[arg(short, long, allow_hyphen_values = true)]
        x: f64,

        /// Y coordinate in the view CRS
        #[arg(short, long, allow_hyphen_values = true)]
        y: f64,

        /// Visible layers, highest priority first
        #[arg(short, long = "layer", required = true)]
        layers: Vec<String>,

        #[command(flatten)]
        view: ViewArgs,
    },

    /// Select all features inside a box
    Box {
        /// minx,miny,maxx,maxy in the view CRS
        #[arg(short, long, allow_hyphen_values = true)]
        bbox: String,

        /// Visible layers
        #[arg(short, long = "layer", required = true)]
        layers: Vec<String>,

        #[command(flatten)]
        view: ViewArgs,
    },

    /// Run a single-predicate attribute search
    Search {
        /// Layer name (workspace:name)
        layer: String,

        /// Field to compare
        field: String,

        /// Operator: =, <>, >, <, >=, <=
        #[arg(allow_hyphen_values = true)]
        operator: String,

        /// Value as typed
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Suggest values of a text field starting with a prefix
    Suggest {
        /// Layer name (workspace:name)
        layer: String,

        /// Text field
        field: String,

        /// Typed prefix
        prefix: String,
    },
}

#[derive(clap::Args, Debug)]
struct ViewArgs {
    /// View reference system
    #[arg(long, default_value = "EPSG:3857")]
    crs: String,

    /// View resolution (map units per pixel)
    #[arg(short, long, default_value_t = 10.0)]
    resolution: f64,

    /// Viewport width in pixels
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Viewport height in pixels
    #[arg(long, default_value_t = 600)]
    height: u32,
}

impl ViewArgs {
    fn to_view(&self) -> Result<ViewState> {
        let crs = CrsCode::parse(&self.crs)
            .with_context(|| format!("Invalid view CRS '{}'", self.crs))?;
        if !(self.resolution.is_finite() && self.resolution > 0.0) {
            bail!("Resolution must be a positive number");
        }
        Ok(ViewState::new(crs, self.resolution, (self.width, self.height)))
    }
}

fn credential(cli: &Cli) -> Result<Option<Credential>> {
    if let Some(value) = &cli.auth_header {
        return Ok(Some(Credential::Header {
            value: value.clone(),
        }));
    }
    match (&cli.user, &cli.password) {
        (Some(username), Some(password)) => Ok(Some(Credential::Basic {
            username: username.clone(),
            password: password.clone(),
        })),
        (Some(_), None) => bail!("--user requires --password"),
        _ => Ok(None),
    }
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load engine config from {:?}", path))?,
        None => EngineConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr);

    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli);

    let config = load_config(&cli)?;
    let mut endpoint = ServiceEndpoint::new(&cli.url);
    if let Some(credential) = credential(&cli)? {
        endpoint = endpoint.with_credential(credential);
    }

    let engine = FeatureQueryEngine::with_http(config, endpoint)
        .map_err(|e| anyhow!("{}", e.user_message()))?;

    let catalog = load_catalog(&cli.catalog)?;
    let loaded = engine.load_layers(&catalog.layers).await;
    info!(catalog = ?cli.catalog, loaded, "Layer catalog loaded");

    let rendered = run(&engine, &cli.command, cli.format).await?;
    print!("{}", rendered);
    Ok(())
}

async fn run(engine: &FeatureQueryEngine, command: &Commands, format: OutputFormat) -> Result<String> {
    match command {
        Commands::Layers { workspace } => {
            if workspace.is_empty() {
                engine.select_all_workspaces().await;
            } else {
                engine.select_workspaces(workspace).await;
            }
            render_layers(&engine.filtered_layers().await, format)
        }

        Commands::Fields { layer } => {
            let id = single_layer(layer)?;
            let schema = engine
                .choose_search_layer(&id)
                .await
                .map_err(|e| anyhow!("{}", e.user_message()))?;
            render_schema(&schema, format)
        }

        Commands::Point { x, y, layers, view } => {
            let view = view.to_view()?;
            show_layers(engine, layers).await?;
            let resolution = engine
                .resolve_point((*x, *y), &view)
                .await
                .map_err(|e| anyhow!("{}", e.user_message()))?;
            render_resolution(&resolution, format)
        }

        Commands::Box { bbox, layers, view } => {
            let view = view.to_view()?;
            let extent = Extent::from_wms_string(bbox)
                .with_context(|| format!("Invalid bbox '{}'", bbox))?
                .normalized();
            show_layers(engine, layers).await?;
            let resolution = engine
                .select_box(&extent, &view)
                .await
                .map_err(|e| anyhow!("{}", e.user_message()))?;
            render_resolution(&resolution, format)
        }

        Commands::Search {
            layer,
            field,
            operator,
            value,
        } => {
            let id = single_layer(layer)?;
            let operator = ComparisonOperator::from_symbol(operator)
                .ok_or_else(|| anyhow!("Unknown operator '{}'", operator))?;

            let outcome = async {
                engine.choose_search_layer(&id).await?;
                engine.choose_search_field(field).await?;
                engine.set_search_operator(operator).await?;
                engine.set_search_value(value).await?;
                engine.submit_search().await
            }
            .await
            .map_err(|e| anyhow!("{}", e.user_message()))?;
            render_search(&outcome, format)
        }

        Commands::Suggest {
            layer,
            field,
            prefix,
        } => {
            let id = single_layer(layer)?;
            let values = engine
                .suggest(&id, field, prefix)
                .await
                .map_err(|e| anyhow!("{}", e.user_message()))?;
            render_suggestions(&values, format)
        }
    }
}

fn single_layer(name: &str) -> Result<map_common::LayerId> {
    let mut ids = parse_layer_ids(&[name.to_string()])?;
    ids.pop().ok_or_else(|| anyhow!("No layer given"))
}

/// Switch the given layers on, in priority order.
async fn show_layers(engine: &FeatureQueryEngine, names: &[String]) -> Result<()> {
    for id in parse_layer_ids(names)? {
        engine
            .set_layer_visible(&id, true)
            .await
            .map_err(|e| anyhow!("{}", e.user_message()))?;
        debug!(layer = %id, "Layer visible");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point_command() {
        let cli = Cli::try_parse_from([
            "query-cli",
            "--url",
            "http://maps.test/geoserver",
            "--catalog",
            "catalog.yaml",
            "point",
            "-x",
            "-5700000",
            "-y",
            "-3500000",
            "--layer",
            "city:parks",
            "--layer",
            "city:roads",
        ])
        .unwrap();

        match cli.command {
            Commands::Point { x, y, layers, view } => {
                assert_eq!(x, -5_700_000.0);
                assert_eq!(y, -3_500_000.0);
                assert_eq!(layers, vec!["city:parks", "city:roads"]);
                assert_eq!(view.crs, "EPSG:3857");
                assert_eq!(view.resolution, 10.0);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_point_requires_a_layer() {
        let result = Cli::try_parse_from([
            "query-cli",
            "--url",
            "http://maps.test/geoserver",
            "--catalog",
            "catalog.yaml",
            "point",
            "-x",
            "1",
            "-y",
            "2",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_search_command() {
        let cli = Cli::try_parse_from([
            "query-cli",
            "--url",
            "http://maps.test/geoserver",
            "--catalog",
            "catalog.yaml",
            "--format",
            "json",
            "search",
            "city:buildings",
            "height",
            ">=",
            "-5",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Search {
                operator, value, ..
            } => {
                assert_eq!(
                    ComparisonOperator::from_symbol(&operator),
                    Some(ComparisonOperator::Ge)
                );
                assert_eq!(value, "-5");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_view_args_validation() {
        let view = ViewArgs {
            crs: "EPSG:4326".to_string(),
            resolution: 0.001,
            width: 1024,
            height: 768,
        };
        let state = view.to_view().unwrap();
        assert_eq!(state.crs, CrsCode::wgs84());
        assert_eq!(state.viewport, Some((1024, 768)));

        let bad = ViewArgs {
            resolution: 0.0,
            ..view
        };
        assert!(bad.to_view().is_err());
    }

    fn cli_with(args: &[&str]) -> Cli {
        let mut argv = vec!["query-cli", "--url", "http://maps.test", "--catalog", "c.yaml"];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["layers"]);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_credential_selection() {
        let header = cli_with(&["--auth-header", "Bearer abc", "--user", "ana", "--password", "x"]);
        assert_eq!(
            credential(&header).unwrap(),
            Some(Credential::Header {
                value: "Bearer abc".to_string()
            })
        );

        let basic = cli_with(&["--user", "ana", "--password", "x"]);
        assert!(matches!(
            credential(&basic).unwrap(),
            Some(Credential::Basic { .. })
        ));

        let incomplete = cli_with(&["--user", "ana"]);
        assert!(credential(&incomplete).is_err());
    }
}

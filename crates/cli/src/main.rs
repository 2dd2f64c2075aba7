use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use tracing::{error, info};

use kubesnap_export::{ExportConfig, OutputFormat};

#[derive(Parser, Debug)]
#[command(
    name = "kubesnap",
    version,
    about = "Export sanitized resources from a Kubernetes cluster",
    after_help = "Examples:\n  \
        # export every exportable namespaced type into ./exported\n  \
        kubesnap --dir exported\n\n  \
        # export only deployments and jobs\n  \
        kubesnap deployments jobs"
)]
struct Cli {
    /// Resource types to export; defaults to every exportable namespaced type
    resource_types: Vec<String>,

    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t = Output::Yaml)]
    output: Output,

    /// Output directory (must be empty unless --force)
    #[arg(long = "dir", default_value = "output")]
    dir: PathBuf,

    /// Clear the output directory first when it is not empty
    #[arg(long = "force", action = ArgAction::SetTrue)]
    force: bool,

    /// Kubeconfig context (default: current context)
    #[arg(long = "context")]
    context: Option<String>,

    /// Cluster name override
    #[arg(long = "cluster")]
    cluster: Option<String>,

    /// Kubernetes namespace (default: current context)
    #[arg(long = "ns")]
    namespace: Option<String>,

    /// Resource types excluded from discovery
    #[arg(long = "exclude", value_delimiter = ',', default_value = "endpoints,events")]
    exclude: Vec<String>,

    /// Continue past failed resource types/objects and report them at the end
    #[arg(long = "keep-going", action = ArgAction::SetTrue)]
    keep_going: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Yaml,
    Json,
}

impl From<Output> for OutputFormat {
    fn from(o: Output) -> Self {
        match o {
            Output::Yaml => OutputFormat::Yaml,
            Output::Json => OutputFormat::Json,
        }
    }
}

fn init_tracing() {
    let env = std::env::var("KUBESNAP_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("KUBESNAP_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid KUBESNAP_METRICS_ADDR; expected host:port");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    let cfg = ExportConfig {
        context: cli.context,
        cluster: cli.cluster,
        namespace: cli.namespace,
        output_dir: cli.dir,
        force: cli.force,
        format: cli.output.into(),
        exclude: cli.exclude,
        resource_types: cli.resource_types,
        keep_going: cli.keep_going,
    };

    match kubesnap_export::run(&cfg).await {
        Ok(summary) if summary.clean() => {
            info!(exported = summary.exported, vetoed = summary.vetoed, "done");
            Ok(())
        }
        Ok(summary) => {
            for plural in &summary.failed_types {
                error!(resource = %plural, "resource type failed to list");
            }
            for object in &summary.skipped_objects {
                error!(object = %object, "object skipped on processing error");
            }
            anyhow::bail!(
                "export finished with failures: {} resource type(s), {} object(s)",
                summary.failed_types.len(),
                summary.skipped_objects.len()
            );
        }
        Err(e) => {
            error!(error = ?e, "export failed");
            Err(e)
        }
    }
}

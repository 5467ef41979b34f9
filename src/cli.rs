use crate::config::BuilderConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "topology-builder")]
#[command(version)]
#[command(about = "Converge a Kafka cluster onto a declared topology", long_about = None)]
pub struct Cli {
    /// Topology descriptor file or directory of descriptors
    #[arg(value_name = "TOPOLOGY")]
    pub topology: Option<PathBuf>,

    /// Topology descriptor file or directory (alternative to the positional argument)
    #[arg(long = "topology", value_name = "PATH", conflicts_with = "topology")]
    pub topology_flag: Option<PathBuf>,

    /// Bootstrap brokers of the target cluster
    #[arg(long, env = "TOPOLOGY_BROKERS")]
    pub brokers: Option<String>,

    /// Client configuration (properties) file
    #[arg(long, env = "TOPOLOGY_CLIENT_CONFIG", value_name = "FILE")]
    pub client_config: PathBuf,

    /// Delete topics and bindings that are no longer described
    #[arg(long)]
    pub allow_delete: bool,

    /// Print the execution plan without applying it
    #[arg(long)]
    pub dry_run: bool,

    /// Only parse and validate the topology
    #[arg(long)]
    pub validate: bool,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress the state report and non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Topology path from either the positional argument or `--topology`.
    pub fn topology_path(&self) -> Option<PathBuf> {
        self.topology.clone().or_else(|| self.topology_flag.clone())
    }

    pub fn builder_config(&self, topology: PathBuf) -> BuilderConfig {
        BuilderConfig {
            brokers: self.brokers.clone(),
            allow_delete: self.allow_delete,
            dry_run: self.dry_run,
            quiet: self.quiet,
            ..BuilderConfig::new(topology, self.client_config.clone())
        }
    }
}

pub mod chat;
pub mod config_cmd;
pub mod run;
pub mod validate;

use std::path::PathBuf;
use clap::Args;

/// Options shared by `run` and `chat`.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Config file (defaults to ~/.agentflow/config.toml)
    #[arg(short, long, env = "AGENTFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Agent to talk to (defaults to the configured root agent)
    #[arg(short, long)]
    pub agent: Option<String>,

    /// JSON script of model turns to replay
    #[arg(short, long)]
    pub replay: Option<PathBuf>,

    /// Stream events as they happen
    #[arg(short, long)]
    pub stream: bool,

    /// Print stream events as JSON lines (implies --stream)
    #[arg(long)]
    pub json: bool,

    /// Print a usage summary after each response
    #[arg(short, long)]
    pub usage: bool,
}

impl SessionArgs {
    pub fn streaming(&self) -> bool {
        self.stream || self.json
    }
}

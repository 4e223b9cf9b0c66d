//! Background removal HTTP service
//!
//! Serves `POST /remove-background` plus `/` and `/health` on top of the
//! bgremove-compose pipeline.

use bgremove_compose::{
    server::{self, ServerArgs},
    tracing_config::init_server_tracing,
};
use clap::Parser;

fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    init_server_tracing(args.verbose, args.log_format)?;

    let config = args.into_config()?;
    server::run(config)
}

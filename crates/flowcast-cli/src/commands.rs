use anyhow::Result;

use crate::args::{Cli, Commands};
use crate::context::HandlerContext;
use crate::handlers;

pub fn run(cli: Cli) -> Result<()> {
    let data_path = cli.data_path.as_deref();

    match &cli.command {
        Commands::Simulate(args) => {
            let ctx = HandlerContext::load(data_path, &args.source.source)?;
            handlers::simulate::handle(&ctx, args, cli.format)
        }
        Commands::Discover(args) => {
            let ctx = HandlerContext::load(data_path, &args.source.source)?;
            handlers::discover::handle(&ctx, args, cli.format)
        }
        Commands::Xmr(args) => {
            let ctx = HandlerContext::load(data_path, &args.source.source)?;
            handlers::xmr::handle(&ctx, args, cli.format)
        }
        Commands::WipStability(args) => {
            let ctx = HandlerContext::load(data_path, &args.source.source)?;
            handlers::wip_stability::handle(&ctx, args, cli.format)
        }
        Commands::FlowMetrics(args) => {
            let ctx = HandlerContext::load(data_path, &args.source.source)?;
            handlers::flow_metrics::handle(&ctx, args, cli.format)
        }
        Commands::WalkForward(args) => {
            let ctx = HandlerContext::load(data_path, &args.source.source)?;
            handlers::walk_forward::handle(&ctx, args, cli.format)
        }
        Commands::Store(args) => {
            let ctx = HandlerContext::load(data_path, &args.source.source)?;
            handlers::store::handle(&ctx, args, cli.format)
        }
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use clap::Parser;

use simplepose_inference::cli::args::{Cli, Commands};
use simplepose_inference::cli::logging::set_verbose;
use simplepose_inference::cli::predict::run_prediction;

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Predict(args) => {
            set_verbose(args.verbose);
            run_prediction(&args);
        }
    }
}

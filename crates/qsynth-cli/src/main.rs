//! qsynth Command Line Interface
//!
//! This crate contains the qsynth CLI that can be used to inspect sketches of
//! MDP families, to construct policies for sub-families and to synthesize
//! policies that satisfy reachability properties.

use clap::Parser;
use cli::{Cli, initialize_logger};
use human_panic::setup_panic;
use log::info;
use qsynth_quotient::config::QuotientConfig;

use crate::cli::{
    compute_policy, display_info, get_infeasible_action_mode, get_synthesis_method, load_sketch,
    read_config, run_synthesis,
};

mod cli;
mod qsynth_config;
mod sketch;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_panic!();

    // parse the cli arguments
    let cli = Cli::parse();
    initialize_logger(cli.log_config)?;
    info!("Welcome to qsynth!");
    match cli.command {
        cli::Commands::Info { input } => {
            let quotient = load_sketch(input, QuotientConfig::default())?;
            display_info(&quotient);
            Ok(())
        }
        cli::Commands::Policy { input, family } => {
            let config = read_config(None)?;
            let quotient = load_sketch(input, config.get_quotient_cfg())?;
            compute_policy(&quotient, family)?;
            Ok(())
        }
        cli::Commands::Synthesize {
            input,
            config_file,
            incomplete_search,
            precision,
            method,
            infeasible_action,
        } => {
            let mut config = read_config(config_file)?;

            // Check whether options were overridden via CLI
            if let Some(precision) = precision {
                config.set_model_checking_precision(precision);
            }
            if let Some(mode) = infeasible_action {
                config.set_infeasible_action(get_infeasible_action_mode(mode));
            }
            if let Some(method) = method {
                config.set_method(get_synthesis_method(method));
            }
            if incomplete_search {
                config.set_incomplete_search(true);
            }

            let quotient = load_sketch(input, config.get_quotient_cfg())?;
            display_info(&quotient);
            run_synthesis(&quotient, config.get_synthesis_cfg());

            info!("Finished synthesis. Goodbye!");
            Ok(())
        }
    }
}

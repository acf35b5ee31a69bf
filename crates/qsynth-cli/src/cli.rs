//! Command Line Interface for qsynth
//!
//! qsynth uses the `clap` crate to parse command line arguments and create the
//! CLI interface. This module defines all available commands and options (and
//! their documentation) as well as the functions executing them.

use std::{fs, path::PathBuf, process::exit};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::Config;
use log::{LevelFilter, debug, error, info};
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
};
use qsynth_quotient::{
    MdpFamilyQuotient,
    config::{InfeasibleActionMode, QuotientConfig, SynthesisConfig, SynthesisMethod},
    synthesizer::{PolicySynthesizer, SynthesisError},
};

use crate::{
    qsynth_config::QSynthConfig,
    sketch::{Sketch, restrict_family},
};

/// qsynth - synthesis of policies for families of MDPs
///
/// This is the command line interface of qsynth. A sketch file describes a
/// family of Markov decision processes as a single quotient MDP whose choices
/// are colored with the hole options that enable them. qsynth searches the
/// family for sub-families that are solved by a single policy.
///
/// You can use the --help / -h flag to get all available commands and options.
#[derive(Parser, Debug)]
#[command(version, name = "qsynth", about, long_about)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) log_config: LoggerConfig,
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Read the sketch file and print statistics of its quotient
    Info {
        #[command(flatten)]
        input: SketchInput,
    },
    /// Construct a policy for the design space or a sub-family of it
    Policy {
        #[command(flatten)]
        input: SketchInput,

        /// Restrict the design space, e.g. '{"h": [0]}'
        #[arg(short, long, value_name = "FAMILY")]
        family: Option<String>,
    },
    /// Synthesize policies for every property of the sketch
    Synthesize {
        #[command(flatten)]
        input: SketchInput,

        /// Configuration file for the synthesizer
        #[arg(short, long, value_name = "CONFIG_FILE")]
        config_file: Option<PathBuf>,

        /// Stop as soon as one family is solved
        #[arg(long, default_value_t = false)]
        incomplete_search: bool,

        /// Precision of value iteration
        #[arg(short, long, value_name = "PRECISION")]
        precision: Option<f64>,

        /// How to explore the design space
        #[arg(short, long, value_enum, value_name = "METHOD")]
        method: Option<SynthesisMethodOption>,

        /// How to treat policies picking an action without legal choices
        #[arg(long, value_enum, value_name = "MODE")]
        infeasible_action: Option<InfeasibleActionOption>,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
/// Exploration strategies of the synthesizer
pub(crate) enum SynthesisMethodOption {
    /// Analyze every member of the design space on its own
    #[value(name = "onebyone")]
    OneByOne,
    /// Abstraction refinement: analyze families and split undecided ones
    /// (default)
    #[value(name = "ar")]
    Ar,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
/// Treatment of actions without legal choices during policy repair
pub(crate) enum InfeasibleActionOption {
    /// Mark no choice for the state and continue (default)
    Accept,
    /// Fail policy repair
    Reject,
}

#[derive(Args, Debug)]
pub(crate) struct SketchInput {
    /// Location and name of the sketch file
    sketch_file: PathBuf,
}

#[derive(Debug, Args)]
pub(crate) struct LoggerConfig {
    /// Read the logger configuration from file.
    /// Logger configuration can be provided in the log4rs specification format.
    #[arg(long)]
    logger_config_file: Option<String>,

    /// Enable debug output.
    /// **Note**: This flag must be passed first, before any command.
    #[arg(short, long, default_value_t = false)]
    debug: bool,
}

/// Initialize the logger as specified in `cfg`
///
/// By default the logger is configured to log to stdout. If a log4rs
/// configuration file is given in `cfg`, the configuration from that file will
/// be used instead
pub(crate) fn initialize_logger(cfg: LoggerConfig) -> Result<(), anyhow::Error> {
    if let Some(f) = cfg.logger_config_file {
        log4rs::init_file(f, Default::default())
            .with_context(|| "Failed to read logger config file")?;
        return Ok(());
    }

    let p_encoder = match cfg.debug {
        true => PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S)} - {h({l})} - [{f}:{L} - {M}] - {m}{n}"),
        false => PatternEncoder::new("{d(%H:%M:%S)} - {h({l})} - {m}{n}"),
    };

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(p_encoder))
        .build();

    let level = match cfg.debug {
        true => LevelFilter::Debug,
        false => LevelFilter::Info,
    };

    let log_config = log4rs::Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))
        .with_context(|| "Failed to initialize logger")?;

    log4rs::init_config(log_config).with_context(|| "Failed to initialize console logger")?;
    Ok(())
}

/// Get the synthesis method selected on the command line
pub(crate) fn get_synthesis_method(method: SynthesisMethodOption) -> SynthesisMethod {
    match method {
        SynthesisMethodOption::OneByOne => SynthesisMethod::OneByOne,
        SynthesisMethodOption::Ar => SynthesisMethod::AbstractionRefinement,
    }
}

/// Get the infeasible action mode selected on the command line
pub(crate) fn get_infeasible_action_mode(mode: InfeasibleActionOption) -> InfeasibleActionMode {
    match mode {
        InfeasibleActionOption::Accept => InfeasibleActionMode::Accept,
        InfeasibleActionOption::Reject => InfeasibleActionMode::Reject,
    }
}

/// Read the configuration from `config_file` (if any) and from environment
/// variables prefixed with `QSYNTH`
pub(crate) fn read_config(config_file: Option<PathBuf>) -> Result<QSynthConfig, anyhow::Error> {
    let mut settings = Config::builder();
    if let Some(config_file) = config_file {
        if !config_file.exists() {
            return Err(anyhow::anyhow!(
                "Specified configuration file '{}' does not exist.",
                config_file.display()
            ));
        }

        settings = settings.add_source(config::File::from(config_file));
    }

    // e.g. QSYNTH_QUOTIENT__MODEL_CHECKING_PRECISION
    settings = settings.add_source(
        config::Environment::with_prefix("QSYNTH")
            .prefix_separator("_")
            .separator("__"),
    );
    let config = settings
        .build()?
        .try_deserialize::<QSynthConfig>()
        .with_context(|| "Invalid configuration")?;
    debug!("Using configuration {config:?}");
    Ok(config)
}

/// Read the sketch file and build its quotient
pub(crate) fn load_sketch(
    input: SketchInput,
    config: QuotientConfig,
) -> Result<MdpFamilyQuotient, anyhow::Error> {
    let f = fs::read_to_string(&input.sketch_file).with_context(|| {
        format!(
            "Unable to read sketch file '{}'",
            input.sketch_file.display()
        )
    })?;

    let quotient = Sketch::from_json(&f)?.into_quotient(config)?;
    info!(
        "Parsed sketch '{}' from the input file",
        input.sketch_file.display()
    );
    Ok(quotient)
}

/// Log statistics of the quotient
pub(crate) fn display_info(quotient: &MdpFamilyQuotient) {
    let mdp = quotient.quotient_mdp();
    info!(
        "Quotient MDP has {} states, {} choices and {} transitions",
        mdp.nr_states(),
        mdp.nr_choices(),
        mdp.nr_transitions()
    );
    info!(
        "{} actions: {}",
        quotient.num_actions(),
        quotient.action_labels().join(", ")
    );
    info!(
        "Design space {} of size {}",
        quotient.design_space().family(),
        quotient.design_space().size()
    );
    for prop in quotient.specification() {
        info!("Property {prop}");
    }
    debug!("Quotient MDP: {mdp}");
}

/// Construct a policy from scratch for the design space, or for the family
/// obtained by restricting it with `family`
///
/// If the family is a singleton, the induced model is checked to be
/// deterministic. A nondeterministic model aborts the process.
pub(crate) fn compute_policy(
    quotient: &MdpFamilyQuotient,
    family: Option<String>,
) -> Result<(), anyhow::Error> {
    let mut family = match family {
        Some(restriction) => restrict_family(quotient.design_space().family(), &restriction)?,
        None => quotient.design_space().family().clone(),
    };
    quotient.coloring().apply_to(&mut family)?;

    let (policy, choice_mask) = quotient.fix_policy_for_family(&family, &quotient.empty_policy())?;
    info!("Policy for family {family}: {policy}");
    info!("Choices used by the policy: {choice_mask}");

    let sub_mdp = quotient.build_from_choice_mask(&choice_mask);
    info!(
        "Induced model has {} states and {} choices",
        sub_mdp.model.nr_states(),
        sub_mdp.model.nr_choices()
    );

    if family.is_singleton()
        && let Err(err) = quotient.assert_mdp_is_deterministic(&sub_mdp, &family)
    {
        error!("{err}");
        error!("aborting...");
        exit(1);
    }
    Ok(())
}

/// Run the synthesis for every property of the quotient and log the results
pub(crate) fn run_synthesis(quotient: &MdpFamilyQuotient, config: SynthesisConfig) {
    if quotient.specification().is_empty() {
        info!("The sketch does not contain any property");
        return;
    }

    let synthesizer = PolicySynthesizer::new(quotient, config);
    for prop in quotient.specification() {
        match synthesizer.synthesize(prop) {
            Ok(result) => {
                info!(
                    "Property '{}': {} of {} members solved",
                    prop.name(),
                    result.solved_members(),
                    quotient.design_space().size()
                );
            }
            Err(SynthesisError::Nondeterminism(err)) => {
                error!("{err}");
                error!("aborting...");
                exit(1);
            }
            Err(err) => {
                error!("An error occurred during the synthesis for property '{prop}': {err}");
                exit(1);
            }
        }
    }
}

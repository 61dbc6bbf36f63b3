//! Parsing Options.
//! `pn <NET> [--mode {coverability|reachability}] [--analysis {kind}] ...`
//! Command-line values override the ones from the config file.

use clap::{Arg, ArgAction, Command, value_parser};
use std::error::Error;
use std::path::PathBuf;

use crate::analysis::reachability::ExplorationMode;
use crate::config::PnConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnalysisKind {
    All,
    Graph,
    Liveness,
    Boundedness,
    Conservation,
    Reversibility,
    Incidence,
}

impl AnalysisKind {
    pub fn includes(self, other: AnalysisKind) -> bool {
        self == AnalysisKind::All || self == other
    }
}

fn make_options_parser() -> clap::Command {
    Command::new("pn")
        .no_binary_name(true)
        .version("v0.1.0")
        .about("Reachability, coverability and behavioural analysis of place/transition nets")
        .arg(
            Arg::new("net")
                .value_name("NET")
                .help("Net description (.json or .ron)")
                .required(true),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .help("State-space construction")
                .value_parser(["coverability", "reachability"]),
        )
        .arg(
            Arg::new("kind")
                .short('k')
                .long("analysis")
                .help("The analysis to run")
                .default_value("all")
                .value_parser([
                    "all",
                    "graph",
                    "liveness",
                    "boundedness",
                    "conservation",
                    "reversibility",
                    "incidence",
                ]),
        )
        .arg(
            Arg::new("state_limit")
                .short('s')
                .long("state-limit")
                .value_name("N")
                .help("Stop exploring after N distinct markings")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("depth_limit")
                .short('d')
                .long("depth-limit")
                .value_name("N")
                .help("Do not explore markings deeper than N firings")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("TOML configuration file")
                .default_value("pn.toml"),
        )
        .arg(
            Arg::new("dot")
                .long("dot-dir")
                .value_name("DIR")
                .help("Write net.dot and graph.dot into DIR"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Path to file where the JSON report will be stored"),
        )
        .arg(
            Arg::new("pretty")
                .long("pretty")
                .help("Pretty-print the JSON report")
                .action(ArgAction::SetTrue),
        )
}

#[derive(Debug, Clone)]
pub struct Options {
    pub net: PathBuf,
    pub mode: Option<ExplorationMode>,
    pub analysis: AnalysisKind,
    pub state_limit: Option<usize>,
    pub depth_limit: Option<usize>,
    pub config: PathBuf,
    pub dot_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub pretty: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            net: PathBuf::new(),
            mode: None,
            analysis: AnalysisKind::All,
            state_limit: None,
            depth_limit: None,
            config: PathBuf::from("pn.toml"),
            dot_dir: None,
            output: None,
            pretty: false,
        }
    }
}

impl Options {
    pub fn parse_from_str(s: &str) -> Result<Self, Box<dyn Error>> {
        let flags = shellwords::split(s)?;
        Self::parse_from_args(&flags)
    }

    pub fn parse_from_args(flags: &[String]) -> Result<Self, Box<dyn Error>> {
        let app = make_options_parser();
        let matches = app.try_get_matches_from(flags.iter())?;

        let mode = match matches.get_one::<String>("mode").map(String::as_str) {
            None => None,
            Some("coverability") => Some(ExplorationMode::Coverability),
            Some("reachability") => Some(ExplorationMode::Reachability),
            Some(_) => return Err("UnsupportedExplorationMode")?,
        };
        let analysis = match matches.get_one::<String>("kind").map(String::as_str) {
            Some("all") | None => AnalysisKind::All,
            Some("graph") => AnalysisKind::Graph,
            Some("liveness") => AnalysisKind::Liveness,
            Some("boundedness") => AnalysisKind::Boundedness,
            Some("conservation") => AnalysisKind::Conservation,
            Some("reversibility") => AnalysisKind::Reversibility,
            Some("incidence") => AnalysisKind::Incidence,
            Some(_) => return Err("UnsupportedAnalysisKind")?,
        };

        let net = matches
            .get_one::<String>("net")
            .map(PathBuf::from)
            .ok_or("MissingNet")?;
        let config = matches
            .get_one::<String>("config")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("pn.toml"));

        Ok(Options {
            net,
            mode,
            analysis,
            state_limit: matches.get_one::<usize>("state_limit").copied(),
            depth_limit: matches.get_one::<usize>("depth_limit").copied(),
            config,
            dot_dir: matches.get_one::<String>("dot").map(PathBuf::from),
            output: matches.get_one::<String>("output").map(PathBuf::from),
            pretty: matches.get_flag("pretty"),
        })
    }

    /// Folds the command-line overrides into `config`.
    pub fn apply_to(&self, config: &mut PnConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if self.state_limit.is_some() {
            config.state_limit = self.state_limit;
        }
        if self.depth_limit.is_some() {
            config.depth_limit = self.depth_limit;
        }
        if self.dot_dir.is_some() {
            config.dot_dir = self.dot_dir.clone();
        }
    }
}

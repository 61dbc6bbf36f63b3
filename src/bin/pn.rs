//! `pn`: explores and analyses a net description.
//! `PN_LOG=debug pn nets/mutex.json -k liveness --pretty`

use std::fs;

use anyhow::{Context, Result};

use pn_analyzer::config::PnConfig;
use pn_analyzer::net::io::read_net;
use pn_analyzer::options::Options;
use pn_analyzer::report::AnalysisReport;

fn main() {
    if std::env::var("PN_LOG").is_ok() {
        let e = env_logger::Env::new()
            .filter("PN_LOG")
            .write_style("PN_LOG_STYLE");
        env_logger::init_from_env(e);
    }

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        args = shellwords::split(&std::env::var("PN_FLAGS").unwrap_or_default()).unwrap_or_default();
    }
    let options = match Options::parse_from_args(&args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };
    log::debug!("PN options: {:?}", options);

    if let Err(err) = run(&options) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn run(options: &Options) -> Result<()> {
    let mut config = PnConfig::load_from_file(&options.config)?;
    options.apply_to(&mut config);
    log::debug!("PN config: {:?}", config);

    let net = read_net(&options.net)
        .with_context(|| format!("Failed to load net: {:?}", options.net))?;
    net.log_diagnostics();

    let (report, graph) = AnalysisReport::build(&net, &config.state_graph_config(), options.analysis)
        .context("Firing rule violated during exploration")?;

    if let Some(dir) = &config.dot_dir {
        net.write_dot(dir.join("net.dot"))
            .with_context(|| format!("Failed to write net.dot into {:?}", dir))?;
        graph
            .write_dot(dir.join("graph.dot"))
            .with_context(|| format!("Failed to write graph.dot into {:?}", dir))?;
        log::info!("dot files written to {:?}", dir);
    }

    let json = if options.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    match &options.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write report: {:?}", path))?;
            println!("{report}");
        }
        None => println!("{json}"),
    }
    Ok(())
}

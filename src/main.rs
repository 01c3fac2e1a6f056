use std::{env, path::PathBuf};

use anyhow::bail;
use chrono::Utc;
use clap::Parser;
use log::LevelFilter;
use purr::{
    config::{Config, CONFIG_HELP},
    pipeline::{self, sources_from_config},
    slack::{deliver, SlackClient},
    FilterChain,
};
use simple_logger::SimpleLogger;

#[derive(Parser, Debug)]
#[command(author, version, about, after_help = CONFIG_HELP)]
struct Args {
    #[arg(long, help = "read config from FILE, also set by PURR_CONFIG env variable")]
    config: Option<PathBuf>,

    #[arg(short, long, default_value_t = false, help = "run in debug mode")]
    debug: bool,

    #[arg(
        short,
        long,
        default_value_t = false,
        help = "output to the terminal rather than slack"
    )]
    output: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    SimpleLogger::new()
        .with_level(if args.debug {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init()?;

    let config_path = args
        .config
        .clone()
        .or(env::var("PURR_CONFIG").ok().map(PathBuf::from));

    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => bail!("{e}"),
    };
    if let Err(e) = config.validate(!args.output) {
        bail!("{e}\n\n{CONFIG_HELP}");
    }

    let sources = sources_from_config(&config).await;
    let report = pipeline::run(sources, FilterChain::from(&config.filters)).await?;
    let message = report.render(Utc::now());

    log::debug!("Final message:\n{message}");

    if args.output {
        print!("{message}");
        return Ok(());
    }

    let slack = SlackClient::new(config.slack_token.clone());
    let sent = deliver(&slack, &config.slack_channel, &message, config.max_lines).await?;
    log::info!("Posted {sent} messages to {}", config.slack_channel);

    Ok(())
}

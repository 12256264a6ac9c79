mod command_line;

use clap::Parser;
use command_line::CommandLine;
use env_logger::Env;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cmd = CommandLine::parse();
    if let Err(err) = cmd.execute().await {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
}

use clap::Parser;
use segment::Cli;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let mut cmd: Cli = Cli::parse();
    if let Err(e) = cmd.run_program() {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

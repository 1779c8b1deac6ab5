use clap::Parser;

fn main() {
    let cli = podman_build::cli::Cli::parse();
    let default_filter = if cli.verbose() { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(error) = cli.run() {
        const BOLD_RED: &str = "\x1b[1;31m";
        const BOLD: &str = "\x1b[1m";
        const RESET: &str = "\x1b[0m";
        eprintln!("{BOLD_RED}error{RESET}{BOLD}:{RESET} {error}");

        let mut source = std::error::Error::source(&error);
        while let Some(cause) = source {
            eprintln!("  {BOLD}caused by:{RESET} {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

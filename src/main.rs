use clap::Parser;
use loghue::cli::{Cli, Commands};
use loghue::config::build_config;
use loghue::scheme::{ColorProfile, Scheme};
use loghue::stream::Input;
use loghue::theme::ThemeCatalog;
use loghue::{debug, logging, stream};
use std::io::IsTerminal;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let app_config = build_config(&cli);
    logging::init(app_config.debug_mode);
    log::debug!("effective config: {:?}", app_config);

    match cli.command {
        Some(Commands::Version) => {
            println!("loghue {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Debug) => {
            if let Err(e) = debug::run_debug(&app_config) {
                eprintln!("loghue: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            let Some(input) = Input::select(cli.file.as_deref(), std::io::stdin().is_terminal())
            else {
                eprintln!("loghue: no file given and standard input is a terminal");
                std::process::exit(2);
            };

            // A bad theme must fail before the input is touched.
            let catalog = match ThemeCatalog::from_selection(&app_config.theme) {
                Ok(catalog) => catalog,
                Err(e) => {
                    eprintln!("loghue: {}", e);
                    std::process::exit(1);
                }
            };
            let profile = ColorProfile::detect(app_config.color);
            log::debug!("theme {} with profile {}", catalog.name(), profile);

            let code = stream::run(&app_config, &input, Scheme::resolve(&catalog, profile)).await;
            std::process::exit(code);
        }
    }
}

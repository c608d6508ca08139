use clap::Parser;
use levelmeter::{app, audio, config, error, telemetry, ui};

fn list_devices() -> error::AppResult<()> {
    match audio::select_input_device()? {
        Some(name) => println!("{}", name),
        None => println!("No audio input devices found."),
    }

    Ok(())
}

/// Validate config, pick the device and start logging, or exit with an error
fn prepare(config: error::AppResult<config::Config>) -> config::Config {
    let mut config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(app::ExitCode::Error as i32);
        }
    };

    if let Err(e) = telemetry::init_tracing(config.log_file.as_deref()) {
        eprintln!("Could not open log file: {}", e);
        std::process::exit(app::ExitCode::Error as i32);
    }

    if let Err(e) = app::resolve_device(&mut config) {
        eprintln!("Setup error: {}", e);
        std::process::exit(app::ExitCode::Error as i32);
    }

    config
}

#[tokio::main]
async fn main() {
    use app::ExitCode;
    use config::{Args, Commands};

    let args = Args::parse();

    match args.command {
        Commands::Monitor(monitor_args) => {
            let config = prepare(config::Config::from_monitor_args(&monitor_args));

            // Handle exit codes appropriately
            match app::App::new_with_config(config) {
                Ok(app) => {
                    let run_result = app.run().await;
                    match run_result.result {
                        Ok(_) => {
                            std::process::exit(run_result.exit_code as i32);
                        }
                        Err(e) => {
                            tracing::error!("{}", e);
                            eprintln!("Application error: {}", e);
                            std::process::exit(ExitCode::Error as i32);
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Setup error: {}", e);
                    std::process::exit(ExitCode::Error as i32);
                }
            }
        }
        Commands::Print(print_args) => {
            let config = prepare(config::Config::from_print_args(&print_args));

            match app::run_print(&config, print_args.seconds, print_args.quiet).await {
                Ok(max_level) => {
                    if print_args.quiet {
                        println!("{}", ui::display_percent(max_level));
                    } else {
                        println!("Maximum level: {:.2}", max_level);
                    }
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    eprintln!("Error during monitoring: {}", e);
                    std::process::exit(ExitCode::Error as i32);
                }
            }
        }
        Commands::List(_) => {
            if let Err(e) = list_devices() {
                eprintln!("Error listing devices: {}", e);
                std::process::exit(ExitCode::Error as i32);
            }
        }
    }
}

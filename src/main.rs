use clap::Parser;
use portsift::cli::Cli;
use portsift::output::print_error;
use portsift::scanner::ScanStatus;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match cli.load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            print_error(&format!("{:#}", e));
            return ExitCode::from(ScanStatus::Failed.exit_code());
        }
    };

    if let Err(e) = portsift::logging::init(cli.verbose, cli.quiet, &settings.log_level) {
        print_error(&format!("{:#}", e));
        return ExitCode::from(ScanStatus::Failed.exit_code());
    }

    match cli.run(&settings).await {
        Ok(status) => ExitCode::from(status.exit_code()),
        Err(e) => {
            print_error(&format!("{:#}", e));
            ExitCode::from(ScanStatus::Failed.exit_code())
        }
    }
}

use drover::common::logging;
use drover::presentation::cli::CliApp;
use drover::presentation::ui::display;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = CliApp::new();

    // Initialize logging
    logging::init(app.verbose())?;

    // Run the CLI application
    if let Err(err) = app.run().await {
        display::error(&err);
        std::process::exit(err.exit_code());
    }
    Ok(())
}

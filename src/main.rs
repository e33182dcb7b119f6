use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

mod api;
mod config;
mod controller;
mod domain;
mod filter;
mod inputter;
mod logging;
mod model;
mod pagination;
mod payload;
mod projector;
mod record;
mod sort;
mod transfer;
mod ui;
mod view;

use api::ApiClient;
use config::{Cli, SVConfig};
use controller::Controller;
use domain::SVError;
use model::{Model, Status};
use ui::TableUI;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Err(e) => {
            error!("Exiting with error: {}", e);
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(cli: Cli) -> Result<(), SVError> {
    let config = SVConfig::try_from(cli)?;
    logging::init(&config.log_file)?;
    info!("Starting sv for student {} ({})", config.student_id, config.api_url);

    // Fetches and transfers run on the runtime's workers, the ui loop stays on this thread
    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();
    let backend = Arc::new(ApiClient::new(&config)?);

    let mut terminal = ratatui::init();
    let result = event_loop(&config, backend, &mut terminal);
    ratatui::restore();
    result
}

fn event_loop(config: &SVConfig, backend: Arc<ApiClient>, terminal: &mut ratatui::DefaultTerminal) -> Result<(), SVError> {
    let size = terminal.size()?;
    let mut model = Model::init(config, backend, size.width as usize, size.height as usize)?;
    let mut ui = TableUI::new(config);
    let controller = Controller::new(config);
    model.start();

    while model.status != Status::QUITTING {
        terminal.draw(|f| ui.draw(model.get_uidata(), f))?;

        let message = controller.handle_event(&model)?;
        model.update(message)?;
        model.tick();
    }

    info!("Bye");
    Ok(())
}

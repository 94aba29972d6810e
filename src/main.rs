mod cli;

use std::{
    io::{self, IsTerminal},
    process::ExitCode,
};

use scservo_ping::{
    protocol::PacketHandler,
    scan::{scan, Console},
    serial::SerialTransport,
};
use tracing::debug;

fn main() -> ExitCode {
    let args = cli::Args::parse_args();
    cli::init_logging(args.verbose);

    let color = !args.no_color && io::stdout().is_terminal();
    if !color {
        colored::control::set_override(false);
    }

    let request = args.request();
    debug!(?request, "starting scan");

    let mut transport = SerialTransport::new(&request.device);
    let handler = PacketHandler::new(request.protocol);
    let mut console = Console::new(io::stdout().lock(), color);

    match scan(&request, &mut transport, &handler, &mut console) {
        Ok(report) => {
            debug!(found = report.successes().count(), "scan finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            // Already reported on the console.
            debug!("{e}");
            ExitCode::FAILURE
        }
    }
}

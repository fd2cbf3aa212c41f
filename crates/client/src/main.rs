mod app;

use tracing::error;

fn main() {
    let wiring = match app::build_app() {
        Ok(wiring) => wiring,
        Err(err) => {
            error!(error = %err, "startup_failed");
            eprintln!("cellview: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = app::run(wiring) {
        error!(error = %err, "run_failed");
        std::process::exit(1);
    }
}

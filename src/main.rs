use postrun::{core, signals};
use postrun::status::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};

/// Entry point - catches Ctrl+C and calls core::run()
///
/// Returns ExitStatus directly, which implements std::process::Termination.
fn main() -> ExitStatus {
    // The first Ctrl+C stops the run at the next request boundary
    ctrlc::set_handler(move || {
        signals::set_interrupted();

        eprintln!("\nInterrupted, finishing the request in flight");

        // On second Ctrl+C, force exit (user really wants out)
        static SECOND_CTRL_C: AtomicBool = AtomicBool::new(false);
        if SECOND_CTRL_C.swap(true, Ordering::SeqCst) {
            std::process::exit(ExitStatus::Interrupted as i32);
        }
    })
    .ok();

    let args: Vec<String> = std::env::args().collect();
    let status = core::run(args);

    if signals::was_interrupted() {
        return ExitStatus::Interrupted;
    }

    status
}

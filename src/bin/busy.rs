//! Demo workload: stays busy for N seconds of its own running time.
//!
//! Work is counted in 100ms ticks, so a suspended run stops advancing after
//! the tick in progress.

use std::env;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(100);

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let [_, seconds] = args.as_slice() else {
        eprintln!("usage: busy <seconds>");
        return ExitCode::FAILURE;
    };
    let Ok(seconds) = seconds.parse::<f64>() else {
        eprintln!("Please provide a numeric value for seconds.");
        return ExitCode::FAILURE;
    };
    if !seconds.is_finite() || seconds < 0.0 {
        eprintln!("seconds must be a non-negative number");
        return ExitCode::FAILURE;
    }

    println!("Looping for {seconds} seconds...");
    let ticks = (seconds / TICK.as_secs_f64()).ceil() as u64;
    for _ in 0..ticks {
        thread::sleep(TICK);
    }
    println!("Done.");
    ExitCode::SUCCESS
}

//! Katagrafy proxy binary: Gemini completions and server-side URL fetches.
//! Run with: cargo run --bin katagrafy-proxy

use std::process::ExitCode;

use katagrafy::start_katagrafy;

fn main() -> ExitCode {
    start_katagrafy::run()
}

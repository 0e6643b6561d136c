//! fleetrun - Run one script on a fleet of hosts at once
//!
//! This is the main entry point for the Rust CLI binary.

fn main() -> anyhow::Result<()> {
    fleetrun::run()
}

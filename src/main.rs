use std::io;

use anyhow::Result;
use log::info;

use rclisim::dispatcher::CommandDispatcher;
use rclisim::session::Shell;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    info!("rclisim v{} starting...", env!("CARGO_PKG_VERSION"));

    let stdin = io::stdin();
    let mut shell = Shell::new(stdin.lock(), CommandDispatcher::new(io::stdout()));
    let summary = shell.run()?;

    info!(
        "Session ended after {} lines ({} rejected)",
        summary.lines, summary.rejected
    );
    Ok(())
}

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::oneshot;
use tracing::{info, warn};

use servertee::config::{self, Config};
use servertee::{diagnostics, server, StdoutTee, TeeOptions};

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr; set up BEFORE stdout is redirected
    diagnostics::init_tracing();

    config::ensure_directories()?;
    let config = Config::load()?;

    let tee = StdoutTee::install(&TeeOptions::from(&config))
        .context("Failed to install stdout tee")?;
    info!("Logging to: {}", tee.interceptor().log_path().display());

    let server = server::start(
        config.stream_port,
        Arc::clone(tee.interceptor()),
        config.keep_alive(),
    )
    .await?;
    info!("Streaming records at http://{}/logs/stream", server.addr());

    // Reading stdin blocks, so it gets a plain thread the runtime never waits on
    let (done_tx, done_rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("servertee-stdin".to_string())
        .spawn(move || {
            let _ = done_tx.send(copy_stdin_to_stdout());
        })
        .context("Failed to spawn stdin reader")?;

    tokio::select! {
        copied = done_rx => match copied {
            Ok(Err(e)) => warn!("Failed to copy stdin: {}", e),
            _ => info!("Input closed"),
        },
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    server.shutdown();
    tee.close().context("Failed to restore stdout")?;
    Ok(())
}

/// Copy stdin to the (redirected) stdout line by line
///
/// The stdout lock is only held per line so shutdown can still flush stdout
/// while this thread waits for input.
fn copy_stdin_to_stdout() -> io::Result<()> {
    let mut input = io::stdin().lock();
    let mut line = Vec::new();
    loop {
        line.clear();
        if input.read_until(b'\n', &mut line)? == 0 {
            return io::stdout().flush();
        }
        let mut out = io::stdout().lock();
        out.write_all(&line)?;
        out.flush()?;
    }
}

#![forbid(unsafe_code)]

//! dterm demo binary: renders the dashboard from a synthetic feed until the
//! tick limit is reached or the user quits.

mod cli;
mod feed;

use std::io;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dterm_core::Size;
use dterm_core::terminal_session::{
    SessionEvent, SessionOptions, TerminalSession, take_resize_pending,
};
use dterm_runtime::{
    Command, DashboardState, RenderConfig, RenderPipeline, Snapshot, SnapshotSource, init_tracing,
};
use tracing::{debug, info};

use crate::cli::{Opts, Parsed};
use crate::feed::SyntheticFeed;

fn main() -> ExitCode {
    let opts = match cli::parse(std::env::args().skip(1)) {
        Ok(Parsed::Run(opts)) => opts,
        Ok(Parsed::Help) => {
            println!("{}", cli::HELP_TEXT);
            return ExitCode::SUCCESS;
        }
        Ok(Parsed::Version) => {
            println!("{}", cli::version());
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("dterm-demo: {err}");
            eprintln!("Run with --help for usage information.");
            return ExitCode::from(2);
        }
    };

    init_tracing();
    match run(&opts) {
        Ok(ticks) => {
            info!(ticks, "demo finished");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("dterm-demo: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Drive the pipeline. Returns the number of snapshot ticks rendered.
fn run(opts: &Opts) -> io::Result<u64> {
    let session = TerminalSession::new(SessionOptions {
        alternate_screen: true,
        hide_cursor: true,
    })?;
    let pipeline = RenderPipeline::stdout(RenderConfig::from_env()).with_title("dterm demo");
    let mut feed = SyntheticFeed::new(seed());
    let mut ui = DashboardState::default();
    let interval = Duration::from_millis(opts.interval_ms);

    let mut size = terminal_size(&session)?;
    let mut snapshot: Arc<Snapshot> = feed.latest();
    let mut ticks = 0u64;
    let mut next_tick = Instant::now();

    loop {
        if Instant::now() >= next_tick {
            if ticks > 0 {
                snapshot = feed.latest();
            }
            pipeline.render(&snapshot, &mut ui, size);
            ticks += 1;
            if opts.ticks.is_some_and(|limit| ticks >= limit) {
                break;
            }
            next_tick = Instant::now() + interval;
        }

        let timeout = next_tick.saturating_duration_since(Instant::now());
        if !session.poll_event(timeout)? {
            if take_resize_pending() {
                size = terminal_size(&session)?;
                pipeline.on_resize(size);
                pipeline.render(&snapshot, &mut ui, size);
            }
            continue;
        }
        let Some(event) = session.read_event()? else {
            continue;
        };
        if let SessionEvent::Resize { width, height } = event {
            let _ = take_resize_pending();
            size = Size::new(width, height);
            pipeline.on_resize(size);
        }
        if let Some(command) = Command::from_event(&event) {
            debug!(%command, "command");
            if ui.apply_command(command).is_break() {
                break;
            }
        }
        pipeline.render(&snapshot, &mut ui, size);
    }

    drop(session);
    Ok(ticks)
}

fn terminal_size(session: &TerminalSession) -> io::Result<Size> {
    let (width, height) = session.size()?;
    Ok(Size::new(width, height))
}

fn seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(1, |d| d.as_nanos() as u64)
}

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use qntoy::app::App;
use qntoy::cli::Args;
use qntoy::config::AppConfig;
use qntoy::session::SessionCommand;

const POLL: Duration = Duration::from_millis(20);
const STATS_EVERY: Duration = Duration::from_secs(1);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut cfg = AppConfig::load_or_default(&args.config);
    args.apply_to(&mut cfg);

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_for_ctrlc = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_for_ctrlc.store(true, Ordering::SeqCst);
    })?;

    let mut app = App::build(&cfg, args.playback(), args.wav.clone())?;
    let started = Instant::now();
    let mut next_stats = started + STATS_EVERY;
    let pulse_every = args
        .pulse_every
        .filter(|s| s.is_finite() && *s > 0.0)
        .map(Duration::from_secs_f32);
    let mut next_pulse = pulse_every.map(|p| started + p);
    let limit = args
        .duration
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(Duration::from_secs_f32);

    while !stop_flag.load(Ordering::SeqCst) && app.is_running() {
        let now = Instant::now();
        if limit.is_some_and(|l| now.duration_since(started) >= l) {
            break;
        }
        if let (Some(at), Some(every)) = (next_pulse, pulse_every)
            && now >= at
        {
            app.send(SessionCommand::Pulse);
            next_pulse = Some(at + every);
        }
        if now >= next_stats {
            let snap = app.latest();
            let [p0, p1, p2] = snap.shares_pct();
            info!(
                "cycle {} | |0⟩ {:.1}% |1⟩ {:.1}% |2⟩ {:.1}% | entropy {:.3} | reverb {:.2}s | level {:.2}{}",
                snap.cycle,
                p0,
                p1,
                p2,
                snap.entropy,
                snap.audio.reverb_time_s,
                snap.audio.level,
                if snap.audio.enabled { "" } else { " (muted)" }
            );
            next_stats += STATS_EVERY;
        }
        std::thread::sleep(POLL);
    }

    info!("shutting down");
    app.shutdown();
    Ok(())
}

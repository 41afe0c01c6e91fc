use anyhow::{anyhow, bail, Context, Result};
use framegrab::config::FramegrabConfig;
use framegrab::engine::CaptureContext;
use framegrab::platform::default_backend;
use framegrab::recording::{RecordingController, StartOutcome};
use framegrab::types::bgra_to_rgba_image;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const USAGE: &str = "Usage: framegrab-cli <command> [args]

Commands:
  info [--json]
  snapshot <out.png> [--width W --height H]
  record <output> [--fps N] [--seconds S] [--json]";

fn main() -> Result<()> {
    let config = FramegrabConfig::load_or_default();
    framegrab::init_logging_with(&config.logging.filter);

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let command = &args[1];
    match command.as_str() {
        "info" => cmd_info(&config, &args),
        "snapshot" => cmd_snapshot(&config, &args),
        "record" => cmd_record(&config, &args),
        _ => {
            eprintln!("Unknown command: {}\n\n{}", command, USAGE);
            std::process::exit(1);
        }
    }
}

fn flag_value<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn cmd_info(config: &FramegrabConfig, args: &[String]) -> Result<()> {
    let info = framegrab::get_info();
    let screen = default_backend().screen_geometry()?;

    if has_flag(args, "--json") {
        let report = serde_json::json!({
            "crate": info,
            "screen": screen,
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{} {}", info.name, info.version);
        println!("backend: {}", info.backend);
        println!("screen:  {}", screen);
        println!("config:  {}", FramegrabConfig::default_path().display());
        println!(
            "recording: {} fps default, {:?} on capture failure, {:?} sink",
            config.recording.default_fps, config.recording.failure_policy, config.recording.sink
        );
    }
    Ok(())
}

fn cmd_snapshot(config: &FramegrabConfig, args: &[String]) -> Result<()> {
    let output = args
        .get(2)
        .filter(|a| !a.starts_with("--"))
        .ok_or_else(|| anyhow!("snapshot needs an output path\n\n{}", USAGE))?;

    let backend = default_backend();
    let (width, height) = match (flag_value(args, "--width"), flag_value(args, "--height")) {
        (Some(w), Some(h)) => (w.parse::<i32>()?, h.parse::<i32>()?),
        (None, None) => match config.capture.region {
            Some([w, h]) => (w as i32, h as i32),
            None => {
                let screen = backend.screen_geometry()?;
                (screen.width() as i32, screen.height() as i32)
            }
        },
        _ => bail!("--width and --height go together"),
    };

    let mut context = CaptureContext::init_with(backend.as_ref(), width, height)?;
    let mut frame = vec![0u8; context.expected_buffer_size()];
    context.grab_frame(&mut frame)?;
    let geometry = context.geometry();
    context.release();

    let image = bgra_to_rgba_image(geometry, &frame)
        .ok_or_else(|| anyhow!("captured frame does not match {}", geometry))?;
    image
        .save(output)
        .with_context(|| format!("writing {}", output))?;

    println!("Saved {} snapshot to {}", geometry, output);
    Ok(())
}

fn cmd_record(config: &FramegrabConfig, args: &[String]) -> Result<()> {
    let output = args
        .get(2)
        .filter(|a| !a.starts_with("--"))
        .ok_or_else(|| anyhow!("record needs an output path\n\n{}", USAGE))?;
    let fps = match flag_value(args, "--fps") {
        Some(v) => v.parse::<i32>().context("--fps")?,
        None => config.recording.default_fps as i32,
    };
    let seconds = match flag_value(args, "--seconds") {
        Some(v) => Some(v.parse::<f64>().context("--seconds")?),
        None => None,
    };
    let json = has_flag(args, "--json");

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("installing Ctrl-C handler")?;

    let controller = RecordingController::from_config(config);
    match controller.start(output, fps)? {
        StartOutcome::Started { session_id } => {
            if !json {
                println!("Recording {} to {} (Ctrl-C to stop)", session_id, output);
            }
        }
        StartOutcome::AlreadyActive => bail!("a recording is already active"),
    }

    let started = Instant::now();
    let limit = seconds.map(Duration::from_secs_f64);
    while controller.is_recording() && !interrupted.load(Ordering::SeqCst) {
        if limit.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let stats = controller
        .stop_and_wait(Duration::from_secs(5))?
        .ok_or_else(|| anyhow!("capture loop produced no statistics"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!(
            "{} frames in {:.2}s ({:.1} fps, target {}), {} capture failures, {} sink failures",
            stats.frames_written,
            stats.duration_secs,
            stats.actual_fps,
            stats.target_fps,
            stats.capture_failures,
            stats.sink_failures
        );
    }

    if let Some(error) = stats.error {
        bail!("recording ended early: {}", error);
    }
    Ok(())
}

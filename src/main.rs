mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ProfileArgs};
use hf_av::{detect_capabilities, detect_capabilities_async, FfprobeProber, Prober, ToolRegistry};
use hf_core::config::Config;
use hf_core::SourceProbe;
use hf_pipeline::{list_conversions, recommend, Conversion, ConversionReport, ConversionRequest};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Progress lines buffered between the encoder and the terminal.
const PROGRESS_BUFFER: usize = 64;

fn main() {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "hlsforge=debug,hf_pipeline=debug,hf_av=debug,hf_core=debug,hf_media=debug".to_string()
        } else {
            "hlsforge=info,hf_pipeline=info,hf_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Probe { file, json } => {
            let config = Config::load_or_default(cli.config.as_deref());
            block_on(probe_file(&config, &file, json))
        }
        Commands::CheckTools => {
            let config = Config::load_or_default(cli.config.as_deref());
            check_tools(&config)
        }
        Commands::Recommend {
            input,
            profile,
            json,
        } => {
            let config = Config::load_or_default(cli.config.as_deref());
            block_on(recommend_profile(config, &input, profile, json))
        }
        Commands::Convert {
            input,
            output,
            profile,
            encrypt,
            key_rotation,
            key_uri_prefix,
            parallel,
            no_thumbnail,
            quiet,
            json,
        } => {
            let mut config = Config::load_or_default(cli.config.as_deref());
            if encrypt || key_rotation.is_some() || key_uri_prefix.is_some() {
                config.encryption.enabled = true;
            }
            if let Some(period) = key_rotation {
                config.encryption.key_rotation_period = period;
            }
            if key_uri_prefix.is_some() {
                config.encryption.key_uri_prefix = key_uri_prefix;
            }
            if let Some(n) = parallel {
                config.conversion.max_parallel_jobs = n;
            }
            if no_thumbnail {
                config.conversion.generate_thumbnail = false;
            }
            let request = ConversionRequest {
                input,
                output_dir: output,
                overrides: profile.into_overrides(),
            };
            block_on(convert(config, request, quiet, json))
        }
        Commands::List { root, json } => {
            let config = Config::load_or_default(cli.config.as_deref());
            let root = root.unwrap_or(config.conversion.output_root);
            list_runs(&root, json)
        }
        Commands::Validate { file } => {
            let path = file.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("hlsforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn block_on<F: std::future::Future<Output = Result<()>>>(future: F) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(future)
}

/// Map an error chain to the process exit code.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<hf_core::Error>())
        .map_or(1, hf_core::Error::exit_code)
}

async fn probe_file(config: &Config, file: &Path, json: bool) -> Result<()> {
    let tools = ToolRegistry::discover(&config.tools);
    let prober = FfprobeProber::from_registry(&tools)?;
    let probe = prober.probe(file).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&probe)?);
    } else {
        print_probe(&probe);
    }
    Ok(())
}

fn print_probe(probe: &SourceProbe) {
    println!("File: {}", probe.path.display());
    if let Some(duration) = probe.duration {
        let secs = duration.as_secs();
        println!(
            "Duration: {:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
    } else {
        println!("Duration: unknown");
    }

    let v = &probe.video;
    print!("Video: {} {}x{}", v.codec, v.width, v.height);
    if let Some(fps) = v.frame_rate {
        print!(", {fps:.3} fps");
    }
    match v.bitrate {
        Some(bps) => println!(", {} kb/s", bps / 1000),
        None => println!(", bitrate unknown"),
    }

    match &probe.audio {
        Some(a) => {
            print!("Audio: {}", a.codec);
            if let Some(rate) = a.sample_rate {
                print!(", {rate} Hz");
            }
            if let Some(ch) = a.channels {
                print!(", {ch}ch");
            }
            if let Some(bps) = a.bitrate {
                print!(", {} kb/s", bps / 1000);
            }
            println!();
        }
        None => println!("Audio: none"),
    }
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let tools = ToolRegistry::discover(&config.tools);
    let mut all_ok = true;
    for tool in tools.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };
        print!("{} {}", status, tool.name);
        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }
        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }
        println!();
    }

    let caps = detect_capabilities(&tools);
    println!();
    println!("OS: {}", caps.os);
    println!("CPU: {}", caps.cpu.as_deref().unwrap_or("unknown"));
    let hw = caps.hardware_encoders();
    if hw.is_empty() {
        println!("Hardware encoders: none (libx264 will be used)");
    } else {
        let names: Vec<_> = hw.iter().map(|e| e.to_string()).collect();
        println!("Hardware encoders: {}", names.join(", "));
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to enable conversion.");
    }
    Ok(())
}

async fn recommend_profile(
    config: Config,
    input: &Path,
    profile: ProfileArgs,
    json: bool,
) -> Result<()> {
    let tools = ToolRegistry::discover(&config.tools);
    let prober = FfprobeProber::from_registry(&tools)?;
    let probe = prober.probe(input).await?;
    let caps = detect_capabilities_async(&tools).await?;

    let overrides = profile.into_overrides();
    let mut plan = recommend(&probe, &caps);
    if !overrides.is_empty() {
        plan = overrides.apply(plan, &probe, &caps)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("Video encoder: {}", plan.video_encoder);
    match plan.audio_bitrate {
        Some(rate) => println!("Audio encoder: {} @ {}", plan.audio_encoder, rate),
        None => println!("Audio encoder: {}", plan.audio_encoder),
    }
    println!("Segment duration: {}s", plan.segment_duration);
    println!("Playlist type: {}", plan.playlist_type);
    println!("Renditions:");
    for r in &plan.renditions {
        let rate = r
            .video_bitrate
            .map_or_else(|| "source".to_string(), |k| k.to_string());
        println!("  {:<10} -> {:<6} {}", r.label, r.dir_name, rate);
    }
    Ok(())
}

async fn convert(config: Config, request: ConversionRequest, quiet: bool, json: bool) -> Result<()> {
    for warning in config.validate() {
        tracing::warn!("{warning}");
    }

    let cancel = CancellationToken::new();
    let (tx, mut rx) = tokio::sync::mpsc::channel(PROGRESS_BUFFER);
    let conversion = Conversion::new(config)?
        .with_progress(tx)
        .with_cancellation(cancel.clone());

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if !quiet {
                eprintln!("[{}] {}", event.rendition, event.line);
            }
        }
    });

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling conversion");
            interrupt.cancel();
        }
    });

    let input = request.input.clone();
    let report = conversion
        .run(request)
        .await
        .with_context(|| format!("converting {}", input.display()))?;
    drop(conversion);
    let _ = printer.await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    report.ensure_success()?;
    Ok(())
}

fn print_report(report: &ConversionReport) {
    println!("Conversion {} ({})", report.id, report.outcome);
    println!("Run directory: {}", report.run_dir.display());
    for r in &report.results {
        match (&r.playlist, &r.failure) {
            (Some(playlist), _) => println!(
                "  ✓ {:<10} {} ({:.1}s)",
                r.label(),
                playlist.display(),
                r.elapsed.as_secs_f64()
            ),
            (None, Some(failure)) => {
                println!("  ✗ {:<10} {}", r.label(), failure.kind);
                let lines: Vec<_> = failure.diagnostics.lines().collect();
                for line in &lines[lines.len().saturating_sub(5)..] {
                    println!("      {line}");
                }
            }
            (None, None) => println!("  ? {}", r.label()),
        }
    }
    match &report.master {
        Some(master) => println!("Master playlist: {}", master.display()),
        None => println!("Master playlist: not written"),
    }
    if let Some(thumb) = &report.thumbnail {
        println!("Thumbnail: {}", thumb.display());
    }
    for warning in &report.warnings {
        println!("Warning: {warning}");
    }
}

fn list_runs(root: &Path, json: bool) -> Result<()> {
    let runs = list_conversions(root)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }
    if runs.is_empty() {
        println!("No conversions found under {}", root.display());
        return Ok(());
    }
    for run in &runs {
        let master = if run.has_master { "master" } else { "no master" };
        let dirs: Vec<_> = run
            .renditions
            .iter()
            .map(|r| {
                if r.encrypted {
                    format!("{} ({} seg, encrypted)", r.dir_name, r.segments)
                } else {
                    format!("{} ({} seg)", r.dir_name, r.segments)
                }
            })
            .collect();
        println!("{}  [{}]  {}", run.name, master, dirs.join(", "));
    }
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("reading {}", p.display()))?;
            let config = Config::from_json(&text)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Output root: {}", config.conversion.output_root.display());
    println!("  Playlist name: {}", config.conversion.playlist_stem());
    println!("  Parallel jobs: {}", config.conversion.parallelism());
    println!("  Encryption: {}", if config.encryption.enabled { "on" } else { "off" });
    if let Some(period) = config.encryption.rotation_period() {
        println!("  Key rotation: every {period} segments");
    }
    for warning in config.validate() {
        println!("  Warning: {warning}");
    }
    Ok(())
}

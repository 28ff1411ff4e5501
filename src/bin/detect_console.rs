//! detect_console - send images to an object-detection service and show the results
//!
//! Subcommands:
//! - `predict <IMAGE>`: one-shot upload, prints detections, exits non-zero on failure
//! - `interactive`: line-driven session (open, drop, threshold, predict, ...)
//! - `health`: check that the service root answers

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use detection_console::preview::{decode_data_url, extension_for};
use detection_console::{
    CandidateFile, ConsoleConfig, Event, HttpPredictionService, Runtime, RuntimeHandle, StatusKind,
    TerminalRenderer, Threshold, UiMode, UploadController,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Upload images to an object-detection service and display the detections"
)]
struct Args {
    /// Base URL of the prediction service.
    #[arg(long, env = "DETECT_CONSOLE_ENDPOINT")]
    endpoint: Option<String>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse one image and print the detections.
    Predict {
        /// JPEG or PNG image, at most 10MB.
        image: PathBuf,

        /// Minimum score the service should keep (0-1).
        #[arg(long, value_parser = parse_threshold)]
        threshold: Option<Threshold>,

        /// Write the annotated image returned by the service here.
        #[arg(long, value_name = "PATH")]
        save_annotated: Option<PathBuf>,
    },
    /// Interactive session reading commands from stdin.
    Interactive,
    /// Check that the service answers.
    Health,
}

fn parse_threshold(raw: &str) -> Result<Threshold, String> {
    Threshold::parse(raw).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = ConsoleConfig::load()?;
    if let Some(endpoint) = args.endpoint {
        cfg.endpoint = endpoint;
    }
    let is_tty = io::stderr().is_terminal();
    let mode = UiMode::from_flag(Some(&args.ui));
    let service = Arc::new(HttpPredictionService::new(
        &cfg.endpoint,
        cfg.request_timeout,
    )?);
    log::info!("prediction service: {}", cfg.endpoint);

    match args.command {
        Command::Predict {
            image,
            threshold,
            save_annotated,
        } => {
            if let Some(threshold) = threshold {
                cfg.default_threshold = threshold;
            }
            predict_once(&cfg, service, mode, is_tty, &image, save_annotated.as_deref())
        }
        Command::Interactive => interactive(&cfg, service, mode, is_tty),
        Command::Health => {
            let greeting = service.greeting()?;
            println!("{}", greeting.message);
            Ok(())
        }
    }
}

fn predict_once(
    cfg: &ConsoleConfig,
    service: Arc<HttpPredictionService>,
    mode: UiMode,
    is_tty: bool,
    image: &Path,
    save_annotated: Option<&Path>,
) -> Result<()> {
    let candidate = CandidateFile::from_path(image)?;
    let mut runtime = Runtime::new(UploadController::new(cfg.controller_options()), service);
    let mut renderer = TerminalRenderer::new(io::stdout(), mode, is_tty);
    install_ctrlc(runtime.handle())?;

    runtime.dispatch(Event::FileChosen(candidate), &mut renderer)?;
    runtime.run_until_settled(&mut renderer)?;
    if runtime.controller().selected_file().is_none() {
        return Err(anyhow!(status_text(&runtime)));
    }

    runtime.dispatch(Event::PredictRequested, &mut renderer)?;
    runtime.run_until_settled(&mut renderer)?;
    runtime.run_for(cfg.scroll_delay, &mut renderer)?;
    if runtime.is_shut_down() {
        return Err(anyhow!("interrupted"));
    }

    let controller = runtime.controller();
    if controller.status().map(|s| s.kind) == Some(StatusKind::Error) {
        return Err(anyhow!(status_text(&runtime)));
    }

    if let Some(path) = save_annotated {
        match controller.last_result().and_then(|r| r.image.as_deref()) {
            Some(url) => save_annotated_image(url, path)?,
            None => log::warn!("service returned no annotated image; nothing written"),
        }
    }
    Ok(())
}

fn status_text<S: detection_console::PredictionService + 'static>(runtime: &Runtime<S>) -> String {
    runtime
        .controller()
        .status()
        .map(|s| s.text.clone())
        .unwrap_or_else(|| "prediction did not complete".to_string())
}

fn save_annotated_image(data_url: &str, path: &Path) -> Result<()> {
    let (mime, bytes) = decode_data_url(data_url).context("decode annotated image")?;
    let target = if path.is_dir() {
        path.join(format!("annotated.{}", extension_for(&mime)))
    } else {
        path.to_path_buf()
    };
    std::fs::write(&target, &bytes)
        .with_context(|| format!("write annotated image {}", target.display()))?;
    log::info!("annotated image written to {}", target.display());
    Ok(())
}

fn interactive(
    cfg: &ConsoleConfig,
    service: Arc<HttpPredictionService>,
    mode: UiMode,
    is_tty: bool,
) -> Result<()> {
    let mut runtime = Runtime::new(UploadController::new(cfg.controller_options()), service);
    let mut renderer = TerminalRenderer::new(io::stdout(), mode, is_tty);
    let handle = runtime.handle();
    install_ctrlc(handle.clone())?;

    eprintln!("{HELP}");
    thread::spawn(move || read_commands(io::stdin().lock(), &handle));

    runtime.run(&mut renderer)
}

fn install_ctrlc(handle: RuntimeHandle) -> Result<()> {
    ctrlc::set_handler(move || handle.shutdown()).context("install Ctrl-C handler")
}

const HELP: &str = "commands: open <path> | drop <path>... | threshold <0-1> | predict | show | help | quit";

#[derive(Debug, PartialEq)]
enum Input {
    Open(PathBuf),
    Drop(Vec<PathBuf>),
    Threshold(f64),
    Predict,
    Show,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Result<Option<Input>> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = parts.collect();
    let input = match command {
        "open" => match rest.as_slice() {
            [path] => Input::Open(PathBuf::from(path)),
            _ => return Err(anyhow!("usage: open <path>")),
        },
        "drop" => Input::Drop(rest.iter().map(PathBuf::from).collect()),
        "threshold" => match rest.as_slice() {
            [value] => Input::Threshold(
                value
                    .parse()
                    .map_err(|_| anyhow!("threshold must be a number"))?,
            ),
            _ => return Err(anyhow!("usage: threshold <0-1>")),
        },
        "predict" => Input::Predict,
        "show" => Input::Show,
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => return Err(anyhow!("unknown command '{}'", other)),
    };
    Ok(Some(input))
}

fn read_commands<R: BufRead>(reader: R, handle: &RuntimeHandle) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                log::warn!("stdin closed: {}", err);
                break;
            }
        };
        let input = match parse_input(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };
        let sent = match input {
            Input::Open(path) => match CandidateFile::from_path(&path) {
                Ok(candidate) => handle.send(Event::FileChosen(candidate)),
                Err(err) => {
                    eprintln!("{err:#}");
                    continue;
                }
            },
            Input::Drop(paths) => {
                let mut files = Vec::new();
                for path in &paths {
                    match CandidateFile::from_path(path) {
                        Ok(candidate) => files.push(candidate),
                        Err(err) => eprintln!("{err:#}"),
                    }
                }
                handle
                    .send(Event::DragEnter)
                    .and_then(|_| handle.send(Event::FilesDropped(files)))
            }
            Input::Threshold(value) => handle.send(Event::ThresholdInput(value)),
            Input::Predict => handle.send(Event::PredictRequested),
            Input::Show => handle.redraw(),
            Input::Help => {
                eprintln!("{HELP}");
                continue;
            }
            Input::Quit => break,
        };
        if sent.is_err() {
            return;
        }
    }
    handle.shutdown();
}

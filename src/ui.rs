use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::Write;
use std::time::{Duration, Instant};

use crate::render::DetectionEntries;
use crate::view::{UploadZone, ViewModel};

const LOADING_LABEL: &str = "Analyzing";

/// Applies view models to some output.
pub trait Renderer {
    /// Called after every processed event.
    fn render(&mut self, view: &ViewModel) -> Result<()>;

    /// Draws everything, not just what changed.
    fn redraw(&mut self, view: &ViewModel) -> Result<()> {
        self.render(view)
    }

    /// Brings the result panel into view.
    fn scroll_results_into_view(&mut self, _view: &ViewModel) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

/// Line-oriented renderer: prints each region when it changes.
///
/// Results go to `out`. While the predict button is loading, stderr shows a
/// spinner (pretty) or a single progress line (plain).
pub struct TerminalRenderer<W: Write> {
    out: W,
    pretty: bool,
    last: Option<ViewModel>,
    /// Set while a prediction is running.
    loading_since: Option<Instant>,
    spinner: Option<ProgressBar>,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, mode: UiMode, is_tty: bool) -> Self {
        let pretty = is_tty
            && match mode {
                UiMode::Pretty | UiMode::Auto => true,
                UiMode::Plain => false,
            };
        Self {
            out,
            pretty,
            last: None,
            loading_since: None,
            spinner: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, view: &ViewModel, full: bool) -> Result<()> {
        let last = if full { None } else { self.last.take() };
        let changed = |f: &dyn Fn(&ViewModel) -> bool| match &last {
            Some(prev) => f(prev),
            None => true,
        };

        if changed(&|prev| prev.upload.zone != view.upload.zone) {
            let line = upload_line(&view.upload.zone);
            writeln!(self.out, "{line}").context("write output")?;
        }
        if changed(&|prev| prev.threshold_label != view.threshold_label) {
            if let Some(label) = &view.threshold_label {
                writeln!(self.out, "Threshold: {label}").context("write output")?;
            }
        }
        if changed(&|prev| prev.predict_button.loading != view.predict_button.loading) {
            self.set_loading(view.predict_button.loading);
        }
        if changed(&|prev| prev.status != view.status) {
            if let Some(status) = &view.status {
                writeln!(self.out, "[{}] {}", status.kind, status.text).context("write output")?;
            }
        }
        let results_changed = changed(&|prev| {
            prev.results_visible != view.results_visible || prev.detections != view.detections
        });
        if view.results_visible && results_changed {
            for line in results_lines(view) {
                writeln!(self.out, "{line}").context("write output")?;
            }
        }
        self.out.flush().context("flush output")?;
        self.last = Some(view.clone());
        Ok(())
    }

    fn set_loading(&mut self, loading: bool) {
        match (loading, self.loading_since) {
            (true, None) => {
                self.loading_since = Some(Instant::now());
                if self.pretty {
                    let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
                    let style = ProgressStyle::with_template("{spinner} {msg} {elapsed}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner());
                    spinner.set_style(style);
                    spinner.set_message(LOADING_LABEL);
                    spinner.enable_steady_tick(Duration::from_millis(120));
                    self.spinner = Some(spinner);
                } else {
                    eprintln!("==> {LOADING_LABEL}");
                }
            }
            (false, Some(started)) => {
                self.loading_since = None;
                let done = format!("✔ analysis finished in {:.1?}", started.elapsed());
                match self.spinner.take() {
                    Some(spinner) => spinner.finish_with_message(done),
                    None => eprintln!("{done}"),
                }
            }
            _ => {}
        }
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn render(&mut self, view: &ViewModel) -> Result<()> {
        self.draw(view, false)
    }

    fn redraw(&mut self, view: &ViewModel) -> Result<()> {
        self.draw(view, true)
    }

    /// Plain output is already sequential, so only pretty mode repeats the panel.
    fn scroll_results_into_view(&mut self, view: &ViewModel) -> Result<()> {
        if !self.pretty || !view.results_visible {
            return Ok(());
        }
        writeln!(self.out, "── Results ──").context("write output")?;
        for line in results_lines(view) {
            writeln!(self.out, "{line}").context("write output")?;
        }
        self.out.flush().context("flush output")
    }
}

fn upload_line(zone: &UploadZone) -> String {
    match zone {
        UploadZone::Prompt => "No image selected. Choose or drop a JPEG/PNG image.".to_string(),
        UploadZone::Preview {
            file_name,
            dimensions: Some((w, h)),
            ..
        } => format!("Preview: {file_name} ({w}x{h})"),
        UploadZone::Preview { file_name, .. } => format!("Preview: {file_name}"),
    }
}

/// The result panel as text lines.
pub fn results_lines(view: &ViewModel) -> Vec<String> {
    let mut lines = vec![format!("Detected: {}", view.detections.count_text)];
    match &view.detections.entries {
        DetectionEntries::Placeholder(placeholder) => {
            lines.push(format!("  {}", placeholder.text()));
        }
        DetectionEntries::Lines(entries) => {
            for entry in entries {
                lines.push(format!("  {:<16} {}", entry.label_text, entry.box_text));
            }
        }
    }
    if let Some(image) = &view.processed_image {
        lines.push(format!("Annotated image: {} bytes as data URL", image.len()));
    }
    lines
}

use super::{load_chart, Chart};
use crate::error::{Error, Result};
use egui::Color32;
use egui_plot::{Legend, Line, Plot, PlotPoints};
use std::path::PathBuf;
use std::time::{Duration, Instant};

const PALETTE: [Color32; 5] = [
    Color32::BLUE,
    Color32::RED,
    Color32::GREEN,
    Color32::from_rgb(255, 165, 0),
    Color32::from_rgb(128, 0, 128),
];

/// Live window over a sample stream.
///
/// Holds the last chart that loaded successfully and reloads the file on a
/// fixed cadence; a failed reload keeps the previous chart on screen.
pub struct StreamViewer {
    input: PathBuf,
    refresh_every: Duration,
    chart: Option<Chart>,
    status: String,
    last_load: Option<Instant>,
}

impl StreamViewer {
    pub fn new(input: impl Into<PathBuf>, refresh_every: Duration) -> Self {
        Self {
            input: input.into(),
            refresh_every,
            chart: None,
            status: String::new(),
            last_load: None,
        }
    }

    fn should_reload(&self) -> bool {
        self.last_load
            .map_or(true, |last| last.elapsed() >= self.refresh_every)
    }

    pub fn reload(&mut self) {
        self.last_load = Some(Instant::now());
        match load_chart(&self.input) {
            Ok(chart) => {
                self.status = format!("{} (memory in {})", self.input.display(), chart.unit.label());
                self.chart = Some(chart);
            }
            Err(Error::SourceUnavailable(_)) => {
                self.status = format!("Waiting for CSV file: {}", self.input.display());
            }
            Err(Error::DataInsufficient { .. }) => {
                self.status = "Waiting for more data...".to_string();
            }
            Err(err) => {
                log::debug!("viewer: {}", err);
                self.status = "Waiting for valid data...".to_string();
            }
        }
    }

    pub fn chart(&self) -> Option<&Chart> {
        self.chart.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }
}

fn series_plot(ui: &mut egui::Ui, id: &str, height: f32, y_label: &str, chart: &Chart, cpu: bool) {
    let plot = Plot::new(id)
        .height(height)
        .legend(Legend::default())
        .x_axis_label(chart.x_label())
        .y_axis_label(y_label)
        .include_x(0.0)
        .include_y(0.0)
        .allow_drag(false)
        .allow_scroll(false);

    plot.show(ui, |plot_ui| {
        for (i, series) in chart.series.iter().enumerate() {
            let values = if cpu { &series.cpu } else { &series.memory };
            let points: PlotPoints = values.iter().map(|&(x, y)| [x, y]).collect();
            plot_ui.line(
                Line::new(points)
                    .name(&series.label)
                    .color(PALETTE[i % PALETTE.len()])
                    .width(2.0),
            );
        }
    });
}

impl eframe::App for StreamViewer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.should_reload() {
            self.reload();
        }

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.add_space(16.0);
                egui::widgets::global_theme_preference_buttons(ui);

                ui.add_space(16.0);
                ui.label(&self.status);
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| match &self.chart {
            Some(chart) => {
                ui.heading(chart.title());
                let height = (ui.available_height() - 40.0).max(200.0) / 2.0;
                series_plot(ui, "memory_plot", height, &chart.memory_label(), chart, false);
                series_plot(ui, "cpu_plot", height, "CPU (%)", chart, true);
            }
            None => {
                ui.label(&self.status);
            }
        });

        ctx.request_repaint_after(self.refresh_every);
    }
}

/// Opens the viewer window and blocks until it is closed.
pub fn run_viewer(input: PathBuf, refresh_every: Duration) -> Result<()> {
    let title = format!("proctrace - {}", input.display());
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 800.0])
            .with_title(title.as_str()),
        ..Default::default()
    };

    eframe::run_native(
        &title,
        options,
        Box::new(move |_cc| Ok(Box::new(StreamViewer::new(input, refresh_every)))),
    )
    .map_err(|err| Error::Chart(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn keeps_last_good_chart_across_bad_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("metrics.csv");
        let mut viewer = StreamViewer::new(&input, Duration::from_millis(10));

        viewer.reload();
        assert!(viewer.chart().is_none());
        assert!(viewer.status().starts_with("Waiting for CSV file"));

        fs::write(
            &input,
            "timestamp,cpu_percent,memory_mb\n\
             2024-05-01T10:00:00.000000,0.0,10.0\n\
             2024-05-01T10:00:01.000000,5.0,12.0\n",
        )
        .unwrap();
        viewer.reload();
        assert_eq!(viewer.chart().map(|c| c.series.len()), Some(1));

        fs::write(&input, "timestamp,cpu_percent,memory_mb\nbroken,row,here\n").unwrap();
        viewer.reload();
        assert!(viewer.chart().is_some());
        assert_eq!(viewer.status(), "Waiting for valid data...");
    }
}

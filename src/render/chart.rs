use super::Chart;
use crate::error::{Error, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use std::path::Path;
use std::sync::OnceLock;

pub const CHART_SIZE: (u32, u32) = (1400, 1000);

const FONT_FAMILY: &str = "sans-serif";
const EMBEDDED_FONT: &str = "Ubuntu-Light";

const PALETTE: [RGBColor; 5] = [
    BLUE,
    RED,
    GREEN,
    RGBColor(255, 165, 0),
    RGBColor(128, 0, 128),
];

fn chart_error(err: impl std::fmt::Display) -> Error {
    Error::Chart(err.to_string())
}

/// Registers the egui default UI font as plotters' sans-serif family, so
/// text rendering does not depend on fonts installed on the host.
fn register_fonts() -> Result<()> {
    static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();

    REGISTERED
        .get_or_init(|| {
            let definitions = egui::FontDefinitions::default();
            let data = definitions
                .font_data
                .get(EMBEDDED_FONT)
                .ok_or_else(|| format!("font {} is not embedded", EMBEDDED_FONT))?;
            let bytes: &'static [u8] = Box::leak(data.font.to_vec().into_boxed_slice());

            for style in [FontStyle::Normal, FontStyle::Bold] {
                register_font(FONT_FAMILY, style, bytes)
                    .map_err(|_| format!("font {} could not be registered", EMBEDDED_FONT))?;
            }
            Ok(())
        })
        .clone()
        .map_err(Error::Chart)
}

#[derive(Clone, Copy)]
enum Panel {
    Memory,
    Cpu,
}

/// Draws the memory panel above the CPU panel and writes the PNG to `path`.
pub fn draw_png(chart: &Chart, path: &Path) -> Result<()> {
    register_fonts()?;

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(chart_error)?;
    let root = root
        .titled(chart.title(), (FONT_FAMILY, 36))
        .map_err(chart_error)?;

    let panels = root.split_evenly((2, 1));
    draw_panel(&panels[0], chart, Panel::Memory)?;
    draw_panel(&panels[1], chart, Panel::Cpu)?;

    root.present().map_err(chart_error)?;
    Ok(())
}

fn draw_panel(area: &DrawingArea<BitMapBackend<'_>, Shift>, chart: &Chart, panel: Panel) -> Result<()> {
    let (y_label, y_max) = match panel {
        Panel::Memory => (chart.memory_label(), chart.max_memory()),
        Panel::Cpu => ("CPU (%)".to_string(), chart.max_cpu()),
    };
    let x_max = positive_or_one(chart.max_seconds());
    let y_max = positive_or_one(y_max * 1.1);

    let mut ctx = ChartBuilder::on(area)
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..x_max, 0f64..y_max)
        .map_err(chart_error)?;

    ctx.configure_mesh()
        .x_desc(chart.x_label())
        .y_desc(y_label.as_str())
        .label_style((FONT_FAMILY, 18))
        .draw()
        .map_err(chart_error)?;

    for (i, series) in chart.series.iter().enumerate() {
        let color = PALETTE[i % PALETTE.len()];
        let points = match panel {
            Panel::Memory => &series.memory,
            Panel::Cpu => &series.cpu,
        };

        ctx.draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))
            .map_err(chart_error)?
            .label(series.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    ctx.configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .label_font((FONT_FAMILY, 18))
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(chart_error)?;

    Ok(())
}

fn positive_or_one(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        1.0
    }
}

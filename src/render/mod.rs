use crossterm::style::{Color, Stylize};
use textplots::{Chart, Plot, Shape};

use crate::color::{ColorScale, Rgb};

/// ASCII chart rendering for the terminal front end. Charts go to stdout
/// as plain strings; colors are limited to legend swatches so the plots
/// stay readable on dumb terminals.
pub struct ChartRenderer;

impl ChartRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Plot labelled values as an ASCII bar chart with an index legend.
    pub fn bar_chart(
        &self,
        title: &str,
        entries: &[(String, f64)],
        width: Option<usize>,
        height: Option<usize>,
    ) -> String {
        self.indexed_chart(title, entries, width, height, ChartStyle::Bars)
    }

    /// Plot labelled values as scattered points, the ranking-page look.
    pub fn scatter_chart(
        &self,
        title: &str,
        entries: &[(String, f64)],
        width: Option<usize>,
        height: Option<usize>,
    ) -> String {
        self.indexed_chart(title, entries, width, height, ChartStyle::Points)
    }

    fn indexed_chart(
        &self,
        title: &str,
        entries: &[(String, f64)],
        width: Option<usize>,
        height: Option<usize>,
        style: ChartStyle,
    ) -> String {
        if entries.is_empty() {
            return format!("No data available for '{}'", title);
        }

        let values: Vec<f64> = entries.iter().map(|(_, v)| *v).collect();
        let min_val = values.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max_val = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let avg_val = values.iter().sum::<f64>() / values.len() as f64;

        // Index-based x-axis for even spacing; the legend below maps
        // indices back to entry labels.
        let plot_data: Vec<(f32, f32)> = entries
            .iter()
            .enumerate()
            .map(|(i, (_, v))| (i as f32, *v as f32))
            .collect();

        let chart_width = width.unwrap_or(80);
        let chart_height = height.unwrap_or(20);
        let x_max = (entries.len().saturating_sub(1)).max(1) as f32;

        let mut output = String::new();
        output.push_str(&format!("{}\n", title));
        output.push_str(&format!(
            "Entries: {} | Min: {:.2} | Max: {:.2} | Avg: {:.2}\n",
            entries.len(),
            min_val,
            max_val,
            avg_val
        ));
        output.push_str(&"─".repeat(chart_width));
        output.push('\n');

        let chart = match style {
            ChartStyle::Bars => Chart::new(chart_width as u32, chart_height as u32, 0.0, x_max)
                .lineplot(&Shape::Bars(&plot_data))
                .to_string(),
            ChartStyle::Points => Chart::new(chart_width as u32, chart_height as u32, 0.0, x_max)
                .lineplot(&Shape::Points(&plot_data))
                .to_string(),
        };
        output.push_str(&chart);
        output.push('\n');

        for (i, (label, value)) in entries.iter().enumerate() {
            output.push_str(&format!("  {:>3}: {} ({:.2})\n", i, label, value));
        }
        output.push_str(&"─".repeat(chart_width));
        output
    }

    /// Terminal-size-aware chart dimensions, with sane fallbacks.
    pub fn optimal_dimensions(&self) -> (usize, usize) {
        match crossterm::terminal::size() {
            Ok((cols, rows)) => {
                let width = (cols as usize).clamp(60, 120);
                let height = (rows as usize / 3).clamp(15, 30);
                (width, height)
            }
            Err(_) => (80, 20),
        }
    }
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self::new()
    }
}

enum ChartStyle {
    Bars,
    Points,
}

/// A colored block for legend rows.
pub fn swatch(color: Rgb) -> String {
    "██"
        .with(Color::Rgb {
            r: color.r,
            g: color.g,
            b: color.b,
        })
        .to_string()
}

/// Render a resolved color scale as legend lines.
pub fn scale_legend(scale: &ColorScale) -> String {
    match scale {
        ColorScale::Diverging(diverging) => {
            let mut strip = String::new();
            for i in 0..24 {
                strip.push_str(&swatch(diverging.color_at(i as f64 / 23.0)));
            }
            let meaning = if diverging.reversed {
                "Green (better) → Red (worse)"
            } else {
                "Red (worse) → Green (better)"
            };
            format!("Color scheme [{}]: {}\n{}", diverging.name, meaning, strip)
        }
        ColorScale::Levels { entries } | ColorScale::Discrete { entries } => {
            let mut out = String::from("Category colors:");
            for entry in entries {
                out.push_str(&format!("\n  {} {} ({})", swatch(entry.color), entry.label, entry.color.hex()));
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Polarity;
    use crate::color::{resolve_categorical, resolve_continuous};

    fn sample_entries() -> Vec<(String, f64)> {
        vec![
            ("Africa".to_string(), 33.4),
            ("Asia".to_string(), 62.1),
            ("Europe".to_string(), 81.9),
        ]
    }

    #[test]
    fn bar_chart_carries_title_stats_and_legend() {
        let renderer = ChartRenderer::new();
        let chart = renderer.bar_chart("Safety by continent", &sample_entries(), Some(60), Some(10));
        assert!(chart.contains("Safety by continent"));
        assert!(chart.contains("Entries: 3"));
        assert!(chart.contains("Min: 33.40"));
        assert!(chart.contains("Europe (81.90)"));
    }

    #[test]
    fn empty_chart_reports_no_data() {
        let renderer = ChartRenderer::new();
        let chart = renderer.bar_chart("Safety", &[], None, None);
        assert!(chart.contains("No data available"));
    }

    #[test]
    fn single_entry_chart_does_not_collapse_the_axis() {
        let renderer = ChartRenderer::new();
        let chart = renderer.scatter_chart("One", &[("Fiji".to_string(), 5.0)], Some(60), Some(10));
        assert!(chart.contains("Fiji (5.00)"));
    }

    #[test]
    fn diverging_legend_states_the_direction() {
        let legend = scale_legend(&resolve_continuous(Polarity::HigherIsBetter));
        assert!(legend.contains("RdYlGn"));
        assert!(legend.contains("Red (worse) → Green (better)"));

        let legend = scale_legend(&resolve_continuous(Polarity::LowerIsBetter));
        assert!(legend.contains("Green (better) → Red (worse)"));
    }

    #[test]
    fn categorical_legend_lists_every_label() {
        let labels = vec!["Very Low".to_string(), "High".to_string()];
        let legend = scale_legend(&resolve_categorical(Polarity::HigherIsBetter, &labels));
        assert!(legend.contains("Very Low"));
        assert!(legend.contains("#d73027"));
        assert!(legend.contains("High"));
    }
}

//! Static waterfall chart rendered as inline SVG.
//!
//! Rows are ordered by decreasing |contribution| from top to bottom. The
//! bottom row starts at the base value `E[f(X)]` and each row above continues
//! from where the previous one ended, so the top row finishes at `f(x)`.
use maud::{html, Markup};

use crate::error::{ModelError, ModelResult};
use crate::explain::Attribution;
use crate::features::FEATURE_SPECS;

const WIDTH: f64 = 720.0;
const ROW_HEIGHT: f64 = 36.0;
const LABEL_GUTTER: f64 = 230.0;
const RIGHT_MARGIN: f64 = 40.0;
const TOP_MARGIN: f64 = 44.0;
const BOTTOM_MARGIN: f64 = 56.0;

const POSITIVE_FILL: &str = "#ff0051";
const NEGATIVE_FILL: &str = "#008bfb";

/// One row of the waterfall: the feature and the interval its contribution covers.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterfallStep {
    pub feature: usize,
    pub from: f64,
    pub to: f64,
}

impl WaterfallStep {
    pub fn value(&self) -> f64 {
        self.to - self.from
    }
}

/// Cumulative steps in display order (top row first).
pub fn waterfall_steps(attribution: &Attribution) -> Vec<WaterfallStep> {
    let order = attribution.order_by_magnitude();
    let mut cursor = attribution.base_value;
    let mut steps: Vec<WaterfallStep> = order
        .iter()
        .rev()
        .map(|&feature| {
            let from = cursor;
            cursor += attribution.values[feature];
            WaterfallStep {
                feature,
                from,
                to: cursor,
            }
        })
        .collect();
    steps.reverse();
    steps
}

struct Scale {
    min: f64,
    max: f64,
}

impl Scale {
    fn x(&self, value: f64) -> f64 {
        LABEL_GUTTER + (value - self.min) / (self.max - self.min) * (WIDTH - LABEL_GUTTER - RIGHT_MARGIN)
    }

    fn ticks(&self, n: usize) -> Vec<f64> {
        (0..=n)
            .map(|i| self.min + (self.max - self.min) * i as f64 / n as f64)
            .collect()
    }
}

fn row_label(attribution: &Attribution, feature: usize) -> String {
    let name = &attribution.feature_names[feature];
    let value = attribution.feature_values[feature];
    let shown = FEATURE_SPECS
        .iter()
        .find(|s| s.column == name.as_str())
        .map(|s| s.format_value(value))
        .unwrap_or_else(|| format!("{:.3}", value));
    format!("{} = {}", shown, name)
}

fn fmt(v: f64) -> String {
    format!("{:.1}", v)
}

/// Render the cumulative contribution chart.
pub fn waterfall_svg(attribution: &Attribution) -> ModelResult<Markup> {
    let fx = attribution.output_value();
    let base = attribution.base_value;
    if !fx.is_finite() || !base.is_finite() {
        return Err(ModelError::Render(
            "waterfall needs a finite base value and output".to_string(),
        ));
    }

    let steps = waterfall_steps(attribution);
    let mut min = fx.min(base);
    let mut max = fx.max(base);
    for step in &steps {
        min = min.min(step.from).min(step.to);
        max = max.max(step.from).max(step.to);
    }
    let pad = ((max - min) * 0.1).max(0.05);
    let scale = Scale {
        min: min - pad,
        max: max + pad,
    };

    let plot_bottom = TOP_MARGIN + ROW_HEIGHT * steps.len() as f64;
    let height = plot_bottom + BOTTOM_MARGIN;
    let bar_height = ROW_HEIGHT * 0.6;

    Ok(html! {
        svg xmlns="http://www.w3.org/2000/svg" class="waterfall"
            width=(fmt(WIDTH)) height=(fmt(height))
            viewBox=(format!("0 0 {} {}", fmt(WIDTH), fmt(height)))
            font-family="Times New Roman, serif" font-size="13" {
            // f(x) marker above the top row
            line x1=(fmt(scale.x(fx))) y1=(fmt(TOP_MARGIN - 14.0)) x2=(fmt(scale.x(fx))) y2=(fmt(plot_bottom))
                stroke="#999" stroke-dasharray="4 3" {}
            text x=(fmt(scale.x(fx))) y=(fmt(TOP_MARGIN - 18.0)) text-anchor="middle" {
                (format!("f(x) = {:.3}", fx))
            }

            @for (row, step) in steps.iter().enumerate() {
                @let y = TOP_MARGIN + ROW_HEIGHT * row as f64 + (ROW_HEIGHT - bar_height) / 2.0;
                @let x0 = scale.x(step.from.min(step.to));
                @let x1 = scale.x(step.from.max(step.to));
                @let fill = if step.value() >= 0.0 { POSITIVE_FILL } else { NEGATIVE_FILL };
                text x=(fmt(LABEL_GUTTER - 10.0)) y=(fmt(y + bar_height * 0.7)) text-anchor="end" fill="#333" {
                    (row_label(attribution, step.feature))
                }
                rect x=(fmt(x0)) y=(fmt(y)) width=(fmt((x1 - x0).max(1.0))) height=(fmt(bar_height)) fill=(fill) {}
                @if step.value() >= 0.0 {
                    text x=(fmt(x1 + 4.0)) y=(fmt(y + bar_height * 0.7)) fill=(fill) {
                        (format!("{:+.3}", step.value()))
                    }
                } @else {
                    text x=(fmt(x0 - 4.0)) y=(fmt(y + bar_height * 0.7)) text-anchor="end" fill=(fill) {
                        (format!("{:+.3}", step.value()))
                    }
                }
                // connector to the row above
                @if row > 0 {
                    line x1=(fmt(scale.x(step.to))) y1=(fmt(y)) x2=(fmt(scale.x(step.to))) y2=(fmt(y - (ROW_HEIGHT - bar_height)))
                        stroke="#bbb" stroke-width="1" {}
                }
            }

            // axis with ticks
            line x1=(fmt(LABEL_GUTTER)) y1=(fmt(plot_bottom)) x2=(fmt(WIDTH - RIGHT_MARGIN)) y2=(fmt(plot_bottom))
                stroke="#333" {}
            @for tick in scale.ticks(5) {
                line x1=(fmt(scale.x(tick))) y1=(fmt(plot_bottom)) x2=(fmt(scale.x(tick))) y2=(fmt(plot_bottom + 5.0))
                    stroke="#333" {}
                text x=(fmt(scale.x(tick))) y=(fmt(plot_bottom + 18.0)) text-anchor="middle" font-size="11" {
                    (format!("{:.2}", tick))
                }
            }
            line x1=(fmt(scale.x(base))) y1=(fmt(TOP_MARGIN)) x2=(fmt(scale.x(base))) y2=(fmt(plot_bottom + 22.0))
                stroke="#999" stroke-dasharray="4 3" {}
            text x=(fmt(scale.x(base))) y=(fmt(plot_bottom + 38.0)) text-anchor="middle" {
                (format!("E[f(X)] = {:.3}", base))
            }
        }
    })
}

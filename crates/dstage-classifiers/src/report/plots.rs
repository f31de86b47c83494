use plotly::common::{DashType, Fill, Line, Mode, Position};
use plotly::layout::{Axis, Layout};
use plotly::{Plot, Scatter};

use crate::error::{ModelError, ModelResult};
use crate::explain::Attribution;
use crate::features::FEATURE_SPECS;

/// Colour of contributions that push the output up (toward class 1).
pub const POSITIVE_COLOR: &str = "rgba(255, 0, 81, 1.0)";
/// Colour of contributions that push the output down (toward class 0).
pub const NEGATIVE_COLOR: &str = "rgba(0, 139, 251, 1.0)";

/// One arrow of the force plot, spanning `[start, end]` on the output axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceSegment {
    pub feature: usize,
    pub start: f64,
    pub end: f64,
    pub value: f64,
}

/// Lay out the force plot arrows around the model output `f(x)`.
///
/// Positive contributions stack to the left of `f(x)` and negative ones to the
/// right, each side ordered so the largest contribution sits next to `f(x)`.
/// Zero contributions are not drawn.
pub fn force_segments(attribution: &Attribution) -> Vec<ForceSegment> {
    let fx = attribution.output_value();
    let order = attribution.order_by_magnitude();
    let mut segments = Vec::with_capacity(order.len());

    let mut cursor = fx;
    for &i in order.iter().filter(|&&i| attribution.values[i] > 0.0) {
        let v = attribution.values[i];
        segments.push(ForceSegment {
            feature: i,
            start: cursor - v,
            end: cursor,
            value: v,
        });
        cursor -= v;
    }

    let mut cursor = fx;
    for &i in order.iter().filter(|&&i| attribution.values[i] < 0.0) {
        let v = attribution.values[i];
        segments.push(ForceSegment {
            feature: i,
            start: cursor,
            end: cursor - v,
            value: v,
        });
        cursor -= v;
    }
    segments
}

fn feature_caption(attribution: &Attribution, feature: usize) -> String {
    let name = &attribution.feature_names[feature];
    let value = attribution.feature_values[feature];
    let shown = FEATURE_SPECS
        .iter()
        .find(|s| s.column == name.as_str())
        .map(|s| s.format_value(value))
        .unwrap_or_else(|| format!("{:.3}", value));
    format!("{} = {}", name, shown)
}

/// Arrow polygon for one segment, pointing in the direction it pushes the output.
fn arrow(segment: &ForceSegment, tip: f64) -> (Vec<f64>, Vec<f64>) {
    let (lo, hi) = (segment.start, segment.end);
    let tip = tip.min((hi - lo) / 2.0);
    if segment.value > 0.0 {
        (
            vec![lo, hi - tip, hi, hi - tip, lo, lo + tip, lo],
            vec![0.35, 0.35, 0.5, 0.65, 0.65, 0.5, 0.35],
        )
    } else {
        (
            vec![hi, lo + tip, lo, lo + tip, hi, hi - tip, hi],
            vec![0.35, 0.35, 0.5, 0.65, 0.65, 0.5, 0.35],
        )
    }
}

/// Build the interactive additive force plot for one prediction.
pub fn plot_force(attribution: &Attribution, height: u32) -> ModelResult<Plot> {
    let fx = attribution.output_value();
    let base = attribution.base_value;
    if !fx.is_finite() || attribution.values.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::Render(
            "force plot needs finite attribution values".to_string(),
        ));
    }

    let segments = force_segments(attribution);
    let lo = segments.iter().map(|s| s.start).fold(fx.min(base), f64::min);
    let hi = segments.iter().map(|s| s.end).fold(fx.max(base), f64::max);
    let span = (hi - lo).max(1e-6);
    let tip = span * 0.015;

    let mut plot = Plot::new();

    for segment in &segments {
        let (xs, ys) = arrow(segment, tip);
        let color = if segment.value > 0.0 {
            POSITIVE_COLOR
        } else {
            NEGATIVE_COLOR
        };
        let name = format!(
            "{} ({:+.3})",
            feature_caption(attribution, segment.feature),
            segment.value
        );
        plot.add_trace(
            Scatter::new(xs, ys)
                .name(&name)
                .mode(Mode::Lines)
                .fill(Fill::ToSelf)
                .fill_color(color)
                .line(Line::new().width(0.5).color("white")),
        );
    }

    // feature captions under their arrows
    let label_x: Vec<f64> = segments.iter().map(|s| (s.start + s.end) / 2.0).collect();
    let label_y = vec![0.25; segments.len()];
    let labels: Vec<String> = segments
        .iter()
        .map(|s| feature_caption(attribution, s.feature))
        .collect();
    plot.add_trace(
        Scatter::new(label_x, label_y)
            .mode(Mode::Text)
            .text_array(labels)
            .text_position(Position::BottomCenter)
            .show_legend(false),
    );

    plot.add_trace(
        Scatter::new(vec![base, base], vec![0.2, 0.8])
            .name(&format!("base value = {:.3}", base))
            .mode(Mode::Lines)
            .line(Line::new().color("gray").dash(DashType::Dash)),
    );
    plot.add_trace(
        Scatter::new(vec![fx], vec![0.85])
            .name(&format!("f(x) = {:.3}", fx))
            .mode(Mode::MarkersText)
            .text_array(vec![format!("<b>f(x) = {:.3}</b>", fx)])
            .text_position(Position::TopCenter),
    );

    plot.set_layout(
        Layout::new()
            .title("SHAP Force Plot")
            .height(height as usize)
            .x_axis(Axis::new().title("Model output (log-odds)").zero_line(false))
            .y_axis(
                Axis::new()
                    .visible(false)
                    .range(vec![0.0, 1.05])
                    .show_grid(false),
            ),
    );

    Ok(plot)
}

/// Self-contained interactive HTML document for the force plot.
///
/// plotly.js and its MathJax bundles are inlined, so the document renders
/// without network access.
pub fn force_plot_document(attribution: &Attribution, height: u32) -> ModelResult<String> {
    Ok(plot_force(attribution, height)?.to_html())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attribution() -> Attribution {
        Attribution {
            feature_names: vec![
                "Education".to_string(),
                "MMSE".to_string(),
                "FDG_SUVR_Score".to_string(),
                "Amyloid_SUVR_Score".to_string(),
            ],
            feature_values: vec![12.0, 25.0, 0.0, -1.5],
            values: vec![0.2, 1.1, -0.4, 0.0],
            base_value: -0.3,
            output_index: 0,
        }
    }

    #[test]
    fn stacks_meet_at_output_and_base() {
        let attr = attribution();
        let segments = force_segments(&attr);
        // zero contributions are not drawn
        assert_eq!(segments.len(), 3);
        let fx = attr.output_value();
        let left_edge = segments
            .iter()
            .filter(|s| s.value > 0.0)
            .map(|s| s.start)
            .fold(f64::INFINITY, f64::min);
        let right_edge = segments
            .iter()
            .filter(|s| s.value < 0.0)
            .map(|s| s.end)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!((fx - left_edge - 1.3).abs() < 1e-12);
        assert!((right_edge - fx - 0.4).abs() < 1e-12);
        // largest positive contribution sits next to f(x)
        assert_eq!(segments[0].feature, 1);
        assert!((segments[0].end - fx).abs() < 1e-12);
    }

    #[test]
    fn document_embeds_feature_captions() {
        let html = force_plot_document(&attribution(), 300).unwrap();
        assert!(html.contains("MMSE = 25"));
        assert!(html.contains("FDG_SUVR_Score = 0.00"));
    }

    #[test]
    fn document_loads_no_external_scripts() {
        let html = force_plot_document(&attribution(), 300).unwrap();
        assert!(html.contains("Plotly.newPlot"));
        for (start, _) in html.match_indices("<script") {
            let tag_end = html[start..].find('>').map_or(html.len(), |end| start + end);
            let tag = &html[start..tag_end];
            assert!(!tag.contains("src="), "external script: {}", tag);
        }
    }

    #[test]
    fn non_finite_values_fail_to_render() {
        let mut attr = attribution();
        attr.values[0] = f64::NAN;
        assert!(plot_force(&attr, 300).is_err());
    }
}

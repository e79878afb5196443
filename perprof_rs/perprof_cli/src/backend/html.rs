use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use perprof::{ProfileData, ProfilerOptions, Rgb};
use serde_json::{json, Value as JsonValue};
use tracing::info;

use super::{check_output, solver_color, step_points, x_limit, Profiler};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Interactive chart as a self-contained HTML page.
pub struct HtmlProfiler {
    data: ProfileData,
    options: ProfilerOptions,
    output: PathBuf,
}

impl HtmlProfiler {
    pub fn new(data: ProfileData, options: ProfilerOptions) -> Self {
        let output = options
            .output_path()
            .unwrap_or_else(|| PathBuf::from(format!("{}.html", options.output)));
        Self {
            data,
            options,
            output,
        }
    }

    fn traces(&self) -> Vec<JsonValue> {
        let x_end = x_limit(&self.data, &self.options);
        self.data
            .solvers()
            .iter()
            .enumerate()
            .map(|(s, name)| {
                let points = step_points(self.data.breakpoints(), self.data.curve(s), x_end);
                let (xs, ys): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
                json!({
                    "type": "scatter",
                    "mode": "lines",
                    "name": name,
                    "x": xs,
                    "y": ys,
                    "line": {
                        "shape": "hv",
                        "width": 2,
                        "color": solver_color(s, self.options.black_and_white).to_hex(),
                    },
                    "hovertemplate": "tau=%{x:.3f}<br>%{y:.1%}<extra>%{fullData.name}</extra>",
                })
            })
            .collect()
    }

    fn layout(&self) -> JsonValue {
        let x_end = x_limit(&self.data, &self.options);
        let x_axis = if self.options.semilog {
            json!({
                "title": {"text": self.options.xlabel},
                "type": "log",
                "range": [0.0, x_end.log10()],
            })
        } else {
            json!({
                "title": {"text": self.options.xlabel},
                "range": [1.0, x_end],
            })
        };
        let white = Rgb(255, 255, 255);
        json!({
            "title": {"text": self.options.title},
            "xaxis": x_axis,
            "yaxis": {
                "title": {"text": self.options.ylabel},
                "range": [0.0, 1.02],
                "tickformat": ".0%",
            },
            "legend": {"x": 1.0, "xanchor": "right", "y": 0.0, "yanchor": "bottom"},
            "plot_bgcolor": self.options.background.unwrap_or(white).to_hex(),
            "paper_bgcolor": self.options.page_background.unwrap_or(white).to_hex(),
        })
    }

    fn render(&self) -> String {
        let traces = script_safe(&JsonValue::Array(self.traces()));
        let layout = script_safe(&self.layout());
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{cdn}"></script>
</head>
<body>
<div id="profile" style="width:900px;height:600px;"></div>
<script>
Plotly.newPlot("profile", {traces}, {layout}, {{"responsive": true}});
</script>
</body>
</html>
"#,
            title = escape_html(&self.options.title),
            cdn = PLOTLY_CDN,
            traces = traces,
            layout = layout,
        )
    }
}

impl Profiler for HtmlProfiler {
    fn data(&self) -> &ProfileData {
        &self.data
    }

    fn options(&self) -> &ProfilerOptions {
        &self.options
    }

    fn output(&self) -> Option<&Path> {
        Some(&self.output)
    }

    fn plot(&self) -> Result<()> {
        self.data.ensure_plottable()?;
        check_output(&self.output, self.options.force)?;
        fs::write(&self.output, self.render())
            .with_context(|| format!("failed to write {}", self.output.display()))?;
        info!("wrote {}", self.output.display());
        Ok(())
    }
}

/// JSON text that cannot close the surrounding `<script>` element.
fn script_safe(value: &JsonValue) -> String {
    value.to_string().replace("</", "<\\/")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

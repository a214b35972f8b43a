//! Chart projections of the stored result.
//!
//! Both charts are re-rendered as a whole whenever data or palette change.
//! A theme change only swaps colors; the data arrays are left alone.

use crate::model::{format_count, AnalysisResult};
use crate::result_store::ResultView;
use crate::theme::{Palette, Rgb};

pub const AGGREGATE_LABELS: [&str; 2] = ["Benign", "Attacks"];
pub const AGGREGATE_TITLE: &str = "THREAT ANALYSIS";

/// Benign-vs-attack doughnut.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateChart {
    pub data: [u64; 2],
    pub slice_colors: [Rgb; 2],
    pub legend_color: Rgb,
    pub title_color: Rgb,
    pub renders: u64,
}

impl AggregateChart {
    fn new(palette: &Palette) -> Self {
        AggregateChart {
            data: [0, 0],
            slice_colors: [palette.benign, palette.attack],
            legend_color: palette.legend,
            title_color: palette.title,
            renders: 0,
        }
    }

    fn apply_palette(&mut self, palette: &Palette) {
        self.slice_colors = [palette.benign, palette.attack];
        self.legend_color = palette.legend;
        self.title_color = palette.title;
    }

    pub fn total(&self) -> u64 {
        self.data[0] + self.data[1]
    }

    /// Share of each slice in `[0, 1]`; both zero when there is no data.
    pub fn fractions(&self) -> [f32; 2] {
        let total = self.total();
        if total == 0 {
            return [0.0, 0.0];
        }
        [
            self.data[0] as f32 / total as f32,
            self.data[1] as f32 / total as f32,
        ]
    }
}

/// Feature-importance bars.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportanceChart {
    /// Identifies the chart instance. A new instance replaces the old one
    /// whenever the label set changes.
    pub instance: u64,
    pub labels: Vec<String>,
    /// Importance as a percentage, rounded to two decimal places
    pub values: Vec<f64>,
    pub bar_color: Rgb,
    pub grid_color: Rgb,
    pub renders: u64,
}

/// `0.123456` -> `12.35`
pub fn to_percent(value: f64) -> f64 {
    (value * 100.0 * 100.0).round() / 100.0
}

/// Numeric summary shown beside the aggregate chart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readout {
    pub total: String,
    pub benign: String,
    pub threats: String,
    pub threat_percentage: String,
}

/// Owns both chart projections and the palette they are drawn with.
#[derive(Debug, Clone)]
pub struct ChartBinding {
    aggregate: AggregateChart,
    importance: Option<ImportanceChart>,
    palette: Palette,
    has_data: bool,
    next_instance: u64,
}

impl ChartBinding {
    pub fn new(palette: Palette) -> Self {
        ChartBinding {
            aggregate: AggregateChart::new(&palette),
            importance: None,
            palette,
            has_data: false,
            next_instance: 1,
        }
    }

    pub fn aggregate(&self) -> &AggregateChart {
        &self.aggregate
    }

    /// `None` while the current result carries no importance data.
    pub fn importance(&self) -> Option<&ImportanceChart> {
        self.importance.as_ref()
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// `false` until the first result arrives; the view shows a placeholder.
    pub fn has_data(&self) -> bool {
        self.has_data
    }

    /// Swap colors on both charts and re-render.
    pub fn restyle(&mut self, palette: Palette) {
        self.palette = palette;
        self.aggregate.apply_palette(&palette);
        self.aggregate.renders += 1;
        if let Some(chart) = &mut self.importance {
            chart.bar_color = palette.bar;
            chart.grid_color = palette.grid;
            chart.renders += 1;
        }
    }

    pub fn readout(&self) -> Readout {
        let [benign, attack] = self.aggregate.data;
        let total = self.aggregate.total();
        let pct = if total == 0 {
            0.0
        } else {
            attack as f64 / total as f64 * 100.0
        };
        Readout {
            total: format_count(total),
            benign: format_count(benign),
            threats: format_count(attack),
            threat_percentage: format!("{:.2}%", pct),
        }
    }

    fn render_importance(&mut self, importances: &[(String, f64)]) {
        if importances.is_empty() {
            if let Some(old) = self.importance.take() {
                log::debug!("Hiding feature importance chart #{}", old.instance);
            }
            return;
        }

        let labels: Vec<String> = importances.iter().map(|(name, _)| name.clone()).collect();
        let values: Vec<f64> = importances.iter().map(|(_, v)| to_percent(*v)).collect();

        match &mut self.importance {
            Some(chart) if chart.labels == labels => {
                chart.values = values;
                chart.renders += 1;
            }
            _ => {
                if let Some(old) = self.importance.take() {
                    log::debug!("Tearing down feature importance chart #{}", old.instance);
                }
                let instance = self.next_instance;
                self.next_instance += 1;
                self.importance = Some(ImportanceChart {
                    instance,
                    labels,
                    values,
                    bar_color: self.palette.bar,
                    grid_color: self.palette.grid,
                    renders: 1,
                });
            }
        }
    }
}

impl ResultView for ChartBinding {
    fn on_publish(&mut self, result: &AnalysisResult) {
        self.has_data = true;
        self.aggregate.data = [result.benign_count, result.attack_count];
        self.aggregate.renders += 1;
        self.render_importance(&result.feature_importances);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::ThemeName;

    fn result(benign: u64, attack: u64, importances: &[(&str, f64)]) -> AnalysisResult {
        AnalysisResult {
            total_flows: benign + attack,
            benign_count: benign,
            attack_count: attack,
            feature_importances: importances.iter().map(|(n, v)| (n.to_string(), *v)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_to_percent() {
        assert_eq!(to_percent(0.123456), 12.35);
        assert_eq!(to_percent(0.5), 50.0);
        assert_eq!(to_percent(0.0), 0.0);
    }

    #[test]
    fn test_aggregate_data_and_readout() {
        let mut charts = ChartBinding::new(ThemeName::Neon.palette());
        assert!(!charts.has_data());
        charts.on_publish(&result(90, 10, &[]));
        assert_eq!(charts.aggregate().data, [90, 10]);
        assert_eq!(charts.aggregate().total(), 100);
        let r = charts.readout();
        assert_eq!(r.total, "100");
        assert_eq!(r.threat_percentage, "10.00%");
        assert!(charts.importance().is_none());
    }

    #[test]
    fn test_zero_flows_readout() {
        let mut charts = ChartBinding::new(ThemeName::Neon.palette());
        charts.on_publish(&result(0, 0, &[]));
        assert_eq!(charts.readout().threat_percentage, "0.00%");
        assert_eq!(charts.aggregate().fractions(), [0.0, 0.0]);
    }

    #[test]
    fn test_importance_keeps_server_order() {
        let mut charts = ChartBinding::new(ThemeName::Neon.palette());
        charts.on_publish(&result(1, 1, &[("Flow IAT Std", 0.1), ("Destination Port", 0.7)]));
        let chart = charts.importance().unwrap();
        assert_eq!(chart.labels, vec!["Flow IAT Std", "Destination Port"]);
        assert_eq!(chart.values, vec![10.0, 70.0]);
    }

    #[test]
    fn test_importance_instance_lifecycle() {
        let mut charts = ChartBinding::new(ThemeName::Neon.palette());
        charts.on_publish(&result(1, 1, &[("Flow IAT Std", 0.1)]));
        let first = charts.importance().unwrap().instance;

        charts.on_publish(&result(1, 1, &[("Flow IAT Std", 0.2)]));
        let chart = charts.importance().unwrap();
        assert_eq!(chart.instance, first);
        assert_eq!(chart.values, vec![20.0]);
        assert_eq!(chart.renders, 2);

        charts.on_publish(&result(1, 1, &[("Destination Port", 0.2)]));
        assert_ne!(charts.importance().unwrap().instance, first);

        charts.on_publish(&result(1, 1, &[]));
        assert!(charts.importance().is_none());
    }

    #[test]
    fn test_restyle_without_data() {
        let mut charts = ChartBinding::new(ThemeName::Neon.palette());
        charts.restyle(ThemeName::Magenta.palette());
        assert_eq!(charts.aggregate().data, [0, 0]);
        assert_eq!(charts.aggregate().slice_colors[0], ThemeName::Magenta.palette().benign);
        assert_eq!(charts.readout().threat_percentage, "0.00%");
    }

    #[test]
    fn test_restyle_keeps_data() {
        let mut charts = ChartBinding::new(ThemeName::Neon.palette());
        charts.on_publish(&result(3, 2, &[("Flow IAT Std", 0.4)]));
        let before = charts.importance().unwrap().clone();
        charts.restyle(ThemeName::Magenta.palette());
        let after = charts.importance().unwrap();
        assert_eq!(after.values, before.values);
        assert_eq!(after.instance, before.instance);
        assert_eq!(after.bar_color, ThemeName::Magenta.palette().bar);
        assert_eq!(charts.aggregate().data, [3, 2]);
    }
}

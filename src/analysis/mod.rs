//! Experiment analysis results
//!
//! The vibration analysis itself runs on the bridge server. This module
//! models what comes back: aggregate statistics per metric, a risk
//! classification, the resonance flag and a rendered plot. Field names on
//! the wire are those of the server; the Rust names are descriptive.

use serde::{Deserialize, Serialize};

/// Mean crest factor above which the server flags resonance
pub const RESONANCE_CREST_THRESHOLD: f64 = 3.0;

/// Lower bound for the RMS minimum when computing the amplification ratio
pub const AMPLIFICATION_FLOOR: f64 = 0.0001;

/// Aggregate statistics of one metric over the captured samples
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricStats {
    #[serde(rename = "media")]
    pub mean: f64,
    pub max: f64,
    pub min: f64,
    /// Not reported for every metric
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
}

impl MetricStats {
    /// Population statistics of `values`; `None` when empty
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let values: Vec<f64> = values.into_iter().collect();
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean,
            max: values.iter().copied().fold(f64::MIN, f64::max),
            min: values.iter().copied().fold(f64::MAX, f64::min),
            std: Some(variance.sqrt()),
        })
    }
}

/// Statistics block of an analysis result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisStatistics {
    #[serde(rename = "RMS")]
    pub rms: MetricStats,
    #[serde(rename = "Amplitud_Maxima")]
    pub peak: MetricStats,
    #[serde(rename = "Factor_Cresta")]
    pub crest: MetricStats,
    #[serde(rename = "Desviacion_Estandar", default)]
    pub deviation: Option<MetricStats>,
}

/// Severity class of a risk assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskSeverity {
    Success,
    Warning,
    Danger,
    #[default]
    #[serde(other)]
    Unknown,
}

impl RiskSeverity {
    /// RGB colour used for the risk banner
    pub fn rgb(&self) -> [u8; 3] {
        match self {
            RiskSeverity::Success => [0x27, 0xae, 0x60],
            RiskSeverity::Warning => [0xf3, 0x9c, 0x12],
            RiskSeverity::Danger => [0xe7, 0x4c, 0x3c],
            RiskSeverity::Unknown => [0x7f, 0x8c, 0x8d],
        }
    }
}

/// Risk classification of the measured vibration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskAssessment {
    #[serde(rename = "nivel")]
    pub level: String,
    #[serde(rename = "color", default)]
    pub severity: RiskSeverity,
    #[serde(rename = "descripcion", default)]
    pub description: String,
    /// Peak amplitude exceeded the additional-warning threshold
    #[serde(rename = "advertencia_adicional", default)]
    pub extra_warning: bool,
    #[serde(rename = "impacto_salud", default)]
    pub health_impact: Option<String>,
    #[serde(rename = "impacto_social", default)]
    pub social_impact: Option<String>,
    #[serde(rename = "recomendacion", default)]
    pub recommendation: Option<String>,
}

/// Result of one experiment analysis
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(rename = "estadisticas")]
    pub statistics: AnalysisStatistics,
    #[serde(rename = "riesgo")]
    pub risk: RiskAssessment,
    #[serde(rename = "en_resonancia", default)]
    pub resonance: bool,
    #[serde(rename = "num_muestras", default)]
    pub sample_count: usize,
    /// PNG plot rendered by the server, base64 encoded
    #[serde(rename = "imagen_grafica", default)]
    pub plot_png_base64: Option<String>,
}

impl AnalysisReport {
    /// Ratio between the largest and smallest RMS value
    pub fn amplification(&self) -> f64 {
        self.statistics.rms.max / self.statistics.rms.min.max(AMPLIFICATION_FLOOR)
    }

    pub fn amplification_text(&self) -> String {
        format!("{:.1}x", self.amplification())
    }

    /// Banner text shown when resonance was detected
    pub fn resonance_text(&self) -> Option<String> {
        self.resonance.then(|| {
            format!(
                "RESONANCE DETECTED: high crest factor ({:.2})",
                self.statistics.crest.mean
            )
        })
    }

    pub fn has_plot(&self) -> bool {
        self.plot_png_base64
            .as_deref()
            .is_some_and(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVER_RESPONSE: &str = r#"{
        "estadisticas": {
            "RMS": {"media": 0.06, "max": 0.12, "min": 0.02, "std": 0.01},
            "Amplitud_Maxima": {"media": 0.2, "max": 0.4, "min": 0.1, "std": 0.05},
            "Factor_Cresta": {"media": 3.4, "max": 4.0, "min": 2.1, "std": 0.3},
            "Desviacion_Estandar": {"media": 0.01, "max": 0.02, "min": 0.005}
        },
        "riesgo": {
            "nivel": "PRECAUCIÓN",
            "color": "warning",
            "descripcion": "Moderate vibration",
            "advertencia_adicional": true,
            "impacto_salud": "Sleep disruption",
            "impacto_social": "Complaints",
            "recomendacion": "Keep monitoring"
        },
        "en_resonancia": true,
        "num_muestras": 42,
        "imagen_grafica": "iVBORw0KGgo="
    }"#;

    #[test]
    fn test_parse_server_report() {
        let report: AnalysisReport = serde_json::from_str(SERVER_RESPONSE).unwrap();

        assert_eq!(report.statistics.rms.mean, 0.06);
        assert_eq!(report.statistics.peak.max, 0.4);
        assert_eq!(report.statistics.crest.mean, 3.4);
        assert_eq!(report.statistics.deviation.unwrap().std, None);
        assert_eq!(report.risk.level, "PRECAUCIÓN");
        assert_eq!(report.risk.severity, RiskSeverity::Warning);
        assert!(report.risk.extra_warning);
        assert!(report.resonance);
        assert_eq!(report.sample_count, 42);
        assert!(report.has_plot());
    }

    #[test]
    fn test_unknown_severity() {
        let risk: RiskAssessment =
            serde_json::from_str(r#"{"nivel": "X", "color": "info"}"#).unwrap();
        assert_eq!(risk.severity, RiskSeverity::Unknown);
        assert!(risk.description.is_empty());
    }

    #[test]
    fn test_amplification() {
        let mut report = AnalysisReport::default();
        report.statistics.rms.max = 0.12;
        report.statistics.rms.min = 0.02;
        assert!((report.amplification() - 6.0).abs() < 1e-9);
        assert_eq!(report.amplification_text(), "6.0x");

        // A zero minimum is floored instead of dividing by zero
        report.statistics.rms.min = 0.0;
        assert!((report.amplification() - 1200.0).abs() < 1e-6);
    }

    #[test]
    fn test_resonance_text() {
        let mut report: AnalysisReport = serde_json::from_str(SERVER_RESPONSE).unwrap();
        assert_eq!(
            report.resonance_text().as_deref(),
            Some("RESONANCE DETECTED: high crest factor (3.40)")
        );

        report.resonance = false;
        assert!(report.resonance_text().is_none());
    }

    #[test]
    fn test_metric_stats_from_values() {
        assert!(MetricStats::from_values(Vec::new()).is_none());

        let stats = MetricStats::from_values([1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.min, 1.0);
        assert!((stats.std.unwrap() - 1.118_033_988_7).abs() < 1e-9);
    }
}

//! Test data builders for samples and bridge payloads

use serde_json::{json, Value};
use vibmon_rs::types::Sample;

/// Builder for creating test Samples
pub struct SampleBuilder {
    rms: f64,
    max: f64,
    crest: f64,
}

impl SampleBuilder {
    pub fn new() -> Self {
        Self {
            rms: 0.05,
            max: 0.09,
            crest: 1.8,
        }
    }

    pub fn rms(mut self, rms: f64) -> Self {
        self.rms = rms;
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = max;
        self
    }

    pub fn crest(mut self, crest: f64) -> Self {
        self.crest = crest;
        self
    }

    pub fn build(self) -> Sample {
        Sample::new(self.rms, self.max, self.crest)
    }

    /// Stream payload for this sample
    pub fn payload(self) -> String {
        json!({"rms": self.rms, "max": self.max, "crest": self.crest}).to_string()
    }
}

impl Default for SampleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Heartbeat event payload
pub fn heartbeat() -> String {
    json!({"heartbeat": true}).to_string()
}

/// Successful port listing
pub fn port_list(ports: &[(&str, &str)]) -> Value {
    let puertos: Vec<Value> = ports
        .iter()
        .map(|(port, description)| json!({"puerto": port, "descripcion": description}))
        .collect();
    json!({"success": true, "puertos": puertos})
}

/// Failed envelope with a service message
pub fn failure(message: &str) -> Value {
    json!({"success": false, "error": message})
}

/// Analysis response as produced by the server
pub fn analysis_response(mean_rms: f64, crest_mean: f64, samples: usize) -> Value {
    json!({
        "success": true,
        "estadisticas": {
            "RMS": {"media": mean_rms, "max": mean_rms * 1.5, "min": mean_rms * 0.5},
            "Amplitud_Maxima": {"media": mean_rms * 1.8, "max": mean_rms * 2.5, "min": mean_rms},
            "Factor_Cresta": {"media": crest_mean, "max": crest_mean + 0.4, "min": crest_mean - 0.4},
            "Desviacion_Estandar": {"media": 0.01, "max": 0.02, "min": 0.005}
        },
        "riesgo": {
            "nivel": "ACEPTABLE",
            "color": "success",
            "descripcion": "Vibraciones dentro de rangos aceptables",
            "advertencia_adicional": false
        },
        "en_resonancia": crest_mean > 3.0,
        "num_muestras": samples,
        "imagen_grafica": "iVBORw0KGgo="
    })
}

use crate::extremes::Extremes;
use crate::Result;

pub trait TelemetrySink {
    fn push(&mut self, topic: &str, payload: &str) -> Result<()>;
}

/// Pushes changed cell voltage extremes. Delivery is best effort.
#[derive(Debug)]
pub struct Telemetry<T> {
    sink: T,
    base_topic: String,
    last: Option<(f64, f64)>,
}

impl<T: TelemetrySink> Telemetry<T> {
    pub fn new(sink: T, base_topic: &str) -> Self {
        Self {
            sink,
            base_topic: base_topic.trim_end_matches('/').to_string(),
            last: None,
        }
    }

    pub fn sink(&self) -> &T {
        &self.sink
    }

    pub fn update(&mut self, extremes: &Extremes) {
        let (Some(v_min), Some(v_max)) = (extremes.v_min, extremes.v_max) else {
            return;
        };
        if self.last == Some((v_min, v_max)) {
            return;
        }
        self.last = Some((v_min, v_max));
        let _ = self
            .sink
            .push(&format!("{}/cell/voltage/min", self.base_topic), &v_min.to_string());
        let _ = self
            .sink
            .push(&format!("{}/cell/voltage/max", self.base_topic), &v_max.to_string());
    }
}

/// Fixed-window moving average over raw sensor counts.
///
/// The average is only reported once the window has been filled end to end,
/// so a cold buffer padded with zeros never skews the first readings.
#[derive(Debug, Clone)]
pub struct SignalSmoother {
    readings: Vec<f64>,
    index: usize,
    sum: f64,
    filled: bool,
}

impl SignalSmoother {
    /// Create a smoother over `window` readings. Returns `None` for an empty window.
    pub fn new(window: usize) -> Option<Self> {
        if window == 0 {
            return None;
        }
        Some(Self {
            readings: vec![0.0; window],
            index: 0,
            sum: 0.0,
            filled: false,
        })
    }

    /// Push a raw value and return the average if the window is full.
    pub fn push(&mut self, raw: f64) -> Option<f64> {
        self.sum -= self.readings[self.index];
        self.readings[self.index] = raw;
        self.sum += raw;

        self.index += 1;
        if self.index >= self.readings.len() {
            self.index = 0;
            self.filled = true;
        }

        self.average()
    }

    pub fn average(&self) -> Option<f64> {
        self.filled.then(|| self.sum / self.readings.len() as f64)
    }

}

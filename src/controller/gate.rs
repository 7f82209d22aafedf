use chrono::{DateTime, Timelike, TimeZone};

use crate::config::MonitorConfig;

/// Local time-of-day range `[start_hour, end_hour)` in which sampling is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionWindow {
    start_hour: u32,
    end_hour: u32,
}

impl AdmissionWindow {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u32 {
        self.end_hour
    }

    pub fn admits<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        let hour = now.hour();
        hour >= self.start_hour && hour < self.end_hour
    }
}

impl Default for AdmissionWindow {
    fn default() -> Self {
        Self::new(6, 21)
    }
}

impl From<&MonitorConfig> for AdmissionWindow {
    fn from(cfg: &MonitorConfig) -> Self {
        Self::new(cfg.window_start_hour, cfg.window_end_hour)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use rstest::rstest;

    fn at_hour(hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 9, hour, 30, 0)
            .unwrap()
    }

    #[rstest]
    #[case(0, false)]
    #[case(5, false)]
    #[case(6, true)]
    #[case(12, true)]
    #[case(20, true)]
    #[case(21, false)]
    #[case(22, false)]
    fn test_default_window(#[case] hour: u32, #[case] admitted: bool) {
        assert_eq!(AdmissionWindow::default().admits(&at_hour(hour)), admitted);
    }
}

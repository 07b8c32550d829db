/// Tracks how long containment has held without interruption.
///
/// Losing containment clears the anchor, so the clock restarts from zero
/// rather than pausing.
#[derive(Debug, Default, Clone)]
pub struct DwellTimer {
    anchor_ms: Option<i64>,
}

impl DwellTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one observation and return the elapsed dwell in milliseconds.
    ///
    /// A timestamp earlier than the anchor reports zero elapsed.
    pub fn tick(&mut self, now_ms: i64, contained: bool) -> u64 {
        if !contained {
            self.anchor_ms = None;
            return 0;
        }
        match self.anchor_ms {
            None => {
                self.anchor_ms = Some(now_ms);
                0
            }
            Some(anchor) => u64::try_from(now_ms.saturating_sub(anchor)).unwrap_or(0),
        }
    }

    pub fn reset(&mut self) {
        self.anchor_ms = None;
    }

    pub fn anchor_ms(&self) -> Option<i64> {
        self.anchor_ms
    }
}

//! Dead-band gate deciding whether the zoom loop acts.

/// Opens when the relative error exceeds `trigger`, closes only once it
/// falls below `stop`.
#[derive(Debug, Clone)]
pub struct HysteresisGate {
    trigger: f64,
    stop: f64,
    open: bool,
}

impl HysteresisGate {
    pub fn new(trigger: f64, stop: f64) -> Self {
        Self {
            trigger,
            stop,
            open: false,
        }
    }

    /// Feed the current relative error; returns whether the gate is open.
    pub fn update(&mut self, relative_error: f64) -> bool {
        if self.open {
            if relative_error < self.stop {
                self.open = false;
            }
        } else if relative_error > self.trigger {
            self.open = true;
        }
        self.open
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn reset(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_above_trigger_only() {
        let mut gate = HysteresisGate::new(0.15, 0.05);
        assert!(!gate.update(0.10));
        assert!(!gate.update(0.15));
        assert!(gate.update(0.16));
    }

    #[test]
    fn test_no_chatter_around_trigger() {
        let mut gate = HysteresisGate::new(0.15, 0.05);
        let eps = 0.01;
        assert!(gate.update(0.15 + eps));
        for i in 0..100 {
            let err = if i % 2 == 0 { 0.15 - eps } else { 0.15 + eps };
            assert!(gate.update(err), "gate closed at iteration {i}");
        }
    }

    #[test]
    fn test_closes_below_stop() {
        let mut gate = HysteresisGate::new(0.15, 0.05);
        gate.update(0.5);
        assert!(gate.update(0.05));
        assert!(!gate.update(0.049));
        assert!(!gate.update(0.1));
    }
}

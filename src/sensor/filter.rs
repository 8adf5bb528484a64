// Moving average over the last `window` altitude readings
use std::collections::VecDeque;

pub struct AltitudeFilter {
    window: usize,
    buf: VecDeque<f32>,
    sum: f32,
}

impl AltitudeFilter {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            buf: VecDeque::with_capacity(window),
            sum: 0.0,
        }
    }

    pub fn push(&mut self, altitude: f32) -> f32 {
        self.buf.push_back(altitude);
        self.sum += altitude;
        if self.buf.len() > self.window {
            if let Some(old) = self.buf.pop_front() {
                self.sum -= old;
            }
        }
        self.sum / self.buf.len() as f32
    }

    pub fn is_primed(&self) -> bool {
        self.buf.len() == self.window
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.sum = 0.0;
    }
}

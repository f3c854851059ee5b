/// One-way completion signal. Fractions are clamped to `0.0..=1.0` and
/// delivered synchronously on the calling thread.
pub struct Progress<'a> {
    sink: Option<&'a mut dyn FnMut(f32)>,
}

impl<'a> Progress<'a> {
    pub fn new(sink: &'a mut dyn FnMut(f32)) -> Self {
        Self { sink: Some(sink) }
    }

    pub fn none() -> Self {
        Self { sink: None }
    }

    #[inline]
    pub fn report(&mut self, fraction: f32) {
        if let Some(sink) = self.sink.as_mut() {
            sink(fraction.clamp(0.0, 1.0));
        }
    }

    /// Reports `done / total`, ignoring an empty total.
    #[inline]
    pub fn step(&mut self, done: usize, total: usize) {
        if total > 0 {
            self.report(done as f32 / total as f32);
        }
    }
}

impl Default for Progress<'_> {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::Progress;

    #[test]
    fn clamps_and_forwards() {
        let mut seen = Vec::new();
        let mut sink = |f: f32| seen.push(f);
        let mut progress = Progress::new(&mut sink);
        progress.report(-1.0);
        progress.step(1, 4);
        progress.step(3, 0);
        progress.report(2.0);
        drop(progress);
        assert_eq!(seen, vec![0.0, 0.25, 1.0]);
    }
}

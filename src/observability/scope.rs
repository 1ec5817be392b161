//! Timed phases
//!
//! A phase logs `{PHASE}_BEGIN` when it starts and exactly one closing
//! event: `{PHASE}_COMPLETE` or `{PHASE}_FAILED`, each carrying the elapsed
//! time, or `{PHASE}_ABANDONED` if it is dropped unfinished.

use std::time::Instant;

use super::logger::Logger;

/// Wall-clock timer reporting whole milliseconds
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed milliseconds, formatted for a log field
    pub fn elapsed_ms(&self) -> String {
        self.start.elapsed().as_millis().to_string()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// A logged, timed evaluation phase
///
/// ```ignore
/// let scope = ObservationScope::new("COMPILE");
/// match compile() {
///     Ok(t) => { scope.complete(); t }
///     Err(e) => { scope.fail(e.message()); return Err(e) }
/// }
/// ```
pub struct ObservationScope {
    phase: &'static str,
    timer: Timer,
    finished: bool,
}

impl ObservationScope {
    pub fn new(phase: &'static str) -> Self {
        Logger::info(&format!("{}_BEGIN", phase), &[]);
        Self {
            phase,
            timer: Timer::new(),
            finished: false,
        }
    }

    pub fn phase(&self) -> &'static str {
        self.phase
    }

    pub fn complete(mut self) {
        self.finished = true;
        Logger::info(
            &format!("{}_COMPLETE", self.phase),
            &[("duration_ms", &self.timer.elapsed_ms())],
        );
    }

    pub fn fail(mut self, reason: &str) {
        self.finished = true;
        Logger::error(
            &format!("{}_FAILED", self.phase),
            &[("duration_ms", &self.timer.elapsed_ms()), ("reason", reason)],
        );
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.finished {
            Logger::warn(
                &format!("{}_ABANDONED", self.phase),
                &[("duration_ms", &self.timer.elapsed_ms())],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_lifecycle() {
        let scope = ObservationScope::new("COMPILE");
        assert_eq!(scope.phase(), "COMPILE");
        scope.complete();

        ObservationScope::new("COMPILE").fail("unknown type");
        drop(ObservationScope::new("COMPILE"));
    }

    #[test]
    fn test_timer() {
        let timer = Timer::new();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let ms: u64 = timer.elapsed_ms().parse().unwrap();
        assert!(ms >= 10);
    }
}

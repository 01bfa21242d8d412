// Path: crates/telemetry/src/time.rs
use crate::sinks::SchedulerMetricsSink;
use tokio::time::Instant;

/// Times one scheduler iteration and reports its outcome label together with
/// its duration. An iteration cancelled before it finishes reports nothing.
///
/// Durations come from the tokio clock, so paused-time tests see virtual time.
pub struct TickTimer<'a> {
    sink: &'a dyn SchedulerMetricsSink,
    started: Instant,
}

impl<'a> TickTimer<'a> {
    /// Starts timing an iteration.
    pub fn start(sink: &'a dyn SchedulerMetricsSink) -> Self {
        Self {
            sink,
            started: Instant::now(),
        }
    }

    /// Records the iteration as finished with `outcome`.
    pub fn finish(self, outcome: &'static str) {
        self.sink
            .observe_tick_duration(self.started.elapsed().as_secs_f64());
        self.sink.inc_tick_outcome(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct Recorded {
        ticks: Mutex<Vec<(&'static str, f64)>>,
        durations: Mutex<Vec<f64>>,
    }

    impl SchedulerMetricsSink for Recorded {
        fn observe_tick_duration(&self, duration_secs: f64) {
            self.durations.lock().unwrap().push(duration_secs);
        }
        fn inc_tick_outcome(&self, outcome: &'static str) {
            let last = self.durations.lock().unwrap().last().copied().unwrap_or(-1.0);
            self.ticks.lock().unwrap().push((outcome, last));
        }
        fn inc_installs(&self, _result: &'static str) {}
        fn inc_self_removals(&self) {}
    }

    #[tokio::test(start_paused = true)]
    async fn finished_ticks_report_duration_and_outcome() {
        let sink = Recorded::default();

        let timer = TickTimer::start(&sink);
        tokio::time::advance(Duration::from_secs(3)).await;
        timer.finish("installed");

        let dropped = TickTimer::start(&sink);
        drop(dropped);

        assert_eq!(*sink.ticks.lock().unwrap(), vec![("installed", 3.0)]);
        assert_eq!(sink.durations.lock().unwrap().len(), 1);
    }
}

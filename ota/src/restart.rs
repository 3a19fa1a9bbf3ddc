use std::time::Duration;

/// Schedules a one-shot device restart.
///
/// `schedule` must not block; the restart fires later, after the caller has
/// had a chance to finish its response.
pub trait Restart {
    fn schedule(&mut self, delay: Duration);
}

impl<R: Restart + ?Sized> Restart for Box<R> {
    fn schedule(&mut self, delay: Duration) {
        (**self).schedule(delay)
    }
}

/// A [`Restart`] that only records the delays it was asked for.
#[derive(Debug, Default)]
pub struct RecordingRestart {
    scheduled: Vec<Duration>,
}

impl RecordingRestart {
    pub fn scheduled(&self) -> &[Duration] {
        &self.scheduled
    }
}

impl Restart for RecordingRestart {
    fn schedule(&mut self, delay: Duration) {
        tracing::debug!(?delay, "restart recorded");
        self.scheduled.push(delay);
    }
}

use std::collections::HashMap;
use std::io::Write;

use serde_derive::Serialize;

use crate::arbiter::{Arbiter, Decision, Regime};
use crate::detection::parse_records;
use crate::detector::Detector;
use crate::error::Error;
use crate::sink::{ActuatorSink, SinkStatus};
use crate::source::FrameSource;
use crate::steering::Command;
use crate::tracker::Tracker;

/// Passive consumer of every frame's outcome (display, recording).
pub trait DecisionObserver {
    fn observe(&mut self, index: u64, decision: &Decision, command: &Command)
        -> Result<(), Error>;

    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

impl<O: DecisionObserver + ?Sized> DecisionObserver for &mut O {
    fn observe(
        &mut self,
        index: u64,
        decision: &Decision,
        command: &Command,
    ) -> Result<(), Error> {
        (**self).observe(index, decision, command)
    }

    fn flush(&mut self) -> Result<(), Error> {
        (**self).flush()
    }
}

impl DecisionObserver for () {
    fn observe(&mut self, _: u64, _: &Decision, _: &Command) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Serialize)]
struct DecisionRecord<'a> {
    frame: u64,
    decision: &'a Decision,
    command: &'a Command,
}

/// Writes one JSON line per frame.
pub struct DecisionLog<W: Write> {
    out: W,
}

impl<W: Write> DecisionLog<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> DecisionObserver for DecisionLog<W> {
    fn observe(
        &mut self,
        index: u64,
        decision: &Decision,
        command: &Command,
    ) -> Result<(), Error> {
        let record = DecisionRecord {
            frame: index,
            decision,
            command,
        };
        serde_json::to_writer(&mut self.out, &record)?;
        writeln!(self.out)?;

        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        Ok(self.out.flush()?)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub frames: u64,
    pub regimes: HashMap<Regime, u64>,
    pub reinitializations: u64,
    pub sink_failures: u64,
    pub observer_failures: u64,
}

impl SessionStats {
    #[inline]
    pub fn count(&self, regime: Regime) -> u64 {
        self.regimes.get(&regime).copied().unwrap_or(0)
    }
}

/// Frame loop: one source, one tracker lifetime.
///
/// Frames are handled strictly one after another; detection runs before the
/// tracker since the re-initialization decision depends on it.
pub struct Session<T: Tracker> {
    arbiter: Arbiter<T>,
}

impl<T: Tracker> Session<T> {
    pub fn new(arbiter: Arbiter<T>) -> Self {
        Self { arbiter }
    }

    #[inline]
    pub fn arbiter(&self) -> &Arbiter<T> {
        &self.arbiter
    }

    pub fn into_arbiter(self) -> Arbiter<T> {
        self.arbiter
    }

    /// Runs until the source is exhausted or a collaborator breaks its contract.
    pub fn run<S, D, A, O>(
        &mut self,
        mut source: S,
        mut detector: D,
        mut sink: A,
        mut observer: O,
    ) -> Result<SessionStats, Error>
    where
        S: FrameSource,
        D: Detector,
        A: ActuatorSink,
        O: DecisionObserver,
    {
        self.arbiter.begin_session();

        let mut stats = SessionStats::default();
        let mut dims = None;

        log::info!("session started");

        while let Some(frame) = source.next_frame()? {
            frame.ensure_not_empty()?;

            match dims {
                None => dims = Some(frame.dims),
                Some(expected) if expected != frame.dims => {
                    return Err(Error::FrameSizeChanged {
                        index: frame.index,
                        expected,
                        found: frame.dims,
                    });
                }
                Some(_) => {}
            }

            let records = detector.detect(&frame)?;
            let dets = parse_records(&records, frame.dims)?;
            let (decision, command) = self.arbiter.arbitrate_frame(&frame, &dets)?;

            match sink.send(&command) {
                Ok(SinkStatus::Accepted) => {}
                Ok(SinkStatus::Dropped) => {
                    log::debug!("frame {}: command dropped by sink", frame.index)
                }
                Err(err) => {
                    log::warn!("frame {}: actuator sink failed: {}", frame.index, err);
                    stats.sink_failures += 1;
                }
            }

            if let Err(err) = observer.observe(frame.index, &decision, &command) {
                log::warn!("frame {}: decision observer failed: {}", frame.index, err);
                stats.observer_failures += 1;
            }

            stats.frames += 1;
            *stats.regimes.entry(decision.regime).or_default() += 1;
            if decision.reinitialized {
                stats.reinitializations += 1;
            }
        }

        log::info!(
            "session finished: {} frames, {} re-initializations, {} sink failures, {} observer failures",
            stats.frames,
            stats.reinitializations,
            stats.sink_failures,
            stats.observer_failures
        );

        Ok(stats)
    }

    /// Runs one fresh session per `(source, detector)` input, sharing the sink and
    /// observer. The tracker never carries a target from one input into the next.
    ///
    /// Stops at the first input that fails.
    pub fn run_all<I, S, D, A, O>(
        &mut self,
        inputs: I,
        mut sink: A,
        mut observer: O,
    ) -> Result<Vec<SessionStats>, Error>
    where
        I: IntoIterator<Item = (S, D)>,
        S: FrameSource,
        D: Detector,
        A: ActuatorSink,
        O: DecisionObserver,
    {
        let mut all = Vec::new();

        for (n, (source, detector)) in inputs.into_iter().enumerate() {
            log::info!("input #{}", n);
            all.push(self.run(source, detector, &mut sink, &mut observer)?);
        }

        Ok(all)
    }
}

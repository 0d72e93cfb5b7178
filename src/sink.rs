use std::io::Write;

use crate::error::Error;
use crate::steering::Command;

/// Acknowledgement from an actuator sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    Accepted,
    Dropped,
}

/// Actuator collaborator. Sends are fire-and-forget: the session logs a failed
/// send and carries on with the next frame.
pub trait ActuatorSink {
    fn send(&mut self, cmd: &Command) -> Result<SinkStatus, Error>;

    /// Pushes out anything buffered. Called once the caller is done sending.
    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

impl<S: ActuatorSink + ?Sized> ActuatorSink for &mut S {
    fn send(&mut self, cmd: &Command) -> Result<SinkStatus, Error> {
        (**self).send(cmd)
    }

    fn flush(&mut self) -> Result<(), Error> {
        (**self).flush()
    }
}

/// Logs every command.
#[derive(Debug, Default)]
pub struct LogSink;

impl ActuatorSink for LogSink {
    fn send(&mut self, cmd: &Command) -> Result<SinkStatus, Error> {
        log::info!(
            "turn={:.3} speed={:.3} sit={} stand={} walk={}",
            cmd.turn,
            cmd.speed,
            cmd.sit,
            cmd.stand,
            cmd.walk
        );

        Ok(SinkStatus::Accepted)
    }
}

/// Writes one JSON object per command.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ActuatorSink for JsonLinesSink<W> {
    fn send(&mut self, cmd: &Command) -> Result<SinkStatus, Error> {
        serde_json::to_writer(&mut self.out, cmd)?;
        writeln!(self.out)?;

        Ok(SinkStatus::Accepted)
    }

    fn flush(&mut self) -> Result<(), Error> {
        Ok(self.out.flush()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_lines_roundtrip() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.send(&Command::halt()).unwrap();
        sink.send(&Command::walk_turning(-0.25)).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let cmds: Vec<Command> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(cmds, vec![Command::halt(), Command::walk_turning(-0.25)]);
    }

    #[test]
    fn flush_reaches_buffered_writer() {
        let mut sink = JsonLinesSink::new(std::io::BufWriter::new(Vec::new()));
        sink.send(&Command::halt()).unwrap();
        assert!(sink.out.get_ref().is_empty());

        sink.flush().unwrap();
        assert_eq!(sink.out.get_ref().iter().filter(|&&b| b == b'\n').count(), 1);
    }
}

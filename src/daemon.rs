use anyhow::{bail, Result};
use canbms_lib::publish::{self, Path, Publisher, StateSink, Value};
use canbms_lib::telemetry::{Telemetry, TelemetrySink};
use canbms_lib::{Controller, Event};
use log::{error, info};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

/// Prints every changed value with its presentation format.
pub struct ConsoleSink;

impl StateSink for ConsoleSink {
    fn write(&mut self, path: Path, value: &Value) -> canbms_lib::Result<()> {
        println!(
            "{} {path} = {}",
            chrono::Local::now().to_rfc3339(),
            path.format(value)
        );
        Ok(())
    }
}

/// Fixed-period tick source for the event loop.
struct Ticker {
    interval: Duration,
    next: Instant,
}

impl Ticker {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now() + interval,
        }
    }

    /// Waits for the next event; a due tick wins over queued frames.
    ///
    /// Periods missed during a stall collapse into a single tick.
    fn next_event(&mut self, events: &Receiver<Event>) -> Result<Event> {
        let now = Instant::now();
        if now >= self.next {
            self.next += self.interval;
            if self.next <= now {
                self.next = now + self.interval;
            }
            return Ok(Event::Tick);
        }
        match events.recv_timeout(self.next - now) {
            Ok(event) => Ok(event),
            Err(RecvTimeoutError::Timeout) => {
                self.next += self.interval;
                Ok(Event::Tick)
            }
            Err(RecvTimeoutError::Disconnected) => bail!("Frame source stopped"),
        }
    }
}

/// Runs a single-threaded loop over frames and ticks until the frame source dies.
pub fn run<S, T>(
    mut controller: Controller,
    events: Receiver<Event>,
    mut publisher: Publisher<S>,
    mut telemetry: Option<Telemetry<T>>,
    interval: Duration,
) -> Result<()>
where
    S: StateSink,
    T: TelemetrySink,
{
    info!(
        "Starting daemon mode: interval={interval:?}, config={:?}",
        controller.config()
    );
    let mut ticker = Ticker::new(interval);

    loop {
        let event = ticker.next_event(&events)?;
        controller.handle(event);

        let entries = publish::snapshot(controller.state(), controller.config());
        if let Err(e) = publisher.publish(&entries) {
            error!("Failed to publish battery state: {e}");
        }
        if let Some(telemetry) = telemetry.as_mut() {
            telemetry.update(&controller.state().extremes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn ticker_prefers_due_tick() {
        let (tx, rx) = mpsc::sync_channel(4);
        let mut ticker = Ticker::new(Duration::ZERO);
        tx.send(Event::Frame {
            id: 0x35c,
            data: vec![0xc0],
        })
        .unwrap();
        assert_eq!(ticker.next_event(&rx).unwrap(), Event::Tick);
    }

    #[test]
    fn ticker_delivers_frames_before_deadline() {
        let (tx, rx) = mpsc::sync_channel(4);
        let mut ticker = Ticker::new(Duration::from_secs(60));
        let frame = Event::Frame {
            id: 0x355,
            data: vec![50, 0, 100, 0],
        };
        tx.send(frame.clone()).unwrap();
        assert_eq!(ticker.next_event(&rx).unwrap(), frame);
    }

    #[test]
    fn stall_yields_one_tick() {
        let (tx, rx) = mpsc::sync_channel(4);
        let interval = Duration::from_secs(60);
        let mut ticker = Ticker::new(interval);
        ticker.next = Instant::now()
            .checked_sub(interval * 5)
            .unwrap_or_else(Instant::now);
        let frame = Event::Frame {
            id: 0x35c,
            data: vec![0xc0],
        };
        tx.send(frame.clone()).unwrap();
        assert_eq!(ticker.next_event(&rx).unwrap(), Event::Tick);
        assert_eq!(ticker.next_event(&rx).unwrap(), frame);
    }

    #[test]
    fn ticker_times_out_into_tick() {
        let (_tx, rx) = mpsc::sync_channel::<Event>(4);
        let mut ticker = Ticker::new(Duration::from_millis(10));
        assert_eq!(ticker.next_event(&rx).unwrap(), Event::Tick);
    }

    #[test]
    fn disconnected_source_stops_loop() {
        let (tx, rx) = mpsc::sync_channel::<Event>(4);
        drop(tx);
        let mut ticker = Ticker::new(Duration::from_secs(60));
        assert!(ticker.next_event(&rx).is_err());
    }
}

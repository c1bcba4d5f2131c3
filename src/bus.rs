//! Linux SocketCAN frame source.
//!
//! The reader runs on its own thread and only forwards frames as [`Event`]s,
//! the battery state itself stays with whoever consumes the channel.

use std::sync::mpsc::SyncSender;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use socketcan::{CanFrame, CanSocket, EmbeddedFrame, Frame, Socket};

use crate::{Event, Result};

/// Pause after a failed read before trying again.
const READ_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Opens `interface` and forwards every received data frame into `events`.
///
/// The thread ends once the receiving side of `events` is dropped.
pub fn spawn_reader(interface: &str, events: SyncSender<Event>) -> Result<JoinHandle<()>> {
    let socket = CanSocket::open(interface)?;
    log::info!("Listening on CAN interface {interface}");

    let handle = thread::Builder::new()
        .name(format!("can-{interface}"))
        .spawn(move || loop {
            match socket.read_frame() {
                Ok(CanFrame::Data(frame)) => {
                    if EmbeddedFrame::is_extended(&frame) {
                        log::trace!("Ignoring extended frame {:#x}", frame.raw_id());
                        continue;
                    }
                    let data = EmbeddedFrame::data(&frame);
                    log::trace!("rx {:#05x} {data:02X?}", frame.raw_id());
                    let event = Event::Frame {
                        id: frame.raw_id(),
                        data: data.to_vec(),
                    };
                    if events.send(event).is_err() {
                        log::debug!("Event loop gone, stopping CAN reader");
                        break;
                    }
                }
                Ok(frame) => log::trace!("Ignoring non-data frame {frame:?}"),
                Err(err) => {
                    log::error!("Cannot read from CAN socket: {err}");
                    thread::sleep(READ_ERROR_BACKOFF);
                }
            }
        })?;
    Ok(handle)
}

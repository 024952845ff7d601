//! Background WebSocket channel
//!
//! One dedicated thread owns the socket. Outgoing commands arrive over an
//! mpsc queue; a short socket read timeout interleaves reads with queue
//! drains so neither side starves. The UI thread polls the incoming
//! receiver once per frame and never blocks.

use super::protocol::{ClientCommand, ServerEvent};
use crate::constants::CHANNEL_POLL_MILLIS;
use std::io::ErrorKind;
use std::sync::mpsc;
use std::time::Duration;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::Message;

/// Lifecycle and traffic notifications from the channel thread.
#[derive(Debug)]
pub enum ChannelEvent {
    Opened,
    Server(ServerEvent),
    Closed,
    Failed(String),
}

/// Handle to an open (or opening) execution channel.
pub struct ExecutionChannel {
    outgoing: mpsc::Sender<ClientCommand>,
    incoming: mpsc::Receiver<ChannelEvent>,
}

impl ExecutionChannel {
    /// Spawn the channel thread and start connecting.
    pub fn connect(url: String) -> Self {
        let (out_tx, out_rx) = mpsc::channel();
        let (in_tx, in_rx) = mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("execution-channel".to_string())
            .spawn(move || run(url, out_rx, in_tx));
        if let Err(err) = spawned {
            log::error!("failed to spawn channel thread: {err}");
        }
        Self {
            outgoing: out_tx,
            incoming: in_rx,
        }
    }

    pub fn send(&self, command: ClientCommand) {
        if self.outgoing.send(command).is_err() {
            log::warn!("command dropped: channel thread is gone");
        }
    }

    pub fn try_recv(&self) -> Option<ChannelEvent> {
        self.incoming.try_recv().ok()
    }
}

fn run(url: String, out_rx: mpsc::Receiver<ClientCommand>, in_tx: mpsc::Sender<ChannelEvent>) {
    let (mut socket, _response) = match tungstenite::connect(url.as_str()) {
        Ok(ok) => ok,
        Err(err) => {
            let _ = in_tx.send(ChannelEvent::Failed(err.to_string()));
            return;
        }
    };
    // short read timeout on either stream flavor so outgoing commands
    // (a pending cancel in particular) are not stuck behind a blocking read
    let timeout = Some(Duration::from_millis(CHANNEL_POLL_MILLIS));
    match socket.get_mut() {
        MaybeTlsStream::Plain(stream) => {
            let _ = stream.set_read_timeout(timeout);
        }
        MaybeTlsStream::NativeTls(stream) => {
            let _ = stream.get_ref().set_read_timeout(timeout);
        }
        _ => {}
    }
    if in_tx.send(ChannelEvent::Opened).is_err() {
        return;
    }
    log::debug!("execution channel open: {url}");

    loop {
        // drain outgoing commands first so a pending cancel is not stuck
        // behind a slow read
        loop {
            match out_rx.try_recv() {
                Ok(command) => {
                    let text = match serde_json::to_string(&command) {
                        Ok(text) => text,
                        Err(err) => {
                            log::error!("unserializable command: {err}");
                            continue;
                        }
                    };
                    if let Err(err) = socket.send(Message::Text(text)) {
                        let _ = in_tx.send(ChannelEvent::Failed(err.to_string()));
                        return;
                    }
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    // session dropped the handle; close and go home
                    let _ = socket.close(None);
                    return;
                }
            }
        }

        match socket.read() {
            Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                Ok(event) => {
                    if in_tx.send(ChannelEvent::Server(event)).is_err() {
                        return;
                    }
                }
                // boundary conversion: malformed events are logged and
                // dropped, never propagated into rendering
                Err(err) => log::warn!("unrecognized channel message: {err}"),
            },
            Ok(Message::Close(_)) => {
                let _ = in_tx.send(ChannelEvent::Closed);
                return;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(err))
                if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut => {}
            Err(err) => {
                let _ = in_tx.send(ChannelEvent::Failed(err.to_string()));
                return;
            }
        }
    }
}

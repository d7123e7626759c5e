use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::debug;

use super::events::ClientEvent;

/// Serialized output sink for client events. Emissions are synchronous and
/// non-blocking with respect to the event loop; whichever callback fires
/// first writes first.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &ClientEvent);

    /// A closed sink means the client went away; no further events land.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Writes SSE frames to any `Write` target. A write failure closes the
/// sink so in-flight jobs stop producing client traffic.
pub struct SseSink<W: Write + Send> {
    out: Mutex<W>,
    closed: AtomicBool,
}

impl<W: Write + Send> SseSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            closed: AtomicBool::new(false),
        }
    }
}

impl<W: Write + Send> EventSink for SseSink<W> {
    fn emit(&self, event: &ClientEvent) {
        if self.is_closed() {
            return;
        }
        let frame = event.to_sse_frame();
        let mut out = match self.out.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if out.write_all(frame.as_bytes()).and_then(|_| out.flush()).is_err() {
            debug!("Event sink write failed; marking stream closed");
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Collects events in memory. Used by tests and by the CLI to keep the
/// transcript alongside the written report.
#[derive(Default)]
pub struct BufferSink {
    events: Mutex<Vec<ClientEvent>>,
    closed: AtomicBool,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ClientEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl EventSink for BufferSink {
    fn emit(&self, event: &ClientEvent) {
        if self.is_closed() {
            return;
        }
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_sink_writes_frames() {
        let sink = SseSink::new(Vec::new());
        sink.emit(&ClientEvent::Progress {
            percentage: 10,
            message: "warming up".to_string(),
        });

        let out = sink.out.into_inner().unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("event: progress\n"));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn test_closed_buffer_drops_events() {
        let sink = BufferSink::new();
        sink.emit(&ClientEvent::Progress {
            percentage: 1,
            message: "a".to_string(),
        });
        sink.close();
        sink.emit(&ClientEvent::Progress {
            percentage: 2,
            message: "b".to_string(),
        });

        assert_eq!(sink.events().len(), 1);
    }
}

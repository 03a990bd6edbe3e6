//! Background delivery.
//!
//! A bounded queue drained by exactly one worker thread. Enqueueing never
//! blocks: when the queue is full the record is handed back to the caller,
//! which writes it inline. Flush requests travel through the same queue as a
//! sentinel so that acknowledging one means everything queued before it has
//! been written.

use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::logger::Shared;
use crate::record::LogRecord;

pub(crate) enum Message {
    Record(LogRecord),
    Flush(Sender<()>),
}

pub(crate) struct AsyncDispatcher {
    sender: Sender<Message>,
    // kept so records queued after the worker exits stay readable
    leftovers: Receiver<Message>,
    stop: Sender<()>,
    // disconnects when the worker thread ends
    finished: Receiver<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
    capacity: usize,
    flush_interval: Duration,
}

impl AsyncDispatcher {
    pub(crate) fn spawn(
        shared: Arc<Shared>,
        capacity: usize,
        flush_interval: Duration,
    ) -> io::Result<Self> {
        Self::spawn_inner(shared, capacity, flush_interval, None)
    }

    fn spawn_inner(
        shared: Arc<Shared>,
        capacity: usize,
        flush_interval: Duration,
        gate: Option<Receiver<()>>,
    ) -> io::Result<Self> {
        let (sender, receiver) = bounded(capacity);
        let (stop, stop_rx) = bounded(1);
        let leftovers = receiver.clone();
        let (alive, finished) = bounded::<()>(0);

        let worker = thread::Builder::new()
            .name("chatlog-writer".to_string())
            .spawn(move || {
                let _alive = alive;
                if let Some(gate) = gate {
                    let _ = gate.recv();
                }
                run(&shared, &receiver, &stop_rx, flush_interval);
            })?;

        Ok(Self {
            sender,
            leftovers,
            stop,
            finished,
            worker: Mutex::new(Some(worker)),
            capacity,
            flush_interval,
        })
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Queue a record without blocking. A full queue hands the record back.
    pub(crate) fn try_dispatch(&self, record: LogRecord) -> Result<(), LogRecord> {
        match self.sender.try_send(Message::Record(record)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(message)) | Err(TrySendError::Disconnected(message)) => {
                match message {
                    Message::Record(record) => Err(record),
                    Message::Flush(_) => Ok(()),
                }
            }
        }
    }

    /// Block until everything queued so far has been written. Returns false
    /// without waiting if the queue has no room for the flush sentinel, and
    /// gives up if the worker stops before reaching it.
    pub(crate) fn flush(&self) -> bool {
        let (ack, done) = bounded(1);
        if self.sender.try_send(Message::Flush(ack)).is_err() {
            return false;
        }
        select! {
            recv(done) -> acked => acked.is_ok(),
            recv(self.finished) -> _ => done.try_recv().is_ok(),
        }
    }

    /// Stop the worker after it has drained the queue. Blocks until done.
    pub(crate) fn shutdown(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        let _ = self.stop.send(());
        if worker.join().is_err() {
            eprintln!("[ERROR] log writer thread panicked");
        }
    }

    /// Write whatever was queued after the worker stopped, in queue order.
    /// Only meaningful once [`shutdown`](Self::shutdown) has returned.
    pub(crate) fn write_leftovers(&self, shared: &Shared) -> usize {
        let mut written = 0;
        while let Ok(message) = self.leftovers.try_recv() {
            if matches!(message, Message::Record(_)) {
                written += 1;
            }
            handle(shared, message);
        }
        written
    }
}

impl Drop for AsyncDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(shared: &Shared, receiver: &Receiver<Message>, stop: &Receiver<()>, interval: Duration) {
    let ticker = tick(interval);
    loop {
        select! {
            recv(receiver) -> message => match message {
                Ok(message) => handle(shared, message),
                Err(_) => break,
            },
            recv(ticker) -> _ => shared.check_rotation(),
            recv(stop) -> _ => {
                drain(shared, receiver);
                break;
            }
        }
    }
    shared.flush_streams();
}

fn drain(shared: &Shared, receiver: &Receiver<Message>) {
    while let Ok(message) = receiver.try_recv() {
        handle(shared, message);
    }
}

fn handle(shared: &Shared, message: Message) {
    match message {
        Message::Record(record) => shared.write(&record),
        Message::Flush(ack) => {
            shared.flush_streams();
            let _ = ack.send(());
        }
    }
}

#[cfg(test)]
impl AsyncDispatcher {
    /// A dispatcher whose worker does not start consuming until the returned
    /// sender is used (or dropped).
    pub(crate) fn spawn_gated(
        shared: Arc<Shared>,
        capacity: usize,
        flush_interval: Duration,
    ) -> (Self, Sender<()>) {
        let (open, gate) = bounded(1);
        let dispatcher = Self::spawn_inner(shared, capacity, flush_interval, Some(gate))
            .expect("spawn writer thread");
        (dispatcher, open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use crate::logger::LoggerConfig;
    use crate::sink::MemorySink;
    use chrono::Local;

    fn shared(sink: &MemorySink) -> Arc<Shared> {
        let config = LoggerConfig {
            console: sink.clone().into(),
            show_caller: false,
            ..LoggerConfig::default()
        };
        Arc::new(Shared::open(&config, Arc::new(crate::rotation::SystemClock)).0)
    }

    fn record(message: &str) -> LogRecord {
        LogRecord::new(Level::Info, Local::now(), message)
    }

    // a full queue rejects the sentinel, so retry until the worker makes room
    fn flush_until_accepted(dispatcher: &AsyncDispatcher) {
        while !dispatcher.flush() {
            thread::yield_now();
        }
    }

    #[test]
    fn test_full_queue_hands_record_back() {
        let sink = MemorySink::new();
        let (dispatcher, open) = AsyncDispatcher::spawn_gated(shared(&sink), 2, Duration::from_secs(60));

        assert!(dispatcher.try_dispatch(record("q1")).is_ok());
        assert!(dispatcher.try_dispatch(record("q2")).is_ok());
        let overflow = dispatcher.try_dispatch(record("q3")).unwrap_err();
        assert_eq!(overflow.message, "q3");

        open.send(()).unwrap();
        flush_until_accepted(&dispatcher);
        assert!(sink.contains("q1") && sink.contains("q2"));
        assert!(!sink.contains("q3"));
    }

    #[test]
    fn test_flush_is_skipped_when_queue_is_full() {
        let sink = MemorySink::new();
        let (dispatcher, open) = AsyncDispatcher::spawn_gated(shared(&sink), 1, Duration::from_secs(60));

        dispatcher.try_dispatch(record("only")).unwrap();
        assert!(!dispatcher.flush());

        drop(open);
        flush_until_accepted(&dispatcher);
        assert!(sink.contains("only"));
    }

    #[test]
    fn test_flush_waits_for_everything_queued_before_it() {
        let sink = MemorySink::new();
        let dispatcher = AsyncDispatcher::spawn(shared(&sink), 64, Duration::from_secs(60)).unwrap();
        for i in 0..50 {
            dispatcher.try_dispatch(record(&format!("record-{i}"))).unwrap();
        }
        assert!(dispatcher.flush());

        let lines = sink.lines();
        assert_eq!(lines.len(), 50);
        assert!(lines[0].ends_with("record-0"));
        assert!(lines[49].ends_with("record-49"));
    }

    #[test]
    fn test_shutdown_drains_remaining_records() {
        let sink = MemorySink::new();
        let shared = shared(&sink);
        let (dispatcher, open) =
            AsyncDispatcher::spawn_gated(Arc::clone(&shared), 16, Duration::from_secs(60));
        for i in 0..10 {
            dispatcher.try_dispatch(record(&format!("pending-{i}"))).unwrap();
        }
        drop(open);
        dispatcher.shutdown();
        assert_eq!(sink.lines().len(), 10);
        assert_eq!(dispatcher.write_leftovers(&shared), 0);
        dispatcher.shutdown();
    }

    #[test]
    fn test_records_queued_after_stop_are_kept() {
        let sink = MemorySink::new();
        let shared = shared(&sink);
        let dispatcher =
            AsyncDispatcher::spawn(Arc::clone(&shared), 16, Duration::from_secs(60)).unwrap();
        dispatcher.try_dispatch(record("before")).unwrap();
        dispatcher.shutdown();

        dispatcher.try_dispatch(record("after")).unwrap();
        assert!(!sink.contains("after"));
        assert_eq!(dispatcher.write_leftovers(&shared), 1);

        let lines = sink.lines();
        assert!(lines[0].ends_with("before"));
        assert!(lines[1].ends_with("after"));
    }
}

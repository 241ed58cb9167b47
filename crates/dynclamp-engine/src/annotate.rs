//! Operator annotations collected while a trial runs.
//!
//! The collector owns a background thread that reads lines from a
//! blocking source (typically stdin), stamps each with the simulation time
//! last published by the engine, and sends it over a channel. The thread
//! never touches the graph.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use dynclamp_core::SharedTime;

/// A timestamped line of operator text.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    /// Simulation time at which the line was read, in seconds.
    pub time: f64,
    /// The line, trimmed.
    pub message: String,
}

/// Handle to a running annotation thread.
#[derive(Debug)]
pub struct AnnotationCollector {
    rx: Receiver<Annotation>,
    done: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AnnotationCollector {
    /// Start reading `source` on a new thread.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the thread cannot be spawned.
    pub fn spawn<R>(source: R, time: SharedTime) -> io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded();
        let done = Arc::new(AtomicBool::new(false));
        let thread_done = Arc::clone(&done);
        let handle = thread::Builder::new()
            .name("dynclamp-annotations".into())
            .spawn(move || collect(source, time, tx, thread_done))?;
        Ok(Self {
            rx,
            done,
            handle: Some(handle),
        })
    }

    /// Annotations received so far, without stopping the thread.
    pub fn try_collect(&self) -> Vec<Annotation> {
        self.rx.try_iter().collect()
    }

    /// Stop collecting and return everything received.
    ///
    /// A thread that already reached end of input is joined. One still
    /// blocked in a read is detached; it exits after its next line.
    pub fn finish(mut self) -> Vec<Annotation> {
        self.done.store(true, Ordering::Release);
        let annotations = self.try_collect();
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                if handle.join().is_err() {
                    log::warn!("annotation thread panicked");
                }
            } else {
                log::debug!("detaching annotation thread blocked on input");
            }
        }
        annotations
    }
}

fn collect<R: BufRead>(source: R, time: SharedTime, tx: Sender<Annotation>, done: Arc<AtomicBool>) {
    for line in source.lines() {
        if done.load(Ordering::Acquire) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::warn!("annotation source failed: {e}");
                break;
            }
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        let annotation = Annotation {
            time: time.get(),
            message: message.to_owned(),
        };
        log::info!("annotation at t={:.6}: {}", annotation.time, annotation.message);
        if tx.send(annotation).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynclamp_core::SimClock;
    use std::io::Cursor;
    use std::time::Duration;

    #[test]
    fn collects_and_stamps_lines() {
        let time = SharedTime::new();
        let mut clock = SimClock::new(0.5);
        clock.advance();
        time.publish(&clock);
        let source = Cursor::new("first\n\n  second  \n");
        let collector = AnnotationCollector::spawn(source, time).unwrap();
        // End of input ends the thread; wait for it.
        for _ in 0..200 {
            if collector.handle.as_ref().is_some_and(|h| h.is_finished()) {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        let got = collector.finish();
        assert_eq!(
            got,
            [
                Annotation {
                    time: 0.5,
                    message: "first".into()
                },
                Annotation {
                    time: 0.5,
                    message: "second".into()
                },
            ]
        );
    }

    #[test]
    fn finish_does_not_block_on_pending_read() {
        let (mut writer, reader) = pipe();
        let collector = AnnotationCollector::spawn(reader, SharedTime::new()).unwrap();
        let got = collector.finish();
        assert!(got.is_empty());
        // Unblock the detached reader so it can exit.
        let _ = std::io::Write::write_all(&mut writer, b"late\n");
    }

    /// A blocking in-memory line source.
    fn pipe() -> (ChannelWriter, io::BufReader<ChannelReader>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (ChannelWriter(tx), io::BufReader::new(ChannelReader(rx)))
    }

    struct ChannelWriter(Sender<Vec<u8>>);

    impl io::Write for ChannelWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let _ = self.0.send(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct ChannelReader(Receiver<Vec<u8>>);

    impl io::Read for ChannelReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.recv() {
                Ok(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                Err(_) => Ok(0),
            }
        }
    }
}

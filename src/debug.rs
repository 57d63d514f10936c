//! Audio-thread diagnostics.
//!
//! `hc_log!` formats straight into a fixed-size slot of a single-producer
//! ring; nothing allocates on the calling thread and a full ring drops the
//! message. The ring is drained to a file from a non-real-time context
//! (plugin initialize). Without the `debug` feature the macro compiles to
//! nothing.

use std::fmt;

#[cfg(feature = "debug")]
pub mod logger {
    use std::cell::UnsafeCell;
    use std::fmt;
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::OnceLock;

    const SLOTS: usize = 128;
    const MSG_MAX: usize = 256;
    const LOG_PATH: &str = "/tmp/vxhearing.log";

    #[derive(Copy, Clone)]
    struct Message {
        len: usize,
        bytes: [u8; MSG_MAX],
    }

    impl Message {
        const EMPTY: Message = Message {
            len: 0,
            bytes: [0; MSG_MAX],
        };

        fn text(&self) -> &str {
            std::str::from_utf8(&self.bytes[..self.len]).unwrap_or("<invalid>")
        }
    }

    impl fmt::Write for Message {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            let n = s.len().min(MSG_MAX - self.len);
            self.bytes[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
            self.len += n;
            Ok(())
        }
    }

    /// Write index and read index both count up forever; slots are taken
    /// modulo [`SLOTS`].
    struct Ring {
        written: AtomicUsize,
        read: AtomicUsize,
        slots: Box<[UnsafeCell<Message>]>,
    }

    // one writer (the audio thread) and one reader (drain_to_file)
    unsafe impl Sync for Ring {}

    impl Ring {
        fn new() -> Self {
            Self {
                written: AtomicUsize::new(0),
                read: AtomicUsize::new(0),
                slots: (0..SLOTS).map(|_| UnsafeCell::new(Message::EMPTY)).collect(),
            }
        }

        fn write(&self, args: fmt::Arguments) {
            let w = self.written.load(Ordering::Relaxed);
            if w - self.read.load(Ordering::Acquire) >= SLOTS {
                return;
            }
            // SAFETY: the slot at `w` is outside the reader's window until
            // `written` is published below.
            let slot = unsafe { &mut *self.slots[w % SLOTS].get() };
            slot.len = 0;
            let _ = fmt::write(slot, args);
            self.written.store(w + 1, Ordering::Release);
        }

        fn read(&self, mut f: impl FnMut(&str)) {
            let mut r = self.read.load(Ordering::Relaxed);
            let w = self.written.load(Ordering::Acquire);
            while r < w {
                // SAFETY: slots in r..w are published and not rewritten until
                // `read` moves past them.
                let msg = unsafe { &*self.slots[r % SLOTS].get() };
                if msg.len > 0 {
                    f(msg.text());
                }
                r += 1;
                self.read.store(r, Ordering::Release);
            }
        }
    }

    static RING: OnceLock<Ring> = OnceLock::new();
    static ENABLED: AtomicBool = AtomicBool::new(false);

    /// Allocate the ring. Call before the first render.
    pub fn init_logger() {
        let _ = RING.get_or_init(Ring::new);
        ENABLED.store(true, Ordering::Relaxed);
    }

    pub fn log_args(args: fmt::Arguments) {
        if !ENABLED.load(Ordering::Relaxed) {
            return;
        }
        if let Some(ring) = RING.get() {
            ring.write(args);
        }
    }

    /// Append every pending message to the log file.
    pub fn drain_to_file() {
        let Some(ring) = RING.get() else {
            return;
        };
        let Ok(mut file) = OpenOptions::new().create(true).append(true).open(LOG_PATH) else {
            return;
        };
        ring.read(|msg| {
            let _ = writeln!(file, "{msg}");
        });
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_ring_drops_when_full_and_truncates() {
            let ring = Ring::new();
            for i in 0..SLOTS + 10 {
                ring.write(format_args!("msg {i}"));
            }
            let mut seen = Vec::new();
            ring.read(|m| seen.push(m.to_string()));
            assert_eq!(seen.len(), SLOTS);
            assert_eq!(seen[0], "msg 0");

            let long = "x".repeat(2 * MSG_MAX);
            ring.write(format_args!("{long}"));
            let mut len = 0;
            ring.read(|m| len = m.len());
            assert_eq!(len, MSG_MAX);
        }
    }
}

#[cfg(feature = "debug")]
pub(crate) fn hc_log_inner(args: fmt::Arguments) {
    logger::log_args(args);
}

#[cfg(not(feature = "debug"))]
pub(crate) fn hc_log_inner(_args: fmt::Arguments) {}

#[macro_export]
macro_rules! hc_log {
    ($($arg:tt)*) => {
        $crate::debug::hc_log_inner(format_args!($($arg)*))
    };
}

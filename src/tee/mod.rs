//! Stdout tee core
//!
//! Buffers written text into lines, stamps each non-blank line, mirrors it to
//! the original console, persists it to a line-flushed log file, and fans it
//! out to live subscribers without ever blocking on them.

mod interceptor;
mod line_buffer;
mod log_file;
pub mod record;
mod stream;
mod subscribers;
mod writer;

pub use interceptor::{Interceptor, TeeOptions};
pub use line_buffer::LineBuffer;
pub use log_file::{LogFile, LogMode};
pub use subscribers::{
    offer, BroadcastSummary, Delivery, SubscriberId, SubscriberRegistry, Subscription,
    DEFAULT_SUBSCRIBER_CAPACITY,
};
pub use writer::TeeWriter;

#[cfg(test)]
pub(crate) mod test_support {
    //! Console stand-in for tests

    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    use super::record::parse_record;

    /// In-memory sink shared between the test and the interceptor
    #[derive(Clone, Default)]
    pub struct SharedBuffer {
        content: Arc<Mutex<Vec<u8>>>,
    }

    impl SharedBuffer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn text(&self) -> String {
            String::from_utf8_lossy(&self.content.lock().unwrap()).into_owned()
        }

        /// Records written so far, each still ending in `\n`
        pub fn lines(&self) -> Vec<String> {
            self.text()
                .split_inclusive('\n')
                .map(str::to_owned)
                .collect()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.content.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Line content of each record, timestamp removed
    pub fn contents(records: &[String]) -> Vec<String> {
        records
            .iter()
            .map(|r| {
                parse_record(r)
                    .unwrap_or_else(|| panic!("not a record: {:?}", r))
                    .1
                    .to_owned()
            })
            .collect()
    }
}

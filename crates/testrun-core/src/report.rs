use std::io::{self, Write};

use crate::event::TestEvent;

/// Turns result-stream events into formatted output.
pub trait Reporter {
    fn report(&mut self, event: &TestEvent, out: &mut dyn Write) -> io::Result<()>;

    /// Called once after the stream has ended.
    fn finish(&mut self, _out: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }
}

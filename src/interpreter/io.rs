//=============================================
// joss/interpreter/io.rs
//=============================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Script console streams
// Objective: Shared output sink and input source behind echo, cout and cin,
//            swappable for in-memory buffers when embedding or testing
//=============================================

use std::io::{self, BufRead, BufReader, Cursor, Write};
use std::sync::Arc;

use parking_lot::Mutex;

/// Destination for script output. Clones share one underlying writer.
#[derive(Clone)]
pub struct OutputSink(Arc<Mutex<Box<dyn Write + Send>>>);

impl OutputSink {
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        OutputSink(Arc::new(Mutex::new(Box::new(writer))))
    }

    /// In-memory sink plus a handle for reading back what was written.
    pub fn buffer() -> (Self, CapturedOutput) {
        let captured = CapturedOutput::default();
        (Self::from_writer(captured.clone()), captured)
    }

    pub fn write_str(&self, text: &str) -> io::Result<()> {
        let mut writer = self.0.lock();
        writer.write_all(text.as_bytes())?;
        writer.flush()
    }

    pub fn write_line(&self, text: &str) -> io::Result<()> {
        let mut writer = self.0.lock();
        writer.write_all(text.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

/// Shared byte buffer collecting script output.
#[derive(Clone, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Line-oriented source for `cin >>`.
#[derive(Clone)]
pub struct InputSource(Arc<Mutex<Box<dyn BufRead + Send>>>);

impl InputSource {
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(io::stdin()))
    }

    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        InputSource(Arc::new(Mutex::new(Box::new(reader))))
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self::from_reader(Cursor::new(text.into().into_bytes()))
    }

    /// Next line without its terminator; `None` at end of input.
    pub fn read_line(&self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let read = self.0.lock().read_line(&mut line)?;
        if read == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }
}

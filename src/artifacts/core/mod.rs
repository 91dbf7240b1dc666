//! Shared output plumbing

use derive_new::new;
use minus::Pager;
use std::io::{self, Write};

/// `Write` adapter feeding a minus pager, so `log` can print to it like stdout
#[derive(new)]
pub struct PagerWriter {
    pager: Pager,
}

impl PagerWriter {
    pub fn pager(&self) -> &Pager {
        &self.pager
    }
}

impl Write for PagerWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // blob content may not be UTF-8; the pager only takes text
        let text = String::from_utf8_lossy(buf);
        self.pager.push_str(text).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

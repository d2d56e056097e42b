use std::io::{Error, Seek, Write};
use zip::ZipWriter;

/// Writers that must be finalized explicitly before the underlying writer is
/// complete, handing the inner writer back.
pub trait Finish<O> {
    fn finish(self) -> Result<O, Error>;
}

impl<W: Write + Seek> Finish<W> for ZipWriter<W> {
    fn finish(self) -> Result<W, Error> {
        self.finish().map_err(Error::other)
    }
}

//! ChainWriter
//!
//! Appends to a `Chain`. Filled buffers are handed to the chain as blocks
//! without copying, and large owned writes become blocks directly.

use bytes::Bytes;

use crate::base::{to_position, BufferCursor, Chain, Dependency, Position, MAX_BYTES_TO_COPY};
use crate::config::BufferOptions;
use crate::error::Result;

use super::writer::{FlushType, Writer, WriterBase};

/// `Writer` that appends to a `Chain`
#[derive(Debug)]
pub struct ChainWriter<'a> {
    base: WriterBase,
    dest: Dependency<'a, Chain>,
    options: BufferOptions,
}

impl<'a> ChainWriter<'a> {
    /// Writes after the current contents of `dest`.
    pub fn new(dest: Dependency<'a, Chain>, options: BufferOptions) -> Self {
        let pos = dest.len() as Position;
        Self {
            base: WriterBase::at(pos),
            dest,
            options,
        }
    }

    pub fn owned() -> ChainWriter<'static> {
        ChainWriter::new(Dependency::owned(Chain::new()), BufferOptions::default())
    }

    pub fn borrowed(dest: &'a mut Chain) -> Self {
        Self::new(Dependency::borrowed(dest), BufferOptions::default())
    }

    /// The destination; complete after `flush()` or `close()`.
    pub fn dest(&self) -> &Chain {
        self.dest.get()
    }

    /// Takes the written chain out of an owning writer, leaving it empty.
    pub fn take_dest(&mut self) -> Chain {
        self.sync_buffer();
        let chain = std::mem::take(self.dest.get_mut());
        self.base.clear_buffer_at(0);
        chain
    }

    /// Moves buffered bytes into the chain.
    fn sync_buffer(&mut self) {
        let (mut buffer, window) = self.base.take_window();
        if window.start_to_cursor() <= MAX_BYTES_TO_COPY {
            // Small pieces are copied so the allocation can be reused.
            self.dest
                .append_slice(&buffer[window.start()..window.cursor()]);
            self.base.set_window(buffer, BufferCursor::empty_at(window.pos()));
            return;
        }
        buffer.truncate(window.cursor());
        let block = Bytes::from(buffer).slice(window.start()..);
        self.dest.append(block);
    }
}

impl Writer for ChainWriter<'_> {
    fn base(&self) -> &WriterBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut WriterBase {
        &mut self.base
    }

    fn push_slow(&mut self, min_length: usize, recommended_length: usize) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let pos = self.base.pos();
        let length = self.options.next_buffer_length(pos, min_length, recommended_length);
        if pos.checked_add(to_position(length)).is_none() {
            return self.base.fail_overflow();
        }
        self.base.reserve_window(length, pos);
        true
    }

    fn flush(&mut self, _flush_type: FlushType) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        true
    }

    fn write_chain_slow(&mut self, src: &Chain) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let Some(new_pos) = self.base.pos().checked_add(to_position(src.len())) else {
            return self.base.fail_overflow();
        };
        self.dest.append_chain(src);
        self.base.clear_buffer_at(new_pos);
        true
    }

    fn write_bytes_slow(&mut self, src: Bytes) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let Some(new_pos) = self.base.pos().checked_add(to_position(src.len())) else {
            return self.base.fail_overflow();
        };
        self.dest.append(src);
        self.base.clear_buffer_at(new_pos);
        true
    }

    fn supports_truncate(&self) -> bool {
        true
    }

    fn size(&mut self) -> Result<Position> {
        self.base.state().status()?;
        Ok(self.base.pos())
    }

    fn truncate(&mut self, new_size: Position) -> bool {
        if !self.base.state().healthy() {
            return false;
        }
        self.sync_buffer();
        let size = self.dest.len() as Position;
        if new_size > size {
            return false;
        }
        self.dest.remove_suffix((size - new_size) as usize);
        self.base.clear_buffer_at(new_size);
        true
    }

    fn done(&mut self) {
        self.sync_buffer();
    }
}

impl Drop for ChainWriter<'_> {
    fn drop(&mut self) {
        if self.base.state().is_open() {
            self.sync_buffer();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_writes_then_flush() {
        let mut chain = Chain::new();
        let mut writer = ChainWriter::borrowed(&mut chain);
        assert!(writer.write(b"hello "));
        assert!(writer.write(b"world"));
        assert_eq!(writer.pos(), 11);
        assert!(writer.close());
        drop(writer);
        assert_eq!(chain.to_vec(), b"hello world");
    }

    #[test]
    fn test_large_owned_write_is_shared() {
        let block = Bytes::from(vec![7u8; 4096]);
        let ptr = block.as_ptr();
        let mut writer = ChainWriter::owned();
        assert!(writer.write(b"x"));
        assert!(writer.write_bytes(block));
        assert!(writer.flush(FlushType::FromObject));
        assert_eq!(writer.dest().len(), 4097);
        assert!(writer.dest().blocks().any(|b| b.as_ptr() == ptr));
    }

    #[test]
    fn test_truncate_then_write() {
        let mut writer = ChainWriter::owned();
        assert!(writer.write(b"abcdef"));
        assert!(writer.truncate(3));
        assert_eq!(writer.pos(), 3);
        assert!(writer.write(b"XY"));
        assert!(!writer.truncate(100));
        assert!(writer.close());
        assert_eq!(writer.dest().to_vec(), b"abcXY");
    }
}

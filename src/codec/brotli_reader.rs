//! BrotliReader
//!
//! Decompresses a Brotli stream read from another reader. The decoder
//! state is large, so it lives behind a stable heap indirection and is
//! released as soon as the stream ends.

use brotli::enc::StandardAlloc;
use brotli::{BrotliDecompressStream, BrotliResult, BrotliState};

use crate::base::{Dependency, StableDependency};
use crate::config::BufferOptions;
use crate::error::{Result, RiffleError};
use crate::stream::{BufferedReader, ReadSource, Reader};

use super::close_src;

type DecoderState = BrotliState<StandardAlloc, StandardAlloc, StandardAlloc>;

/// `Reader` that decompresses Brotli data from another reader
pub type BrotliReader<'a, R> = BufferedReader<BrotliSource<'a, R>>;

pub struct BrotliSource<'a, R: Reader> {
    src: Dependency<'a, R>,
    state: StableDependency<'static, DecoderState>,
    truncated: bool,
}

impl<R: Reader + std::fmt::Debug> std::fmt::Debug for BrotliSource<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrotliSource")
            .field("src", &self.src)
            .field("finished", &self.state.is_empty())
            .field("truncated", &self.truncated)
            .finish()
    }
}

impl<R: Reader> BrotliSource<'_, R> {
    pub fn src(&self) -> &R {
        self.src.get()
    }
}

impl<R: Reader> ReadSource for BrotliSource<'_, R> {
    fn read_internal(&mut self, dest: &mut [u8], min_length: usize) -> Result<usize> {
        let Some(state) = self.state.get_mut() else {
            return Ok(0);
        };
        self.truncated = false;
        let mut produced = 0;
        let mut total_out = 0;
        loop {
            let input = self.src.chunk();
            let mut available_in = input.len();
            let mut input_offset = 0;
            let mut available_out = dest.len() - produced;
            let mut output_offset = produced;
            let result = BrotliDecompressStream(
                &mut available_in,
                &mut input_offset,
                input,
                &mut available_out,
                &mut output_offset,
                dest,
                &mut total_out,
                state,
            );
            self.src.move_cursor(input_offset);
            produced = output_offset;
            match result {
                BrotliResult::ResultSuccess => {
                    self.state.reset();
                    return Ok(produced);
                }
                BrotliResult::ResultFailure => {
                    return Err(RiffleError::DataLoss(
                        "BrotliDecoderDecompressStream() failed".into(),
                    ));
                }
                BrotliResult::NeedsMoreOutput => return Ok(produced),
                BrotliResult::NeedsMoreInput => {
                    if produced >= min_length {
                        return Ok(produced);
                    }
                    if !self.src.pull(1, 0) {
                        self.src.status()?;
                        self.truncated = true;
                        return Ok(produced);
                    }
                }
            }
        }
    }

    fn exhausted(&self) -> bool {
        self.state.is_empty()
    }

    fn done(&mut self) -> Result<()> {
        self.state.reset();
        let truncated = std::mem::take(&mut self.truncated);
        close_src(&mut self.src)?;
        if truncated {
            return Err(RiffleError::DataLoss(
                "Truncated Brotli-compressed stream".into(),
            ));
        }
        Ok(())
    }
}

impl<'a, R: Reader> BufferedReader<BrotliSource<'a, R>> {
    pub fn new(src: Dependency<'a, R>, options: BufferOptions) -> Self {
        let failure = src.status().err();
        let state = DecoderState::new(
            StandardAlloc::default(),
            StandardAlloc::default(),
            StandardAlloc::default(),
        );
        let mut reader = Self::from_source(
            BrotliSource {
                src,
                state: StableDependency::new(state),
                truncated: false,
            },
            options,
        );
        if let Some(err) = failure {
            reader.base_mut().fail(err);
        }
        reader
    }

    pub fn borrowed(src: &'a mut R, options: BufferOptions) -> Self {
        Self::new(Dependency::borrowed(src), options)
    }
}

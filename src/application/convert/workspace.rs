//! Per-request scratch files for the rendering engine.
//!
//! Each conversion owns exactly one workspace: an input file pre-populated
//! with the submitted document and an empty output file for the engine to
//! fill. Both are uniquely named temp files; deletion is guaranteed on
//! every exit path: explicitly via [`ConversionWorkspace::release`] on
//! normal returns, and by the underlying [`NamedTempFile`] drop guard if
//! the request unwinds early.

use std::{
    io::{self, Write},
    path::Path,
};

use tempfile::{Builder, NamedTempFile};
use tracing::warn;

const INPUT_SUFFIX: &str = ".html";
const OUTPUT_SUFFIX: &str = ".pdf";
const FILE_PREFIX: &str = "stampa-";

#[derive(Debug)]
pub struct ConversionWorkspace {
    input: NamedTempFile,
    output: NamedTempFile,
}

impl ConversionWorkspace {
    /// Create the input/output pair inside `scratch_dir` and write the
    /// payload into the input file.
    ///
    /// Names are chosen atomically by the operating system, so concurrent
    /// acquisitions never collide.
    pub fn acquire(scratch_dir: &Path, payload: &[u8]) -> io::Result<Self> {
        let mut input = Builder::new()
            .prefix(FILE_PREFIX)
            .suffix(INPUT_SUFFIX)
            .tempfile_in(scratch_dir)?;
        input.write_all(payload)?;
        input.flush()?;

        let output = Builder::new()
            .prefix(FILE_PREFIX)
            .suffix(OUTPUT_SUFFIX)
            .tempfile_in(scratch_dir)?;

        Ok(Self { input, output })
    }

    pub fn input_path(&self) -> &Path {
        self.input.path()
    }

    pub fn output_path(&self) -> &Path {
        self.output.path()
    }

    /// Delete both scratch files. Failures are logged, never escalated;
    /// by this point the request outcome is already decided.
    pub fn release(self) {
        let Self { input, output } = self;
        close_logged(input, "input");
        close_logged(output, "output");
    }
}

fn close_logged(file: NamedTempFile, role: &'static str) {
    let path = file.path().to_path_buf();
    if let Err(err) = file.close() {
        warn!(
            target = "application::convert::workspace",
            op = "workspace::release",
            role,
            path = %path.display(),
            error = %err,
            "Failed to remove scratch file"
        );
    }
}

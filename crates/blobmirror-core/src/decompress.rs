//! Turning a fetched object into the file that gets published

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

const PART_SUFFIX: &str = ".part";
const BUFFER_SIZE: usize = 64 * 1024;

/// The staged object could not be turned into a publishable file.
#[derive(Debug, thiserror::Error)]
pub enum DecompressionError {
    #[error("corrupt or truncated gzip stream in {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DecompressionError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Produce `final_name` next to `staged`.
///
/// Compressed input is stream-decoded into `<final_name>.part` and renamed
/// once the whole stream has been read, then the compressed file is removed.
/// A decode failure leaves nothing at the final path. Plain input is renamed
/// without touching its bytes.
///
/// # Errors
///
/// Returns a [`DecompressionError`] when the stream is corrupt or a rename
/// fails.
pub fn materialize(
    staged: &Path,
    final_name: &str,
    compressed: bool,
) -> Result<PathBuf, DecompressionError> {
    let dir = staged.parent().unwrap_or_else(|| Path::new("."));
    let final_path = dir.join(final_name);

    if !compressed {
        if staged != final_path {
            fs::rename(staged, &final_path).map_err(|e| DecompressionError::io(staged, e))?;
        }
        return Ok(final_path);
    }

    let part_path = dir.join(format!("{final_name}{PART_SUFFIX}"));
    let decoded = decode_into(staged, &part_path)
        .and_then(|bytes| {
            fs::rename(&part_path, &final_path)
                .map_err(|e| DecompressionError::io(&part_path, e))?;
            Ok(bytes)
        });

    match decoded {
        Ok(bytes) => {
            tracing::debug!(
                staged = %staged.display(),
                bytes,
                "Decompressed staged object"
            );
            fs::remove_file(staged).map_err(|e| DecompressionError::io(staged, e))?;
            Ok(final_path)
        }
        Err(e) => {
            let _ = fs::remove_file(&part_path);
            Err(e)
        }
    }
}

fn decode_into(source: &Path, target: &Path) -> Result<u64, DecompressionError> {
    let input = File::open(source).map_err(|e| DecompressionError::io(source, e))?;
    let mut decoder = MultiGzDecoder::new(BufReader::new(input));
    let mut output = File::create(target).map_err(|e| DecompressionError::io(target, e))?;

    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let read = match decoder.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(DecompressionError::Corrupt {
                    path: source.to_path_buf(),
                    source: e,
                });
            }
        };
        output
            .write_all(&buffer[..read])
            .map_err(|e| DecompressionError::io(target, e))?;
        total += read as u64;
    }

    output
        .sync_all()
        .map_err(|e| DecompressionError::io(target, e))?;
    Ok(total)
}

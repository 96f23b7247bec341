//! [`FakeBucket`]: a local directory addressed with `gs://` locators.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::TempDir;

/// Bucket name used by every locator this fixture hands out.
pub const BUCKET: &str = "test-bucket";

/// A temporary directory laid out like `gs://<bucket>/<object path>`.
///
/// # Example
///
/// ```rust,no_run
/// use blobmirror_test_utils::FakeBucket;
///
/// let bucket = FakeBucket::new();
/// bucket.put("CIERRES/FOO.csv", b"a,b\n1,2\n");
/// assert_eq!(bucket.locator("CIERRES/FOO.csv"), "gs://test-bucket/CIERRES/FOO.csv");
/// ```
pub struct FakeBucket {
    temp_dir: TempDir,
}

impl Default for FakeBucket {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBucket {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("FakeBucket: failed to create temp dir");
        fs::create_dir_all(temp_dir.path().join(BUCKET))
            .expect("FakeBucket: failed to create bucket dir");
        Self { temp_dir }
    }

    /// Directory that maps to `gs://`.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Full locator for an object path inside the bucket.
    pub fn locator(&self, object: &str) -> String {
        format!("gs://{}/{}", BUCKET, object)
    }

    /// Store an object, replacing any previous revision.
    pub fn put(&self, object: &str, bytes: &[u8]) {
        let path = self.object_file(object);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("FakeBucket::put: mkdir failed");
        }
        fs::write(&path, bytes).expect("FakeBucket::put: write failed");
    }

    /// Store `plain` gzip-compressed and return the compressed bytes.
    pub fn put_gzip(&self, object: &str, plain: &[u8]) -> Vec<u8> {
        let compressed = gzip(plain);
        self.put(object, &compressed);
        compressed
    }

    pub fn remove(&self, object: &str) {
        let _ = fs::remove_file(self.object_file(object));
    }

    /// Local file backing a `gs://` locator, if the locator has that scheme.
    pub fn resolve(&self, locator: &str) -> Option<PathBuf> {
        locator
            .strip_prefix("gs://")
            .map(|rest| self.temp_dir.path().join(rest))
    }

    fn object_file(&self, object: &str) -> PathBuf {
        self.temp_dir.path().join(BUCKET).join(object)
    }
}

/// Gzip-compress a byte slice.
pub fn gzip(plain: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(plain).expect("gzip: write failed");
    encoder.finish().expect("gzip: finish failed")
}

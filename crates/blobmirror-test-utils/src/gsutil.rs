//! A fake `gsutil` shell script serving a [`FakeBucket`](crate::FakeBucket).
//!
//! Supports `ls -l <url>`, `-q ls <url>` and `cp <url> <path>` with the same
//! exit codes and messages the real tool uses for missing objects. Creating
//! `.fail-ls` or `.fail-cp` in the bucket root makes the matching command
//! fail with a service error.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const SCRIPT: &str = r#"#!/bin/sh
ROOT='@ROOT@'
if [ "$1" = "-q" ]; then shift; fi
cmd="$1"; shift
case "$cmd" in
  ls)
    if [ "$1" = "-l" ]; then shift; fi
    if [ -f "$ROOT/.fail-ls" ]; then echo "ServiceException: 503 Backend Error" >&2; exit 1; fi
    url="$1"
    path="$ROOT/${url#gs://}"
    if [ -f "$path" ]; then
      size=$(wc -c < "$path" | tr -d ' ')
      echo "    $size  2024-03-01T10:00:00Z  $url"
      echo "TOTAL: 1 objects, $size bytes ($size B)"
      exit 0
    fi
    echo "CommandException: One or more URLs matched no objects." >&2
    exit 1
    ;;
  cp)
    if [ -f "$ROOT/.fail-cp" ]; then echo "ServiceException: 503 Backend Error" >&2; exit 1; fi
    path="$ROOT/${1#gs://}"
    if [ ! -f "$path" ]; then echo "CommandException: No URLs matched: $1" >&2; exit 1; fi
    cp "$path" "$2"
    ;;
  *)
    echo "unsupported command: $cmd" >&2
    exit 2
    ;;
esac
"#;

/// Write an executable `gsutil` into `bin_dir` that serves `bucket_root`.
pub fn install_fake_gsutil(bin_dir: &Path, bucket_root: &Path) -> PathBuf {
    fs::create_dir_all(bin_dir).expect("install_fake_gsutil: mkdir failed");
    let script_path = bin_dir.join("gsutil");
    let script = SCRIPT.replace("@ROOT@", &bucket_root.to_string_lossy());
    fs::write(&script_path, script).expect("install_fake_gsutil: write failed");
    fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755))
        .expect("install_fake_gsutil: chmod failed");
    script_path
}

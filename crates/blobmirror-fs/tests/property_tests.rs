use std::fs;
use std::path::Path;

use blobmirror_fs::io::{self, MoveKind};
use blobmirror_fs::{DirectoryLayout, RobustnessConfig};
use proptest::prelude::*;
use tempfile::TempDir;

fn no_fsync() -> RobustnessConfig {
    RobustnessConfig {
        enable_fsync: false,
        ..RobustnessConfig::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_write_atomic_leaves_only_target_and_lock(
        name in "[A-Za-z0-9_ -]{1,24}\\.csv",
        content in proptest::collection::vec(any::<u8>(), 0..2048),
    ) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(&name);

        io::write_atomic(&path, &content, no_fsync()).unwrap();
        prop_assert_eq!(fs::read(&path).unwrap(), content);

        // No temp sibling survives a successful write.
        let mut names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        let lock = format!("{name}.lock");
        let mut expected = vec![name.clone(), lock];
        expected.sort();
        prop_assert_eq!(names, expected);
    }

    #[test]
    fn test_move_atomic_delivers_exact_bytes(
        content in proptest::collection::vec(any::<u8>(), 0..2048),
        previous in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("staged.bin");
        let to = temp.path().join("out").join("published.bin");
        fs::write(&from, &content).unwrap();
        fs::create_dir_all(to.parent().unwrap()).unwrap();
        fs::write(&to, &previous).unwrap();

        let kind = io::move_atomic(&from, &to, no_fsync()).unwrap();
        prop_assert_eq!(kind, MoveKind::Renamed);
        prop_assert!(!from.exists());
        prop_assert_eq!(fs::read(&to).unwrap(), content);
    }

    #[test]
    fn test_relative_destinations_stay_under_base_root(
        segments in proptest::collection::vec("[A-Za-z0-9 _-]{1,12}|\\.\\.", 1..5),
    ) {
        let layout = DirectoryLayout::new("/bases", "/backup");
        let relative = segments.join("/");
        match layout.resolve_destination(Path::new(&relative)) {
            Ok(resolved) => {
                prop_assert!(!segments.iter().any(|s| s == ".."));
                prop_assert!(resolved.starts_with("/bases"));
            }
            Err(_) => prop_assert!(segments.iter().any(|s| s == "..")),
        }
    }
}

// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

/// Directories under the manifest dir that hold code we do not own.
const SKIPPED_DIRS: &[&str] = &["target", "examples", ".git"];

fn has_spdx_identifier(file_path: &Path) -> bool {
    let file = fs::File::open(file_path).unwrap();
    let reader = io::BufReader::new(file);
    match reader.lines().next() {
        Some(Ok(first_line)) => first_line.starts_with("// SPDX-License-Identifier: Apache-2.0"),
        _ => false,
    }
}

fn rust_sources(root: &Path) -> Vec<PathBuf> {
    let mut sources = Vec::new();
    let mut dir_worklist: Vec<PathBuf> = vec![root.to_path_buf()];
    while let Some(dir) = dir_worklist.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                let skipped = dir == root
                    && path
                        .file_name()
                        .map_or(false, |name| SKIPPED_DIRS.iter().any(|s| name == *s));
                if !skipped {
                    dir_worklist.push(path);
                }
            } else if path.extension().map_or(false, |ext| ext == "rs") {
                sources.push(path);
            }
        }
    }
    sources
}

#[test]
fn check_all_rust_files_for_spdx() {
    let project_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let sources = rust_sources(project_dir);
    assert!(
        sources.iter().any(|p| p.ends_with("src/lib.rs")),
        "walk found no crate sources under {}",
        project_dir.display()
    );
    let missing: Vec<&PathBuf> = sources.iter().filter(|p| !has_spdx_identifier(p)).collect();
    if !missing.is_empty() {
        panic!(
            "The following files are missing SPDX identifiers: {:?}",
            missing
        );
    }
}

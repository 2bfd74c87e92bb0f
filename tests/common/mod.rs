#![allow(dead_code)]

use std::path::PathBuf;

use dockship::exec::Outcome;
use dockship::fs::mock::MockFileSystem;

pub use dockship_test_utils::{init_tracing, with_timeout};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// The archive path in a `save ... -o <path>` command line.
pub fn save_target(cmd: &str) -> Option<PathBuf> {
    let (_, path) = cmd.rsplit_once(" -o ")?;
    Some(PathBuf::from(path.trim().trim_matches('\'')))
}

/// Responder for a fake runner whose `save` really produces the archive in
/// `fs`, the way the container CLI would.
pub fn saving_into(fs: MockFileSystem, size: u64) -> impl Fn(&str) -> Outcome + Send + Sync {
    move |cmd| {
        if cmd.contains(" save ") {
            if let Some(path) = save_target(cmd) {
                fs.add_file(path, size);
            }
        }
        Outcome::Success
    }
}

/// Poll `cond` every 10ms until it holds; panics after 5 seconds.
pub async fn wait_until<F: FnMut() -> bool>(mut cond: F) {
    with_timeout(async {
        while !cond() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
}

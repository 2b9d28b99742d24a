use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use crate::error::{PatchError, PatchResult};
use crate::patch::Patcher;

/// Apply the patch at `patch_path` to `old_path`, creating `new_path`.
///
/// The new file is created (or truncated) before patching starts. If anything
/// fails afterwards it is removed again, so a failed call never leaves a
/// partial file behind.
pub fn apply_file(
    old_path: impl AsRef<Path>,
    patch_path: impl AsRef<Path>,
    new_path: impl AsRef<Path>,
) -> PatchResult<u64> {
    let (old_path, patch_path, new_path) =
        (old_path.as_ref(), patch_path.as_ref(), new_path.as_ref());

    let patch = fs::read(patch_path).map_err(|e| PatchError::file("read patch file", patch_path, e))?;
    let patcher = Patcher::new(&patch)?;
    let old = File::open(old_path).map_err(|e| PatchError::file("open old file", old_path, e))?;
    let new = File::create(new_path).map_err(|e| PatchError::file("create new file", new_path, e))?;

    log::debug!(
        "patching {} -> {} ({} bytes)",
        old_path.display(),
        new_path.display(),
        patcher.new_size()
    );

    match write_new(&patcher, old, new) {
        Ok(written) => {
            log::debug!("wrote {written} bytes to {}", new_path.display());
            Ok(written)
        }
        Err(err) => {
            log::warn!("patch failed ({err}), removing {}", new_path.display());
            if let Err(e) = fs::remove_file(new_path) {
                log::warn!("could not remove {}: {e}", new_path.display());
            }
            Err(err)
        }
    }
}

fn write_new(patcher: &Patcher<'_>, old: File, new: File) -> PatchResult<u64> {
    let mut out = BufWriter::new(new);
    let written = patcher.apply(old, &mut out)?;
    let file = out
        .into_inner()
        .map_err(|e| PatchError::io("flushing new file", e.into_error()))?;
    file.sync_all()
        .map_err(|e| PatchError::io("syncing new file", e))?;
    Ok(written)
}

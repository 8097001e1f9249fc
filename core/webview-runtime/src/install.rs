//! Moving an extracted runtime into its final installation directory.
//!
//! ## Directory Structure
//!
//! ```text
//! <scratch>/extracted/
//!   Microsoft.WebView2.FixedVersionRuntime.<version>.<arch>/   # payload
//! <output>/
//!   .Microsoft.WebView2.FixedVersionRuntime.<version>.<arch>.staging/   # transient
//!   .Microsoft.WebView2.FixedVersionRuntime.<version>.<arch>.old/       # transient
//!   Microsoft.WebView2.FixedVersionRuntime.<version>.<arch>/   # installed runtime
//! ```
//!
//! The payload is staged next to the destination first. An existing
//! installation is renamed aside to `.old`, the staging directory is renamed
//! into place, and only then is the old copy deleted. If the second rename
//! fails the old copy is renamed back, so the destination always holds either
//! the previous or the new runtime. The previous contents are replaced
//! wholesale, never merged.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::errors::FetchError;
use crate::resolver::InstallationTarget;

/// Installs the extracted payload for `target` into `output_dir`.
///
/// Returns the installed directory, `output_dir/<target>`.
///
/// # Errors
///
/// - `PayloadNotFound` if `extracted_dir/<target>` is missing or not a directory
/// - `Io` if staging, removing the old installation, or the final rename fails
pub fn install_payload(
    extracted_dir: &Path,
    target: &InstallationTarget,
    output_dir: &Path,
) -> Result<PathBuf, FetchError> {
    let payload = extracted_dir.join(target.dir_name());
    if !payload.is_dir() {
        return Err(FetchError::payload_not_found(payload));
    }

    let dest = output_dir.join(target.dir_name());
    let staging = output_dir.join(format!(".{}.staging", target.dir_name()));
    let backup = output_dir.join(format!(".{}.old", target.dir_name()));

    remove_path(&staging)?;
    stage(&payload, &staging)?;

    swap_into_place(&staging, &dest, &backup, |from, to| std::fs::rename(from, to))?;

    debug!("Installed runtime to {}", dest.display());
    Ok(dest)
}

/// Renames `staging` to `dest`, keeping any existing `dest` at `backup` until
/// the new copy is in place.
///
/// On failure `dest` is restored from `backup` and `staging` is removed.
fn swap_into_place(
    staging: &Path,
    dest: &Path,
    backup: &Path,
    rename: impl Fn(&Path, &Path) -> io::Result<()>,
) -> Result<(), FetchError> {
    let rename_error = |from: &Path, to: &Path, e: io::Error| {
        FetchError::io_error(
            format!("failed to rename {} to {}", from.display(), to.display()),
            e,
        )
    };

    let replacing = std::fs::symlink_metadata(dest).is_ok();
    if replacing {
        info!("Replacing existing installation at {}", dest.display());
        remove_path(backup)?;
        rename(dest, backup).map_err(|e| rename_error(dest, backup, e))?;
    }

    if let Err(e) = rename(staging, dest) {
        if replacing && let Err(restore) = rename(backup, dest) {
            warn!(
                "Failed to restore {} from {}: {restore}",
                dest.display(),
                backup.display()
            );
        }
        if let Err(cleanup) = remove_path(staging) {
            warn!("{cleanup}");
        }
        return Err(rename_error(staging, dest, e));
    }

    if replacing && let Err(e) = remove_path(backup) {
        warn!("Previous installation left at {}: {e}", backup.display());
    }
    Ok(())
}

/// Moves `payload` to `staging`, copying when they are on different filesystems.
fn stage(payload: &Path, staging: &Path) -> Result<(), FetchError> {
    match std::fs::rename(payload, staging) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!("Payload is on another filesystem, copying instead of renaming");
            copy_dir_recursive(payload, staging).map_err(|e| {
                FetchError::io_error(
                    format!("failed to copy payload to {}", staging.display()),
                    e,
                )
            })
        }
        Err(e) => Err(FetchError::io_error(
            format!(
                "failed to move {} to {}",
                payload.display(),
                staging.display()
            ),
            e,
        )),
    }
}

/// Removes a file or directory tree. Returns whether anything was removed.
fn remove_path(path: &Path) -> Result<bool, FetchError> {
    let result = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => Err(e),
    };
    result
        .map(|()| true)
        .map_err(|e| FetchError::io_error(format!("failed to remove {}", path.display()), e))
}

/// Recursively copies `src` to `dest`, creating `dest`.
fn copy_dir_recursive(src: &Path, dest: &Path) -> io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::architecture::Architecture;
    use crate::resolver::ResolvedDownload;
    use crate::version::RuntimeVersion;

    fn target() -> InstallationTarget {
        InstallationTarget::new(
            "Foo",
            &ResolvedDownload {
                url: String::new(),
                version: RuntimeVersion::new(1, 2, 3, 4),
                architecture: Architecture::X64,
            },
        )
    }

    fn write_payload(extracted: &Path, files: &[(&str, &str)]) {
        let root = extracted.join(target().dir_name());
        for (name, contents) in files {
            let path = root.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, contents).unwrap();
        }
    }

    fn list_files(dir: &Path) -> Vec<String> {
        let mut files: Vec<String> = WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                e.path()
                    .strip_prefix(dir)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn installs_payload_under_target_name() {
        let scratch = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_payload(scratch.path(), &[("msedgewebview2.exe", "exe")]);

        let dest = install_payload(scratch.path(), &target(), output.path()).unwrap();

        assert_eq!(dest, output.path().join("Foo.1.2.3.4.x64"));
        assert_eq!(
            std::fs::read_to_string(dest.join("msedgewebview2.exe")).unwrap(),
            "exe"
        );
        assert!(!scratch.path().join("Foo.1.2.3.4.x64").exists());
    }

    #[test]
    fn missing_payload_is_payload_not_found() {
        let scratch = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(scratch.path().join("SomethingElse")).unwrap();

        let err = install_payload(scratch.path(), &target(), output.path()).unwrap_err();

        assert!(matches!(err, FetchError::PayloadNotFound { .. }));
        assert!(!output.path().join("Foo.1.2.3.4.x64").exists());
    }

    #[test]
    fn payload_that_is_a_file_is_payload_not_found() {
        let scratch = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(scratch.path().join("Foo.1.2.3.4.x64"), "not a dir").unwrap();

        let err = install_payload(scratch.path(), &target(), output.path()).unwrap_err();
        assert!(matches!(err, FetchError::PayloadNotFound { .. }));
    }

    #[test]
    fn reinstall_replaces_instead_of_merging() {
        let output = tempfile::tempdir().unwrap();

        let first = tempfile::tempdir().unwrap();
        write_payload(
            first.path(),
            &[("a.dll", "old"), ("Locales/fr.pak", "old")],
        );
        install_payload(first.path(), &target(), output.path()).unwrap();

        let second = tempfile::tempdir().unwrap();
        write_payload(second.path(), &[("a.dll", "new"), ("b.dll", "new")]);
        let dest = install_payload(second.path(), &target(), output.path()).unwrap();

        assert_eq!(list_files(&dest), ["a.dll", "b.dll"]);
        assert_eq!(std::fs::read_to_string(dest.join("a.dll")).unwrap(), "new");
    }

    #[test]
    fn repeated_identical_installs_are_idempotent() {
        let output = tempfile::tempdir().unwrap();
        let mut installed = Vec::new();

        for _ in 0..2 {
            let scratch = tempfile::tempdir().unwrap();
            write_payload(scratch.path(), &[("a.dll", "same"), ("sub/b.dll", "same")]);
            let dest = install_payload(scratch.path(), &target(), output.path()).unwrap();
            installed.push(list_files(&dest));
        }

        assert_eq!(installed[0], installed[1]);
        assert_eq!(list_files(output.path()), ["Foo.1.2.3.4.x64/a.dll", "Foo.1.2.3.4.x64/sub/b.dll"]);
    }

    #[test]
    fn leftover_staging_directory_is_replaced() {
        let scratch = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let staging = output.path().join(".Foo.1.2.3.4.x64.staging");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("stale.dll"), "stale").unwrap();
        write_payload(scratch.path(), &[("a.dll", "a")]);

        let dest = install_payload(scratch.path(), &target(), output.path()).unwrap();

        assert_eq!(list_files(&dest), ["a.dll"]);
        assert!(!staging.exists());
    }

    fn write_tree(root: &Path, name: &str, contents: &str) {
        std::fs::create_dir_all(root).unwrap();
        std::fs::write(root.join(name), contents).unwrap();
    }

    #[test]
    fn failed_final_rename_keeps_previous_installation() {
        let output = tempfile::tempdir().unwrap();
        let dest = output.path().join("Foo.1.2.3.4.x64");
        let staging = output.path().join(".Foo.1.2.3.4.x64.staging");
        let backup = output.path().join(".Foo.1.2.3.4.x64.old");
        write_tree(&dest, "a.dll", "old");
        write_tree(&staging, "a.dll", "new");

        let err = swap_into_place(&staging, &dest, &backup, |from, to| {
            if from == staging {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
            } else {
                std::fs::rename(from, to)
            }
        })
        .unwrap_err();

        assert!(matches!(err, FetchError::Io { .. }));
        assert_eq!(std::fs::read_to_string(dest.join("a.dll")).unwrap(), "old");
        assert!(!staging.exists());
        assert!(!backup.exists());
    }

    #[test]
    fn failed_first_install_leaves_nothing_behind() {
        let output = tempfile::tempdir().unwrap();
        let dest = output.path().join("Foo.1.2.3.4.x64");
        let staging = output.path().join(".Foo.1.2.3.4.x64.staging");
        let backup = output.path().join(".Foo.1.2.3.4.x64.old");
        write_tree(&staging, "a.dll", "new");

        swap_into_place(&staging, &dest, &backup, |_, _| {
            Err(io::Error::other("disk gone"))
        })
        .unwrap_err();

        assert_eq!(std::fs::read_dir(output.path()).unwrap().count(), 0);
    }

    #[test]
    fn stale_backup_is_replaced_on_reinstall() {
        let scratch = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_tree(&output.path().join(".Foo.1.2.3.4.x64.old"), "stale.dll", "stale");
        write_tree(&output.path().join("Foo.1.2.3.4.x64"), "a.dll", "old");
        write_payload(scratch.path(), &[("a.dll", "new")]);

        let dest = install_payload(scratch.path(), &target(), output.path()).unwrap();

        assert_eq!(std::fs::read_to_string(dest.join("a.dll")).unwrap(), "new");
        assert_eq!(list_files(output.path()), ["Foo.1.2.3.4.x64/a.dll"]);
    }

    #[test]
    fn copy_dir_recursive_copies_tree() {
        let src = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("x/y")).unwrap();
        std::fs::write(src.path().join("x/y/z.txt"), "z").unwrap();
        std::fs::write(src.path().join("top.txt"), "t").unwrap();

        let target = dest.path().join("copy");
        copy_dir_recursive(src.path(), &target).unwrap();

        assert_eq!(list_files(&target), ["top.txt", "x/y/z.txt"]);
    }
}

//! Writing downloads to disk.
//!
//! Images are large and the network is not always kind, so a download is streamed into a
//! temporary file next to its destination and only renamed into place once every byte has arrived
//! and hit the disk.  Anyone looking at the destination path sees either nothing, whatever was
//! there before, or the complete new file.

use std::{
    ffi::OsStr,
    fs::Permissions,
    io::{self, ErrorKind},
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use indicatif::{ProgressBar, ProgressStyle};
use tempfile::NamedTempFile;
use tokio::{
    io::{AsyncRead, AsyncWriteExt},
    process::Command,
};

use crate::error::Result;

/// Creates the progress bar for a download of `length` bytes (a spinner if unknown).
fn progress_bar(length: Option<u64>, show_progress: bool) -> Result<ProgressBar> {
    if !show_progress {
        return Ok(ProgressBar::hidden());
    }

    Ok(match length {
        Some(length) => ProgressBar::new(length).with_style(
            ProgressStyle::with_template(
                "[eta {eta}] {bar:40.cyan/blue} {decimal_bytes:>7}/{decimal_total_bytes:7} {msg}",
            )?
            .progress_chars("##-"),
        ),
        None => ProgressBar::new_spinner().with_style(ProgressStyle::with_template(
            "{spinner} {decimal_bytes:>7} {msg}",
        )?),
    })
}

/// Creates a temporary file in the directory `path` will live in, ready to be persisted over it.
///
/// The file gets the mode a plain `create()` would give it (0666 minus the umask), not
/// tempfile's usual 0600.
pub(crate) fn tempfile_beside(path: &Path, prefix: &str) -> io::Result<NamedTempFile> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    tempfile::Builder::new()
        .prefix(prefix)
        .permissions(Permissions::from_mode(0o666))
        .tempfile_in(dir)
}

/// Streams `body` into `path`, atomically.
///
/// The data goes to a temporary file in the same directory as `path` which is renamed over `path`
/// once it's complete.  If anything fails along the way the temporary file is removed and `path`
/// is left alone.
pub async fn download_atomically(
    body: impl AsyncRead + Unpin,
    length: Option<u64>,
    path: &Path,
    show_progress: bool,
) -> Result<PathBuf> {
    let tmp = tempfile_beside(path, ".shub-download-")?;

    let bar = progress_bar(length, show_progress)?;
    bar.set_message(path.display().to_string());

    let mut reader = bar.wrap_async_read(body);
    let mut writer = tokio::fs::File::from_std(tmp.as_file().try_clone()?);
    tokio::io::copy(&mut reader, &mut writer).await?;
    writer.flush().await?;
    writer.sync_all().await?;
    drop(writer);

    bar.finish();

    promote(tmp, path)?;
    log::debug!("downloaded {}", path.display());
    Ok(path.to_path_buf())
}

fn promote(tmp: NamedTempFile, path: &Path) -> Result<()> {
    tmp.persist(path).map_err(|err| err.error)?;
    Ok(())
}

/// Strips a trailing `.gz`, which is where `gzip -d` puts its output.
pub fn decompressed_path(path: &Path) -> PathBuf {
    if path.extension() == Some(OsStr::new("gz")) {
        path.with_extension("")
    } else {
        path.to_path_buf()
    }
}

/// Runs `{program} -d -f {path}` to decompress a gzip file in place.
///
/// Returns whether the command ran and succeeded.  Spawn failures (e.g. no such program) count as
/// failures, not errors.
pub async fn gunzip(program: &OsStr, path: &Path) -> bool {
    match Command::new(program).args(["-d", "-f"]).arg(path).status().await {
        Ok(status) if status.success() => true,
        Ok(status) => {
            log::debug!("{program:?} -d -f {path:?}: {status}");
            false
        }
        Err(err) => {
            log::debug!("failed to run {program:?}: {err}");
            false
        }
    }
}

/// Best-effort removal of leftovers from a failed extraction.
pub fn clean_up(paths: &[&Path]) {
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => log::debug!("removed {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => log::warn!("could not remove {}: {err}", path.display()),
        }
    }
}

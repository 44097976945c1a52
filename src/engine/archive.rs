//! Tar payloads shipped to the engine.
//!
//! Two shapes are produced: file payloads extracted at the container root, and
//! image build contexts read from a host directory.

use std::collections::BTreeSet;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::fs_utf8::Dir;
use tar::{Builder, EntryType, Header};

const DIRECTORY_MODE: u32 = 0o755;

/// Regular file mode for injected files.
pub const FILE_MODE: u32 = 0o644;

/// Mode for injected executables.
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Bytes destined for an absolute path inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    destination: Utf8PathBuf,
    mode: u32,
    contents: Vec<u8>,
}

impl FilePayload {
    /// Create a payload. Relative destinations are anchored at `/`.
    #[must_use]
    pub fn new(destination: impl Into<Utf8PathBuf>, mode: u32, contents: Vec<u8>) -> Self {
        let requested = destination.into();
        let absolute = if requested.is_absolute() {
            requested
        } else {
            Utf8Path::new("/").join(requested)
        };
        Self {
            destination: absolute,
            mode,
            contents,
        }
    }

    /// Absolute path inside the container.
    #[must_use]
    pub fn destination(&self) -> &Utf8Path {
        &self.destination
    }

    /// Permission bits applied on extraction.
    #[must_use]
    pub const fn mode(&self) -> u32 {
        self.mode
    }

    /// File contents.
    #[must_use]
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    fn archive_path(&self) -> String {
        normalize(self.destination.as_str().trim_start_matches('/'))
    }
}

/// Archive `payloads` for extraction at `/`.
///
/// Parent directories are emitted once each, ahead of the files inside them.
///
/// # Errors
///
/// Returns any I/O error raised while writing the archive.
pub fn payload_archive(payloads: &[FilePayload]) -> io::Result<Vec<u8>> {
    let mut builder = Builder::new(vec![]);

    let parents: BTreeSet<String> = payloads
        .iter()
        .flat_map(|payload| parent_directories(&payload.archive_path()))
        .collect();
    for parent in &parents {
        append_directory(&mut builder, parent, DIRECTORY_MODE)?;
    }

    for payload in payloads {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(payload.contents.len() as u64);
        header.set_mode(payload.mode);
        header.set_cksum();
        builder.append_data(&mut header, payload.archive_path(), payload.contents.as_slice())?;
    }

    builder.finish()?;
    builder.into_inner()
}

/// Archive the contents of `context` as an image build context.
///
/// A directory's entries are emitted sorted by name, then its subdirectories
/// are walked in that same order, so identical directories produce identical
/// archives. Entries other than files and directories are skipped.
///
/// # Errors
///
/// Returns any I/O error raised while reading the directory or writing the
/// archive.
pub fn build_context_archive(context: &Dir) -> io::Result<Vec<u8>> {
    let mut builder = Builder::new(vec![]);
    let mut pending = vec![(context.try_clone()?, Utf8PathBuf::new())];

    while let Some((dir, prefix)) = pending.pop() {
        let mut names: Vec<(String, bool)> = vec![];
        for entry_result in dir.entries()? {
            let entry = entry_result?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() || file_type.is_file() {
                names.push((entry.file_name()?, file_type.is_dir()));
            }
        }
        names.sort_unstable();

        let mut subdirectories = vec![];
        for (name, is_dir) in names {
            let relative = prefix.join(&name);
            if is_dir {
                append_directory(&mut builder, relative.as_str(), DIRECTORY_MODE)?;
                subdirectories.push((dir.open_dir(&name)?, relative));
            } else {
                let metadata = dir.metadata(&name)?;
                let mut file = dir.open(&name)?;
                let mut header = Header::new_gnu();
                header.set_entry_type(EntryType::Regular);
                header.set_size(metadata.len());
                header.set_mode(host_mode(&metadata));
                header.set_cksum();
                builder.append_data(&mut header, normalize(relative.as_str()), &mut file)?;
            }
        }
        // Reversed so the stack pops subdirectories in lexical order.
        pending.extend(subdirectories.into_iter().rev());
    }

    builder.finish()?;
    builder.into_inner()
}

fn append_directory(builder: &mut Builder<Vec<u8>>, path: &str, mode: u32) -> io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Directory);
    header.set_size(0);
    header.set_mode(mode);
    header.set_cksum();
    builder.append_data(&mut header, format!("{}/", normalize(path)), io::empty())
}

fn parent_directories(archive_path: &str) -> Vec<String> {
    Utf8Path::new(archive_path)
        .ancestors()
        .skip(1)
        .map(Utf8Path::as_str)
        .filter(|ancestor| !ancestor.is_empty())
        .map(String::from)
        .collect()
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}

#[cfg(unix)]
fn host_mode(metadata: &cap_std::fs::Metadata) -> u32 {
    use cap_std::fs::PermissionsExt;

    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn host_mode(_metadata: &cap_std::fs::Metadata) -> u32 {
    FILE_MODE
}

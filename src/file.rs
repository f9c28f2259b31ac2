//! File module.
//!
//! Output files are written to a `.tmp` sibling first, then renamed
//! over the final path, so an interrupted run never leaves a
//! truncated file behind.

use log::trace;
use std::{
    ffi::OsString,
    fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Returns the temporary sibling of the given path.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes the file through the given closure, then moves it in place.
/// On failure the final path is left untouched.
pub fn write_atomically<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut BufWriter<fs::File>) -> io::Result<()>,
{
    let tmp = tmp_path(path);
    trace!("writing {:?} through {:?}", path, tmp);

    let res = fs::File::create(&tmp).and_then(|file| {
        let mut file = BufWriter::new(file);
        write(&mut file)?;
        file.flush()?;
        file.get_ref().sync_all()
    });

    match res.and_then(|()| fs::rename(&tmp, path)) {
        Ok(()) => Ok(()),
        Err(err) => {
            if let Err(err) = fs::remove_file(&tmp) {
                trace!("cannot remove temporary file {:?}: {}", tmp, err);
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, io::Write, path::Path};
    use tempfile::tempdir;

    use super::{tmp_path, write_atomically};

    #[test]
    fn tmp_sibling() {
        assert_eq!(
            Path::new("/out/ids.txt.tmp"),
            tmp_path(Path::new("/out/ids.txt"))
        );
    }

    #[test]
    fn replaces_file_on_success() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "old\n").unwrap();

        write_atomically(&path, |file| writeln!(file, "new")).unwrap();

        assert_eq!("new\n", fs::read_to_string(&path).unwrap());
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn keeps_file_on_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "old\n").unwrap();

        let res = write_atomically(&path, |file| {
            writeln!(file, "partial")?;
            Err(std::io::Error::new(std::io::ErrorKind::Other, "interrupted"))
        });

        assert!(res.is_err());
        assert_eq!("old\n", fs::read_to_string(&path).unwrap());
        assert!(!tmp_path(&path).exists());
    }
}

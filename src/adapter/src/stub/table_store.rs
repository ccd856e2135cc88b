use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use common::prelude::*;

/// Durable storage behind one stub table.
pub trait TableStore {
    /// Where the table lives; returned to callers as the table address.
    fn location(&self) -> String;

    fn exists(&self) -> bool;

    /// Creates an empty table. Fails if it already exists.
    fn create(&self) -> Result<(), ChainError>;

    fn destroy(&self) -> Result<(), ChainError>;

    /// Inserts or overwrites all entries of `batch` in one replacement.
    fn put_batch(&self, batch: &Batch) -> Result<(), ChainError>;

    fn get(&self, key: &Bytes) -> Result<Option<Bytes>, ChainError>;

    fn scan(&self) -> Result<Batch, ChainError>;

    /// Returns whether `key` was present.
    fn remove(&self, key: &Bytes) -> Result<bool, ChainError>;
}

/// Text file with alternating lines of hex-encoded key and value.
///
/// Writes stream the current file into `<table>_tmp.txt`, skipping
/// overwritten or removed keys, and rename it over the original.
/// Concurrent writers to the same table may lose updates.
#[derive(Debug, Clone)]
pub struct HexLineFile {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl HexLineFile {
    pub fn for_table<P: AsRef<Path>>(data_path: P, table: &str) -> Result<Self, ChainError> {
        if table.is_empty() || table.contains(['/', '\\']) || table == "." || table == ".." {
            return Err(ChainError::InvalidOperation(format!(
                "'{}' is not a valid table name",
                table
            )));
        }
        let dir = data_path.as_ref();
        Ok(HexLineFile {
            path: dir.join(format!("{}.txt", table)),
            tmp_path: dir.join(format!("{}_tmp.txt", table)),
        })
    }

    fn open(&self) -> Result<BufReader<File>, ChainError> {
        match File::open(&self.path) {
            Ok(f) => Ok(BufReader::new(f)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ChainError::NotFound(
                format!("table file {} does not exist", self.path.display()),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Calls `f` with every (hex key, hex value) line pair, in file order.
    fn for_each_pair<F>(&self, mut f: F) -> Result<(), ChainError>
    where
        F: FnMut(&str, &str) -> Result<(), ChainError>,
    {
        let mut lines = self.open()?.lines();
        while let Some(key) = lines.next() {
            let key = key?;
            let value = lines.next().ok_or_else(|| {
                ChainError::DecodeError(format!(
                    "key {} without value in {}",
                    key,
                    self.path.display()
                ))
            })??;
            f(key.trim(), value.trim())?;
        }
        Ok(())
    }

    /// Rewrites the table, keeping old pairs whose key `keep` accepts and
    /// appending `extra`.
    fn rewrite<F>(&self, mut keep: F, extra: &Batch) -> Result<(), ChainError>
    where
        F: FnMut(&Bytes) -> bool,
    {
        let mut out = BufWriter::new(File::create(&self.tmp_path)?);
        let copied = self.for_each_pair(|k, v| {
            if keep(&Bytes::from_hex(k)?) {
                writeln!(out, "{}", k)?;
                writeln!(out, "{}", v)?;
            }
            Ok(())
        });
        let result = copied.and_then(|_| {
            for (k, v) in extra {
                writeln!(out, "{}", k.to_hex())?;
                writeln!(out, "{}", v.to_hex())?;
            }
            let file = out.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            Ok(())
        });
        match result {
            Ok(()) => {
                fs::rename(&self.tmp_path, &self.path)?;
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&self.tmp_path);
                Err(e)
            }
        }
    }
}

impl TableStore for HexLineFile {
    fn location(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn create(&self) -> Result<(), ChainError> {
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(
                ChainError::AlreadyExists(format!("table file {} exists", self.path.display())),
            ),
            Err(e) => Err(e.into()),
        }
    }

    fn destroy(&self) -> Result<(), ChainError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ChainError::NotFound(
                format!("table file {} does not exist", self.path.display()),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn put_batch(&self, batch: &Batch) -> Result<(), ChainError> {
        let keys: HashSet<&Bytes> = batch.keys().collect();
        self.rewrite(|k| !keys.contains(k), batch)
    }

    fn get(&self, key: &Bytes) -> Result<Option<Bytes>, ChainError> {
        let mut found = None;
        self.for_each_pair(|k, v| {
            if &Bytes::from_hex(k)? == key {
                found = Some(Bytes::from_hex(v)?);
            }
            Ok(())
        })?;
        Ok(found)
    }

    fn scan(&self) -> Result<Batch, ChainError> {
        let mut all = Batch::new();
        self.for_each_pair(|k, v| {
            all.insert(Bytes::from_hex(k)?, Bytes::from_hex(v)?);
            Ok(())
        })?;
        Ok(all)
    }

    fn remove(&self, key: &Bytes) -> Result<bool, ChainError> {
        let mut found = false;
        self.rewrite(
            |k| {
                if k == key {
                    found = true;
                    false
                } else {
                    true
                }
            },
            &Batch::new(),
        )?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn batch_of(pairs: &[(&str, &str)]) -> Batch {
        pairs
            .iter()
            .map(|(k, v)| (Bytes::from(*k), Bytes::from(*v)))
            .collect()
    }

    #[test]
    fn test_file_layout() {
        let dir = tempdir().unwrap();
        let table = HexLineFile::for_table(dir.path(), "t").unwrap();
        table.create().unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("t.txt")).unwrap(), "");

        table.put_batch(&batch_of(&[("AAAA", "1111")])).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("t.txt")).unwrap(),
            "41414141\n31313131\n"
        );
        assert!(!dir.path().join("t_tmp.txt").exists());
    }

    #[test]
    fn test_overwrite_and_remove() {
        let dir = tempdir().unwrap();
        let table = HexLineFile::for_table(dir.path(), "t").unwrap();
        table.create().unwrap();
        table
            .put_batch(&batch_of(&[("a", "1"), ("b", "2")]))
            .unwrap();
        table.put_batch(&batch_of(&[("a", "3")])).unwrap();
        assert_eq!(table.get(&Bytes::from("a")).unwrap(), Some(Bytes::from("3")));
        assert_eq!(table.scan().unwrap().len(), 2);

        assert!(table.remove(&Bytes::from("a")).unwrap());
        assert!(!table.remove(&Bytes::from("a")).unwrap());
        assert_eq!(table.get(&Bytes::from("a")).unwrap(), None);
        assert_eq!(table.scan().unwrap(), batch_of(&[("b", "2")]));
    }

    #[test]
    fn test_missing_and_duplicate_tables() {
        let dir = tempdir().unwrap();
        let table = HexLineFile::for_table(dir.path(), "t").unwrap();
        assert!(!table.exists());
        assert!(matches!(table.scan(), Err(ChainError::NotFound(_))));
        assert!(matches!(table.destroy(), Err(ChainError::NotFound(_))));
        table.create().unwrap();
        assert!(matches!(
            table.create(),
            Err(ChainError::AlreadyExists(_))
        ));
        table.destroy().unwrap();
        assert!(!table.exists());
        assert!(HexLineFile::for_table(dir.path(), "../t").is_err());
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempdir().unwrap();
        let table = HexLineFile::for_table(dir.path(), "t").unwrap();
        fs::write(dir.path().join("t.txt"), "4141\n").unwrap();
        assert!(matches!(table.scan(), Err(ChainError::DecodeError(_))));

        fs::write(dir.path().join("t.txt"), "zz\n4141\n").unwrap();
        assert!(matches!(
            table.put_batch(&batch_of(&[("a", "1")])),
            Err(ChainError::DecodeError(_))
        ));
        // The original file survives a failed rewrite.
        assert_eq!(
            fs::read_to_string(dir.path().join("t.txt")).unwrap(),
            "zz\n4141\n"
        );
        assert!(!dir.path().join("t_tmp.txt").exists());
    }
}

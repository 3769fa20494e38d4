use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::error::{FileError, FileResult};

/// A single backing file addressed in fixed-size pages.
///
/// Page `n` lives at byte offset `n * page_size`. The file length is always a
/// multiple of the page size; it only grows one page at a time.
pub struct PagedFile {
    file: Mutex<File>,
    path: PathBuf,
    page_size: usize,
}

impl PagedFile {
    /// Create a new, empty file
    pub fn create<P: AsRef<Path>>(path: P, page_size: usize) -> FileResult<Self> {
        let path = path.as_ref();

        if path.exists() {
            return Err(FileError::FileAlreadyExists(path.display().to_string()));
        }

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        File::create(path)?;
        Self::open(path, page_size)
    }

    /// Open an existing file
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> FileResult<Self> {
        let path_ref = path.as_ref();
        let path = path_ref
            .canonicalize()
            .map_err(|_| FileError::FileNotFound(path_ref.display().to_string()))?;

        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let paged = Self {
            file: Mutex::new(file),
            path,
            page_size,
        };

        // Reject misaligned files up front
        paged.num_pages()?;
        Ok(paged)
    }

    /// Open the file, creating it first if it does not exist
    pub fn open_or_create<P: AsRef<Path>>(path: P, page_size: usize) -> FileResult<Self> {
        if path.as_ref().exists() {
            Self::open(path, page_size)
        } else {
            Self::create(path, page_size)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Get the number of pages in the file
    pub fn num_pages(&self) -> FileResult<usize> {
        let file = self.file.lock();
        self.page_count(&file)
    }

    fn page_count(&self, file: &File) -> FileResult<usize> {
        let len = file.metadata()?.len();
        if len % self.page_size as u64 != 0 {
            return Err(FileError::MisalignedFile {
                len,
                page_size: self.page_size,
            });
        }
        Ok((len / self.page_size as u64) as usize)
    }

    fn check_buffer(&self, len: usize) -> FileResult<()> {
        if len != self.page_size {
            return Err(FileError::InvalidPageSize {
                expected: self.page_size,
                actual: len,
            });
        }
        Ok(())
    }

    /// Read a full page into `buffer`
    pub fn read_page(&self, page_number: usize, buffer: &mut [u8]) -> FileResult<()> {
        self.check_buffer(buffer.len())?;

        let mut file = self.file.lock();
        let num_pages = self.page_count(&file)?;
        if page_number >= num_pages {
            return Err(FileError::PageOutOfRange {
                page_number,
                num_pages,
            });
        }

        let offset = (page_number * self.page_size) as u64;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buffer)?;
        Ok(())
    }

    /// Overwrite a full page. Writing at `num_pages` grows the file by one page.
    pub fn write_page(&self, page_number: usize, buffer: &[u8]) -> FileResult<()> {
        self.check_buffer(buffer.len())?;

        let mut file = self.file.lock();
        let num_pages = self.page_count(&file)?;
        if page_number > num_pages {
            return Err(FileError::PageOutOfRange {
                page_number,
                num_pages,
            });
        }

        let offset = (page_number * self.page_size) as u64;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buffer)?;
        Ok(())
    }

    /// Append one page at the end of the file and return its page number.
    /// Concurrent appends are serialized by the file lock.
    pub fn append_page(&self, buffer: &[u8]) -> FileResult<usize> {
        self.check_buffer(buffer.len())?;

        let mut file = self.file.lock();
        let page_number = self.page_count(&file)?;
        file.seek(SeekFrom::Start((page_number * self.page_size) as u64))?;
        file.write_all(buffer)?;
        Ok(page_number)
    }

    /// Sync the file to disk (flush all OS buffers)
    pub fn sync(&self) -> FileResult<()> {
        self.file.lock().sync_data()?;
        Ok(())
    }
}

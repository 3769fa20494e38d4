//! The write-ahead log consumed by the buffer pool at commit.

use crc32fast::Hasher;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::file::PageId;
use crate::lock::TransactionId;

/// Durability primitives the buffer pool needs from a log.
pub trait LogFile: Send + Sync {
    /// Append an update record pairing a page's before and after images.
    fn log_write(
        &self,
        tid: TransactionId,
        page_id: PageId,
        before: &[u8],
        after: &[u8],
    ) -> io::Result<()>;

    /// Make every record written so far durable.
    fn force(&self) -> io::Result<()>;
}

/// A page update as stored in the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRecord {
    pub tid: TransactionId,
    pub page_id: PageId,
    pub before: Vec<u8>,
    pub after: Vec<u8>,
}

// total_len (u32) + crc (u32)
const RECORD_HEADER_LEN: usize = 8;

/// Append-only log file.
///
/// Record layout, big endian:
/// `[total_len u32][crc32 u32][tid u64][table_id u32][page_number u64]
///  [before_len u32][before][after_len u32][after]`
/// where the crc covers everything after the crc field.
pub struct WriteAheadLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl WriteAheadLog {
    /// Opens the log file, creating it if needed; new records go to the end.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(path.as_ref())?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.as_ref().to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(tid: TransactionId, page_id: PageId, before: &[u8], after: &[u8]) -> Vec<u8> {
        let mut body = Vec::with_capacity(32 + before.len() + after.len());
        body.extend_from_slice(&tid.as_u64().to_be_bytes());
        body.extend_from_slice(&page_id.table_id.to_be_bytes());
        body.extend_from_slice(&(page_id.page_number as u64).to_be_bytes());
        body.extend_from_slice(&(before.len() as u32).to_be_bytes());
        body.extend_from_slice(before);
        body.extend_from_slice(&(after.len() as u32).to_be_bytes());
        body.extend_from_slice(after);

        let mut hasher = Hasher::new();
        hasher.update(&body);
        let crc = hasher.finalize();

        let total_len = (RECORD_HEADER_LEN + body.len()) as u32;
        let mut record = Vec::with_capacity(total_len as usize);
        record.extend_from_slice(&total_len.to_be_bytes());
        record.extend_from_slice(&crc.to_be_bytes());
        record.extend_from_slice(&body);
        record
    }

    fn decode(body: &[u8]) -> Option<UpdateRecord> {
        let u32_at = |at: usize| -> Option<u32> {
            Some(u32::from_be_bytes(body.get(at..at + 4)?.try_into().ok()?))
        };
        let u64_at = |at: usize| -> Option<u64> {
            Some(u64::from_be_bytes(body.get(at..at + 8)?.try_into().ok()?))
        };

        let tid = TransactionId::from_raw(u64_at(0)?);
        let page_id = PageId::new(u32_at(8)?, u64_at(12)? as usize);
        let before_len = u32_at(20)? as usize;
        let before = body.get(24..24 + before_len)?.to_vec();
        let after_at = 24 + before_len;
        let after_len = u32_at(after_at)? as usize;
        let after = body.get(after_at + 4..after_at + 4 + after_len)?.to_vec();

        Some(UpdateRecord {
            tid,
            page_id,
            before,
            after,
        })
    }

    /// Read back every intact record. Reading stops at the first torn or
    /// corrupt record, which can only be the unforced tail.
    pub fn read_all(&self) -> io::Result<Vec<UpdateRecord>> {
        self.writer.lock().flush()?;

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(0))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let mut records = Vec::new();
        let mut offset = 0;
        while offset + RECORD_HEADER_LEN <= bytes.len() {
            let total_len =
                u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap_or_default())
                    as usize;
            let crc = u32::from_be_bytes(
                bytes[offset + 4..offset + 8]
                    .try_into()
                    .unwrap_or_default(),
            );
            if total_len < RECORD_HEADER_LEN || offset + total_len > bytes.len() {
                log::warn!("torn log record at offset {}", offset);
                break;
            }

            let body = &bytes[offset + RECORD_HEADER_LEN..offset + total_len];
            if crc32fast::hash(body) != crc {
                log::warn!("log record checksum mismatch at offset {}", offset);
                break;
            }
            match Self::decode(body) {
                Some(record) => records.push(record),
                None => break,
            }
            offset += total_len;
        }

        Ok(records)
    }
}

impl LogFile for WriteAheadLog {
    fn log_write(
        &self,
        tid: TransactionId,
        page_id: PageId,
        before: &[u8],
        after: &[u8],
    ) -> io::Result<()> {
        let record = Self::encode(tid, page_id, before, after);
        self.writer.lock().write_all(&record)
    }

    fn force(&self) -> io::Result<()> {
        let mut writer = self.writer.lock();
        writer.flush()?;
        writer.get_ref().sync_data()
    }
}

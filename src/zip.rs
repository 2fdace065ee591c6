//! Zip archive reader (C3): central-directory walk plus raw DEFLATE
//! inflate, used to unpack xlsx/ods/gnumeric packages.
//!
//! Grounded in the teacher's `StreamingZipReader`
//! (`src/fast_writer/streaming_zip_reader.rs`): same central-directory walk
//! and local-header re-read, generalized per spec §4.3 to use the *local*
//! header's filename/extra-field lengths (which may differ from the
//! central directory's) when computing the data offset, and to surface
//! failures as `ImportError::Zip` rather than a bespoke `ReadError`.

use crate::error::{ImportError, Result};
use flate2::read::DeflateDecoder;
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};

const END_OF_CENTRAL_DIR_SIGNATURE: u32 = 0x0605_4b50;
const CENTRAL_DIR_SIGNATURE: u32 = 0x0201_4b50;
const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0403_4b50;

/// One entry in the central directory (spec §4.3 step 3).
#[derive(Debug, Clone)]
pub struct ZipEntry {
    pub name: String,
    pub compression_method: u16,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub local_header_offset: u64,
}

/// A random-access zip archive reader over any `Read + Seek` stream.
pub struct ZipArchive<R> {
    stream: R,
    entries: Vec<ZipEntry>,
    by_name: HashMap<String, usize>,
}

impl<R: Read + Seek> ZipArchive<R> {
    /// Locate the central directory and enumerate its entries (spec §4.3
    /// steps 1-4).
    pub fn open(mut stream: R) -> Result<Self> {
        let eocd_offset = find_end_of_central_dir(&mut stream)?;
        stream.seek(SeekFrom::Start(eocd_offset))?;

        let signature = read_u32_le(&mut stream)?;
        if signature != END_OF_CENTRAL_DIR_SIGNATURE {
            return Err(ImportError::zip("end-of-central-directory signature mismatch"));
        }
        skip_bytes(&mut stream, 4)?; // this-disk-id, central-dir-disk-id
        skip_bytes(&mut stream, 2)?; // local record count (this disk)
        let total_entries = read_u16_le(&mut stream)? as usize;
        skip_bytes(&mut stream, 4)?; // central directory size
        let central_dir_offset = read_u32_le(&mut stream)? as u64;

        stream.seek(SeekFrom::Start(central_dir_offset))?;
        let mut entries = Vec::with_capacity(total_entries);
        let mut by_name = HashMap::with_capacity(total_entries);
        for _ in 0..total_entries {
            let signature = read_u32_le(&mut stream)?;
            if signature != CENTRAL_DIR_SIGNATURE {
                return Err(ImportError::zip("central directory record signature mismatch"));
            }
            skip_bytes(&mut stream, 4)?; // version made by, version needed
            skip_bytes(&mut stream, 2)?; // general purpose flags
            let compression_method = read_u16_le(&mut stream)?;
            skip_bytes(&mut stream, 4)?; // mod time/date
            skip_bytes(&mut stream, 4)?; // crc-32
            let compressed_size = read_u32_le(&mut stream)? as u64;
            let uncompressed_size = read_u32_le(&mut stream)? as u64;
            let filename_len = read_u16_le(&mut stream)? as usize;
            let extra_len = read_u16_le(&mut stream)? as usize;
            let comment_len = read_u16_le(&mut stream)? as usize;
            skip_bytes(&mut stream, 2)?; // disk id
            skip_bytes(&mut stream, 2)?; // internal attrs
            skip_bytes(&mut stream, 4)?; // external attrs
            let local_header_offset = read_u32_le(&mut stream)? as u64;

            let mut name_buf = vec![0u8; filename_len];
            stream.read_exact(&mut name_buf)?;
            let name = String::from_utf8_lossy(&name_buf).into_owned();

            skip_bytes(&mut stream, (extra_len + comment_len) as i64)?;

            let index = entries.len();
            by_name.insert(name.clone(), index);
            entries.push(ZipEntry {
                name,
                compression_method,
                compressed_size,
                uncompressed_size,
                local_header_offset,
            });
        }

        Ok(ZipArchive { stream, entries, by_name })
    }

    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&ZipEntry> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Read and decompress one entry fully into memory (spec §4.3 step 4).
    pub fn read_file_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .entry(name)
            .ok_or_else(|| ImportError::zip(format!("no such entry: {name}")))?
            .clone();
        self.read_entry(&entry)
    }

    fn read_entry(&mut self, entry: &ZipEntry) -> Result<Vec<u8>> {
        self.stream.seek(SeekFrom::Start(entry.local_header_offset))?;
        let signature = read_u32_le(&mut self.stream)?;
        if signature != LOCAL_FILE_HEADER_SIGNATURE {
            return Err(ImportError::zip("local file header signature mismatch"));
        }
        skip_bytes(&mut self.stream, 2)?; // version needed
        skip_bytes(&mut self.stream, 2)?; // general purpose flags
        skip_bytes(&mut self.stream, 2)?; // compression method (already known)
        skip_bytes(&mut self.stream, 4)?; // mod time/date
        skip_bytes(&mut self.stream, 4)?; // crc-32
        skip_bytes(&mut self.stream, 4)?; // compressed size
        skip_bytes(&mut self.stream, 4)?; // uncompressed size
        // Local header lengths gate the data offset; they may differ from
        // the central directory's record for the same entry (spec §4.3).
        let filename_len = read_u16_le(&mut self.stream)? as i64;
        let extra_len = read_u16_le(&mut self.stream)? as i64;
        skip_bytes(&mut self.stream, filename_len + extra_len)?;

        let mut compressed = vec![0u8; entry.compressed_size as usize];
        self.stream.read_exact(&mut compressed)?;

        match entry.compression_method {
            0 => Ok(compressed),
            8 => {
                // Raw DEFLATE, no zlib/gzip wrapper (window bits = -15).
                let mut decoder = DeflateDecoder::new(&compressed[..]);
                let mut out = Vec::with_capacity(entry.uncompressed_size as usize);
                decoder
                    .read_to_end(&mut out)
                    .map_err(|e| ImportError::zip(format!("deflate failure: {e}")))?;
                if out.len() as u64 != entry.uncompressed_size {
                    return Err(ImportError::zip(format!(
                        "inflated size mismatch for {}: expected {}, got {}",
                        entry.name,
                        entry.uncompressed_size,
                        out.len()
                    )));
                }
                Ok(out)
            }
            other => Err(ImportError::zip(format!("unsupported compression method: {other}"))),
        }
    }
}

/// Scan backwards from the end of the stream for the
/// end-of-central-directory signature, within the maximum possible
/// `22 + 0xFFFF`-byte window (spec §4.3 step 1).
fn find_end_of_central_dir<R: Read + Seek>(stream: &mut R) -> Result<u64> {
    let file_size = stream.seek(SeekFrom::End(0))?;
    const EOCD_MIN_SIZE: u64 = 22;
    const MAX_COMMENT_LEN: u64 = 0xFFFF;
    let search_window = (EOCD_MIN_SIZE + MAX_COMMENT_LEN).min(file_size);
    let search_start = file_size - search_window;

    stream.seek(SeekFrom::Start(search_start))?;
    let mut buf = vec![0u8; search_window as usize];
    stream.read_exact(&mut buf)?;

    for i in (0..buf.len().saturating_sub(3)).rev() {
        if buf[i] == 0x50 && buf[i + 1] == 0x4b && buf[i + 2] == 0x05 && buf[i + 3] == 0x06 {
            return Ok(search_start + i as u64);
        }
    }
    Err(ImportError::zip("end of central directory record not found"))
}

fn read_u16_le<R: Read>(r: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32_le<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn skip_bytes<R: Seek>(r: &mut R, n: i64) -> Result<()> {
    r.seek(SeekFrom::Current(n))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::io::Write as _;

    /// Build a minimal single-entry zip in memory with `method` (0 =
    /// stored, 8 = deflated) so tests don't depend on external fixtures.
    fn build_zip(name: &str, data: &[u8], deflate: bool) -> Vec<u8> {
        let (method, payload): (u16, Vec<u8>) = if deflate {
            use flate2::write::DeflateEncoder;
            use flate2::Compression;
            let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
            enc.write_all(data).unwrap();
            (8, enc.finish().unwrap())
        } else {
            (0, data.to_vec())
        };

        let mut out = Vec::new();
        let local_header_offset = 0u32;

        // Local file header.
        out.extend_from_slice(&LOCAL_FILE_HEADER_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&method.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // mod time
        out.extend_from_slice(&0u16.to_le_bytes()); // mod date
        out.extend_from_slice(&0u32.to_le_bytes()); // crc32 (unchecked by reader)
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // extra len
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&payload);

        let central_dir_offset = out.len() as u32;

        out.extend_from_slice(&CENTRAL_DIR_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes()); // version made by
        out.extend_from_slice(&20u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&method.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // mod time
        out.extend_from_slice(&0u16.to_le_bytes()); // mod date
        out.extend_from_slice(&0u32.to_le_bytes()); // crc32
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // extra len
        out.extend_from_slice(&0u16.to_le_bytes()); // comment len
        out.extend_from_slice(&0u16.to_le_bytes()); // disk number
        out.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        out.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        out.extend_from_slice(&local_header_offset.to_le_bytes());
        out.extend_from_slice(name.as_bytes());

        let central_dir_size = out.len() as u32 - central_dir_offset;

        out.extend_from_slice(&END_OF_CENTRAL_DIR_SIGNATURE.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // this disk
        out.extend_from_slice(&0u16.to_le_bytes()); // central dir disk
        out.extend_from_slice(&1u16.to_le_bytes()); // entries this disk
        out.extend_from_slice(&1u16.to_le_bytes()); // total entries
        out.extend_from_slice(&central_dir_size.to_le_bytes());
        out.extend_from_slice(&central_dir_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // comment length

        out
    }

    #[test]
    fn round_trips_stored_entry_bit_identical() {
        let data = b"hello, stored world";
        let zip_bytes = build_zip("hello.txt", data, false);
        let mut archive = ZipArchive::open(Cursor::new(zip_bytes)).unwrap();
        let read_back = archive.read_file_entry("hello.txt").unwrap();
        assert_eq!(read_back, data);
    }

    #[test]
    fn round_trips_deflated_entry() {
        let data = b"hello, deflated world, deflated, deflated, deflated";
        let zip_bytes = build_zip("hello.txt", data, true);
        let mut archive = ZipArchive::open(Cursor::new(zip_bytes)).unwrap();
        let read_back = archive.read_file_entry("hello.txt").unwrap();
        assert_eq!(read_back, data);
    }

    #[test]
    fn missing_entry_is_zip_error() {
        let zip_bytes = build_zip("a.txt", b"x", false);
        let mut archive = ZipArchive::open(Cursor::new(zip_bytes)).unwrap();
        let err = archive.read_file_entry("missing.txt").unwrap_err();
        assert!(matches!(err, ImportError::Zip(_)));
    }

    #[test]
    fn eocd_found_at_filesize_minus_22_with_empty_comment() {
        let zip_bytes = build_zip("a.txt", b"x", false);
        let eocd = find_end_of_central_dir(&mut Cursor::new(&zip_bytes)).unwrap();
        assert_eq!(eocd as usize, zip_bytes.len() - 22);
    }
}

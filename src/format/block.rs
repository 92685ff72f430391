//! Binary block encoding.
//!
//! A block file is a sequence of frames. Every frame starts with a fixed
//! 10-byte prefix:
//!
//! ```text
//! kind: u8 | flags: u8 | raw_size: u32 LE | data_size: u32 LE | data
//! ```
//!
//! The first frame is the header frame (magic, version, header options).
//! Each following data frame holds one block: its string table, then the
//! records with fields stored as string table ids.

use bitflags::bitflags;
use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;

use super::options::{BlockOptions, Compression};
use super::varint::{read_varint, write_varint, zigzag_decode, zigzag_encode};
use super::MAX_UNCOMPRESSED_BLOCK_SIZE;
use crate::io::{Buffer, Header, Output, OutputQueue, Payload, Record};
use crate::strings::StringTable;
use crate::{Error, Result};

/// Magic bytes opening the header frame.
pub const MAGIC: [u8; 8] = *b"GEOBLK\x00\x01";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Size of the prefix in front of every frame.
pub const FRAME_PREFIX_SIZE: usize = 10;

/// Frame types.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Header = 0x01,
    Data = 0x02,
}

impl FrameKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(FrameKind::Header),
            0x02 => Some(FrameKind::Data),
            _ => None,
        }
    }
}

bitflags! {
    /// Per-frame flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FrameFlags: u8 {
        /// Data is zlib compressed.
        const ZLIB = 0b00000001;
        /// Data is LZ4 compressed.
        const LZ4 = 0b00000010;
    }
}

fn compress(raw: Vec<u8>, options: &BlockOptions) -> Result<(FrameFlags, Vec<u8>)> {
    match options.compression {
        Compression::None => Ok((FrameFlags::empty(), raw)),
        Compression::Zlib => {
            let mut encoder = flate2::write::ZlibEncoder::new(
                Vec::with_capacity(raw.len() / 2),
                flate2::Compression::new(options.level),
            );
            encoder
                .write_all(&raw)
                .map_err(|e| Error::Encode(format!("zlib: {}", e)))?;
            let data = encoder
                .finish()
                .map_err(|e| Error::Encode(format!("zlib: {}", e)))?;
            Ok((FrameFlags::ZLIB, data))
        }
        #[cfg(feature = "compression")]
        Compression::Lz4 => Ok((FrameFlags::LZ4, lz4_flex::compress(&raw))),
    }
}

fn decompress(flags: FrameFlags, data: Vec<u8>, raw_size: usize) -> Result<Vec<u8>> {
    if flags.contains(FrameFlags::ZLIB | FrameFlags::LZ4) {
        return Err(Error::Decode("frame has more than one codec".to_string()));
    }

    if flags.contains(FrameFlags::ZLIB) {
        let mut raw = Vec::with_capacity(raw_size);
        flate2::read::ZlibDecoder::new(&data[..])
            .take(raw_size as u64 + 1)
            .read_to_end(&mut raw)
            .map_err(|e| Error::Decode(format!("zlib: {}", e)))?;
        return Ok(raw);
    }

    if flags.contains(FrameFlags::LZ4) {
        #[cfg(feature = "compression")]
        {
            return lz4_flex::decompress(&data, raw_size)
                .map_err(|e| Error::Decode(format!("lz4: {}", e)));
        }
        #[cfg(not(feature = "compression"))]
        {
            return Err(Error::Decode(
                "lz4 frame found but the compression feature is disabled".to_string(),
            ));
        }
    }

    Ok(data)
}

/// Build a complete frame around `raw`.
fn encode_frame(kind: FrameKind, raw: Vec<u8>, options: &BlockOptions) -> Result<Vec<u8>> {
    if raw.len() > MAX_UNCOMPRESSED_BLOCK_SIZE as usize {
        return Err(Error::Encode(format!(
            "block of {} bytes exceeds the {} byte limit",
            raw.len(),
            MAX_UNCOMPRESSED_BLOCK_SIZE
        )));
    }
    let raw_size = raw.len() as u32;
    let (flags, data) = compress(raw, options)?;
    let data_size = u32::try_from(data.len())
        .map_err(|_| Error::Encode("compressed block too large".to_string()))?;

    let mut frame = Vec::with_capacity(FRAME_PREFIX_SIZE + data.len());
    frame.push(kind as u8);
    frame.push(flags.bits());
    frame.extend_from_slice(&raw_size.to_le_bytes());
    frame.extend_from_slice(&data_size.to_le_bytes());
    frame.extend_from_slice(&data);
    Ok(frame)
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    write_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode the header frame. Header frames are never compressed.
pub fn encode_header(header: &Header) -> Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(64);
    raw.extend_from_slice(&MAGIC);
    raw.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    write_varint(&mut raw, header.len() as u64);
    for (key, value) in header.iter() {
        write_bytes(&mut raw, key.as_bytes());
        write_bytes(&mut raw, value.as_bytes());
    }
    encode_frame(
        FrameKind::Header,
        raw,
        &BlockOptions::with_compression(Compression::None),
    )
}

/// Encode `records` as one data frame.
///
/// Fails with [`Error::TableOverflow`] if the records use more distinct
/// strings than `options.max_string_table_entries`, and with
/// [`Error::Config`] if `options` do not validate.
pub fn encode_block(records: &[Record], options: &BlockOptions) -> Result<Vec<u8>> {
    options.validate()?;
    let mut table =
        StringTable::with_limits(options.string_chunk_size, options.max_string_table_entries);

    let mut body = Vec::with_capacity(records.len() * 8);
    write_varint(&mut body, records.len() as u64);
    let mut last_id = 0i64;
    for record in records {
        write_varint(&mut body, zigzag_encode(record.id.wrapping_sub(last_id)));
        last_id = record.id;

        write_varint(&mut body, record.fields.len() as u64);
        for field in &record.fields {
            if field.len() >= options.string_chunk_size {
                return Err(Error::Encode(format!(
                    "field of {} bytes in record {} exceeds the string chunk size",
                    field.len(),
                    record.id
                )));
            }
            if field.as_bytes().contains(&0) {
                return Err(Error::Encode(format!(
                    "field in record {} contains a NUL byte",
                    record.id
                )));
            }
            write_varint(&mut body, u64::from(table.add(field)?));
        }
    }

    let mut raw = Vec::with_capacity(body.len() + table.len() * 8);
    write_varint(&mut raw, table.len() as u64);
    for s in &table {
        raw.extend_from_slice(s.as_bytes());
        raw.push(0);
    }
    raw.extend_from_slice(&body);

    encode_frame(FrameKind::Data, raw, options)
}

/// Decode the uncompressed contents of a data frame.
pub fn decode_block(raw: &[u8]) -> Result<Buffer> {
    let mut input = raw;

    let count = read_varint(&mut input)? as usize;
    // Every string takes at least its terminator.
    if count > input.len() {
        return Err(Error::Decode(format!(
            "string table claims {} entries in {} bytes",
            count,
            input.len()
        )));
    }
    let mut strings = Vec::with_capacity(count);
    for _ in 0..count {
        let end = input
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::Decode("unterminated string table entry".to_string()))?;
        let s = std::str::from_utf8(&input[..end])
            .map_err(|e| Error::Decode(format!("string table entry: {}", e)))?;
        strings.push(s.to_string());
        input = &input[end + 1..];
    }

    let records = read_varint(&mut input)? as usize;
    let mut buffer = Buffer::with_capacity(records.min(input.len()));
    let mut last_id = 0i64;
    for _ in 0..records {
        let id = last_id.wrapping_add(zigzag_decode(read_varint(&mut input)?));
        last_id = id;

        let field_count = read_varint(&mut input)? as usize;
        let mut fields = Vec::with_capacity(field_count.min(input.len()));
        for _ in 0..field_count {
            let index = read_varint(&mut input)? as usize;
            let field = strings.get(index).ok_or_else(|| {
                Error::Decode(format!("string id {} out of range in record {}", index, id))
            })?;
            fields.push(field.clone());
        }
        buffer.push(Record { id, fields });
    }

    if !input.is_empty() {
        return Err(Error::Decode(format!(
            "{} trailing bytes after block",
            input.len()
        )));
    }
    Ok(buffer)
}

fn parse_header(raw: &[u8]) -> Result<Header> {
    if raw.len() < MAGIC.len() + 4 || raw[..MAGIC.len()] != MAGIC {
        return Err(Error::InvalidMagic);
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&raw[MAGIC.len()..MAGIC.len() + 4]);
    let version = u32::from_le_bytes(version);
    if version == 0 || version > FORMAT_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }

    let mut input = &raw[MAGIC.len() + 4..];
    let count = read_varint(&mut input)?;
    let mut header = Header::new();
    for _ in 0..count {
        let key = read_string(&mut input)?;
        let value = read_string(&mut input)?;
        header.set(key, value);
    }
    Ok(header)
}

fn read_string(input: &mut &[u8]) -> Result<String> {
    let len = read_varint(input)? as usize;
    if len > input.len() {
        return Err(Error::Decode("truncated header option".to_string()));
    }
    let s = std::str::from_utf8(&input[..len])
        .map_err(|e| Error::Decode(format!("header option: {}", e)))?;
    *input = &input[len..];
    Ok(s.to_string())
}

/// Largest stored size a frame of `raw_size` bytes can have.
///
/// Incompressible input grows by a few bytes per codec block under both
/// zlib and LZ4; 1/64 plus a fixed margin covers either.
fn max_data_size(flags: FrameFlags, raw_size: u32) -> u32 {
    if flags.is_empty() {
        raw_size
    } else {
        raw_size + raw_size / 64 + 64
    }
}

/// Read the next frame, or `None` at a clean end of input.
fn read_frame<R: Read>(reader: &mut R) -> Result<Option<(FrameKind, Vec<u8>)>> {
    let mut prefix = [0u8; FRAME_PREFIX_SIZE];
    let mut filled = 0;
    while filled < prefix.len() {
        match reader.read(&mut prefix[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    if filled == 0 {
        return Ok(None);
    }
    if filled < prefix.len() {
        return Err(Error::Decode("truncated frame prefix".to_string()));
    }

    let kind = FrameKind::from_u8(prefix[0])
        .ok_or_else(|| Error::Decode(format!("unknown frame kind {:#04x}", prefix[0])))?;
    let flags = FrameFlags::from_bits(prefix[1])
        .ok_or_else(|| Error::Decode(format!("unknown frame flags {:#04x}", prefix[1])))?;
    let raw_size = u32::from_le_bytes([prefix[2], prefix[3], prefix[4], prefix[5]]);
    let data_size = u32::from_le_bytes([prefix[6], prefix[7], prefix[8], prefix[9]]);
    if raw_size > MAX_UNCOMPRESSED_BLOCK_SIZE {
        return Err(Error::Decode(format!(
            "frame of {} bytes exceeds the {} byte limit",
            raw_size, MAX_UNCOMPRESSED_BLOCK_SIZE
        )));
    }
    if data_size > max_data_size(flags, raw_size) {
        return Err(Error::Decode(format!(
            "frame data of {} bytes is too large for {} uncompressed bytes",
            data_size, raw_size
        )));
    }

    let mut data = vec![0u8; data_size as usize];
    reader.read_exact(&mut data).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => Error::Decode("truncated frame data".to_string()),
        _ => Error::Io(e),
    })?;

    let raw = decompress(flags, data, raw_size as usize)?;
    if raw.len() != raw_size as usize {
        return Err(Error::Decode(format!(
            "frame decoded to {} bytes, expected {}",
            raw.len(),
            raw_size
        )));
    }
    Ok(Some((kind, raw)))
}

/// Output for [`Encoding::BLOCK`](crate::io::Encoding::BLOCK).
///
/// The header is encoded inline; data frames are encoded on the rayon pool
/// and queued as pending payloads.
pub struct BlockOutput {
    queue: OutputQueue,
    options: Arc<BlockOptions>,
    blocks: u64,
    closed: bool,
}

impl BlockOutput {
    /// Create an output queuing frames on `queue`.
    ///
    /// Fails with [`Error::Config`] if `options` do not validate.
    pub fn new(queue: OutputQueue, options: BlockOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            queue,
            options: Arc::new(options),
            blocks: 0,
            closed: false,
        })
    }

    /// Data frames queued so far.
    pub fn blocks(&self) -> u64 {
        self.blocks
    }
}

impl Output for BlockOutput {
    fn set_header(&mut self, header: &Header) -> Result<()> {
        self.queue.push_ready(encode_header(header)?)
    }

    fn handle_buffer(&mut self, buffer: Buffer) -> Result<()> {
        let max = self.options.max_records_per_block;
        let mut records = buffer.into_records();
        while !records.is_empty() {
            let rest = if records.len() > max {
                records.split_off(max)
            } else {
                Vec::new()
            };
            let block = std::mem::replace(&mut records, rest);
            let options = Arc::clone(&self.options);
            self.queue
                .push(Payload::spawn(move || encode_block(&block, &options)))?;
            self.blocks += 1;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        log::debug!("Block output closed after {} blocks", self.blocks);
        self.queue.close()
    }
}

/// Reads a block file back into its header and buffers.
///
/// # Example
///
/// ```ignore
/// use geostream::format::BlockReader;
///
/// let reader = BlockReader::new(std::fs::File::open("ways.blk")?)?;
/// println!("generator: {:?}", reader.header().get("generator"));
/// for buffer in reader {
///     println!("{} records", buffer?.len());
/// }
/// ```
pub struct BlockReader<R> {
    reader: R,
    header: Header,
}

impl<R: Read> BlockReader<R> {
    /// Read and check the header frame.
    pub fn new(mut reader: R) -> Result<Self> {
        let header = match read_frame(&mut reader) {
            Ok(Some((FrameKind::Header, raw))) => parse_header(&raw)?,
            Ok(_) | Err(Error::Decode(_)) => return Err(Error::InvalidMagic),
            Err(e) => return Err(e),
        };
        Ok(Self { reader, header })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Decode the next data frame, or `None` at end of input.
    pub fn read_buffer(&mut self) -> Result<Option<Buffer>> {
        match read_frame(&mut self.reader)? {
            None => Ok(None),
            Some((FrameKind::Data, raw)) => decode_block(&raw).map(Some),
            Some((FrameKind::Header, _)) => {
                Err(Error::Decode("unexpected header frame".to_string()))
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Iterator for BlockReader<R> {
    type Item = Result<Buffer>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_buffer().transpose()
    }
}

//! Integration tests for the ordered output pipeline.

use geostream::format::{encode_block, encode_header, encode_text, register_block};
use geostream::io::{OutputQueue, Payload};
use geostream::{
    BlockOptions, BlockReader, Buffer, Compression, Encoding, Error, Header, Output,
    OutputFactory, OutputFile, Record, Writer, WriterConfig,
};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn buffer(first_id: i64, count: usize, tag: &str) -> Buffer {
    (0..count as i64)
        .map(|i| {
            Record::new(
                first_id + i,
                vec![
                    "highway".to_string(),
                    tag.to_string(),
                    "name".to_string(),
                    format!("Street {}", i % 7),
                ],
            )
        })
        .collect()
}

#[test]
fn test_block_output_matches_encoded_buffers() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.blk");
    let factory = OutputFactory::with_defaults();
    let header = Header::new().with("generator", "geostream-test");

    // B1 is large so its encode finishes after the smaller ones.
    let b1 = buffer(1, 5000, "primary");
    let b2 = buffer(10_000, 3, "service");
    let b3 = buffer(20_000, 1, "footway");

    let mut writer = Writer::with_config(
        OutputFile::new(&path, Encoding::BLOCK),
        &header,
        &factory,
        &WriterConfig::default(),
    )
    .unwrap();
    writer.write(b1.clone()).unwrap();
    writer.write(b2.clone()).unwrap();
    writer.write(b3.clone()).unwrap();
    let written = writer.close().unwrap();

    let options = BlockOptions::default();
    let mut expected = encode_header(&header).unwrap();
    for b in [&b1, &b2, &b3] {
        expected.extend(encode_block(b.records(), &options).unwrap());
    }

    let actual = fs::read(&path).unwrap();
    assert_eq!(written, actual.len() as u64);
    assert_eq!(actual, expected);

    let reader = BlockReader::new(actual.as_slice()).unwrap();
    assert_eq!(reader.header().get("generator"), Some("geostream-test"));
    let buffers: Vec<Buffer> = reader.map(|b| b.unwrap()).collect();
    assert_eq!(buffers, vec![b1, b2, b3]);
}

#[test]
fn test_text_output_matches_encoded_buffers() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let factory = OutputFactory::with_defaults();

    let buffers = [buffer(1, 10, "a"), buffer(100, 0, "b"), buffer(200, 4, "c\td")];
    let mut writer = Writer::new(OutputFile::new(&path, Encoding::TEXT), &factory).unwrap();
    for b in &buffers {
        writer.write(b.clone()).unwrap();
    }
    writer.close().unwrap();

    let expected: Vec<u8> = buffers
        .iter()
        .flat_map(|b| encode_text(b.records()))
        .collect();
    assert_eq!(fs::read(&path).unwrap(), expected);
}

/// Output whose encodes finish in reverse submission order.
struct DelayedOutput {
    queue: OutputQueue,
    submitted: Arc<AtomicUsize>,
}

impl Output for DelayedOutput {
    fn handle_buffer(&mut self, buffer: Buffer) -> geostream::Result<()> {
        let n = self.submitted.fetch_add(1, Ordering::SeqCst);
        let delay = Duration::from_millis(60u64.saturating_sub(n as u64 * 20));
        self.queue.push(Payload::spawn(move || {
            std::thread::sleep(delay);
            Ok(encode_text(buffer.records()))
        }))
    }

    fn close(&mut self) -> geostream::Result<()> {
        self.queue.close()
    }
}

#[test]
fn test_order_independent_of_encode_completion() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("delayed.txt");

    let factory = OutputFactory::new();
    let delayed = Encoding::new("delayed");
    let submitted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&submitted);
    assert!(factory.register(&[delayed.clone()], move |_file: &OutputFile, queue| {
        Ok(Box::new(DelayedOutput {
            queue,
            submitted: Arc::clone(&counter),
        }) as Box<dyn Output>)
    }));

    let mut writer = Writer::new(OutputFile::new(&path, delayed), &factory).unwrap();
    for id in 1..=4 {
        writer.write(vec![Record::new(id, ["x"])].into()).unwrap();
    }
    writer.close().unwrap();

    assert_eq!(submitted.load(Ordering::SeqCst), 4);
    assert_eq!(fs::read_to_string(&path).unwrap(), "1\tx\n2\tx\n3\tx\n4\tx\n");
}

#[test]
fn test_back_pressure_with_small_queue() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("small-queue.blk");
    let factory = OutputFactory::with_defaults();

    let mut writer = Writer::with_config(
        OutputFile::new(&path, Encoding::BLOCK),
        &Header::new(),
        &factory,
        &WriterConfig::with_queue_capacity(1),
    )
    .unwrap();
    let buffers: Vec<Buffer> = (0..50).map(|i| buffer(i * 100, 20, "track")).collect();
    for b in &buffers {
        writer.write(b.clone()).unwrap();
    }
    writer.close().unwrap();

    let data = fs::read(&path).unwrap();
    let read: Vec<Buffer> = BlockReader::new(data.as_slice())
        .unwrap()
        .map(|b| b.unwrap())
        .collect();
    assert_eq!(read, buffers);
}

#[test]
fn test_table_overflow_surfaces_from_close() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("overflow.blk");

    let factory = OutputFactory::new();
    let options = BlockOptions {
        max_string_table_entries: 3,
        ..BlockOptions::with_compression(Compression::None)
    };
    assert!(register_block(&factory, options).unwrap());

    let mut writer = Writer::new(OutputFile::new(&path, Encoding::BLOCK), &factory).unwrap();
    writer
        .write(vec![Record::new(1, ["a", "b", "c", "d"])].into())
        .unwrap();

    assert!(matches!(
        writer.close(),
        Err(Error::TableOverflow { max: 3 })
    ));
    assert!(matches!(writer.close(), Err(Error::WriterClosed)));
    assert!(matches!(
        writer.write(Buffer::new()),
        Err(Error::WriterClosed)
    ));
}

#[test]
fn test_write_reports_earlier_failure() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fail.blk");

    let factory = OutputFactory::new();
    let options = BlockOptions {
        max_string_table_entries: 1,
        ..BlockOptions::default()
    };
    assert!(register_block(&factory, options).unwrap());

    let mut writer = Writer::new(OutputFile::new(&path, Encoding::BLOCK), &factory).unwrap();
    writer
        .write(vec![Record::new(1, ["a", "b"])].into())
        .unwrap();

    // Keep submitting until the writer notices the output thread stopped.
    let mut error = None;
    for _ in 0..1000 {
        if let Err(e) = writer.write(vec![Record::new(2, ["a"])].into()) {
            error = Some(e);
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    assert!(matches!(error, Some(Error::TableOverflow { max: 1 })));
    assert!(matches!(writer.close(), Err(Error::WriterClosed)));
}

/// Output whose encoder panics on every buffer.
struct PanickingOutput {
    queue: OutputQueue,
}

impl Output for PanickingOutput {
    fn handle_buffer(&mut self, _buffer: Buffer) -> geostream::Result<()> {
        self.queue
            .push(Payload::spawn(|| panic!("encoder bug")))
    }

    fn close(&mut self) -> geostream::Result<()> {
        self.queue.close()
    }
}

#[test]
fn test_encoder_panic_surfaces_as_error() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("panic.txt");

    let factory = OutputFactory::new();
    let panicking = Encoding::new("panicking");
    assert!(factory.register(&[panicking.clone()], |_file: &OutputFile, queue| {
        Ok(Box::new(PanickingOutput { queue }) as Box<dyn Output>)
    }));

    let mut writer = Writer::new(OutputFile::new(&path, panicking), &factory).unwrap();
    writer.write(vec![Record::new(1, ["a"])].into()).unwrap();
    match writer.close() {
        Err(Error::Encode(msg)) => assert!(msg.contains("encoder bug"), "{}", msg),
        other => panic!("expected an encode error, got {:?}", other),
    }
}

#[test]
fn test_invalid_block_options_rejected_at_registration() {
    let factory = OutputFactory::new();
    let options = BlockOptions {
        string_chunk_size: 0,
        ..BlockOptions::default()
    };
    assert!(matches!(
        register_block(&factory, options),
        Err(Error::Config(_))
    ));

    let dir = tempfile::tempdir().unwrap();
    let file = OutputFile::new(dir.path().join("none.blk"), Encoding::BLOCK);
    assert!(matches!(
        Writer::new(file, &factory),
        Err(Error::EncodingNotSupported(_))
    ));
}

#[test]
fn test_existing_file_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exists.txt");
    fs::write(&path, b"keep").unwrap();
    let factory = OutputFactory::with_defaults();

    assert!(matches!(
        Writer::new(OutputFile::new(&path, Encoding::TEXT), &factory),
        Err(Error::Io(_))
    ));
    assert_eq!(fs::read(&path).unwrap(), b"keep");

    let mut writer = Writer::new(
        OutputFile::new(&path, Encoding::TEXT).with_overwrite(true),
        &factory,
    )
    .unwrap();
    writer.write(vec![Record::new(7, ["new"])].into()).unwrap();
    writer.close().unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"7\tnew\n");
}

#[test]
fn test_drop_closes_writer() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dropped.txt");
    let factory = OutputFactory::with_defaults();

    {
        let mut writer = Writer::new(OutputFile::new(&path, Encoding::TEXT), &factory).unwrap();
        writer.write(vec![Record::new(1, ["a"])].into()).unwrap();
    }
    assert_eq!(fs::read(&path).unwrap(), b"1\ta\n");
}

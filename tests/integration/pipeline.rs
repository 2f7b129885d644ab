//! End-to-end decoding through `decode_file` and value-level pipelines

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use rill::filters;
use rill::runtime::namespace::Namespace;
use rill::runtime::scheduler::{EventLoop, SchedulerConfig};
use rill::runtime::stream::{pipeline, stream_fn, Stream, StreamMode};
use rill::runtime::value::{Array, Displayable, Value};
use rill::{decode_file, Format};

fn temp_input(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn inspected(records: &[Value]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.inspect().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn test_csv_file_with_header() {
    let file = temp_input("a,b,c\n1,2,3\n4,5,6\n");
    let records = decode_file(file.path(), Format::Csv, SchedulerConfig::default()).unwrap();

    assert_eq!(
        inspected(&records),
        vec![r#"["a", "b", "c"]"#, "[a:1, b:2, c:3]", "[a:4, b:5, c:6]"]
    );
}

#[test]
fn test_csv_without_header_or_trailing_newline() {
    let file = temp_input("1,2\n3,4");
    let records = decode_file(file.path(), Format::Csv, SchedulerConfig::default()).unwrap();
    assert_eq!(inspected(&records), vec!["[1, 2]", "[3, 4]"]);
}

#[test]
fn test_bad_lines_are_skipped() {
    let file = temp_input("n,label\n1,one\n2\nthree,3\n4,four\n");
    let records = decode_file(file.path(), Format::Csv, SchedulerConfig::default()).unwrap();
    assert_eq!(
        inspected(&records),
        vec![r#"["n", "label"]"#, r#"[n:1, label:"one"]"#, r#"[n:4, label:"four"]"#]
    );
}

#[test]
fn test_small_read_buffer_gives_same_records() {
    let file = temp_input("name,score\n\"Smith, J\",9.5\nDoe,7\n");
    let config = SchedulerConfig {
        read_buffer_size: 2,
        ..SchedulerConfig::default()
    };
    let small = decode_file(file.path(), Format::Csv, config).unwrap();
    let large = decode_file(file.path(), Format::Csv, SchedulerConfig::default()).unwrap();
    assert_eq!(inspected(&small), inspected(&large));
    assert_eq!(inspected(&small)[1], r#"[name:"Smith, J", score:9.5]"#);
}

#[test]
fn test_tsv_ltsv_and_lines() {
    let tsv = temp_input("k\tv\nx\t1\n");
    let records = decode_file(tsv.path(), Format::Tsv, SchedulerConfig::default()).unwrap();
    assert_eq!(inspected(&records)[1], r#"[k:"x", v:1]"#);

    let ltsv = temp_input("host:a.example\tcode:404\n");
    let records = decode_file(ltsv.path(), Format::Ltsv, SchedulerConfig::default()).unwrap();
    assert_eq!(inspected(&records), vec![r#"[host:"a.example", code:404]"#]);

    let lines = temp_input("one\ntwo");
    let records = decode_file(lines.path(), Format::Lines, SchedulerConfig::default()).unwrap();
    assert_eq!(records, vec![Value::from("one"), Value::from("two")]);
}

#[test]
fn test_missing_file() {
    let err = decode_file(
        std::path::Path::new("/nonexistent/input.csv"),
        Format::Csv,
        SchedulerConfig::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("cannot open"));
}

#[test]
fn test_exported_filters_in_a_pipeline() {
    let ns = Namespace::scope(None);
    filters::init(&ns).unwrap();
    let lp = EventLoop::current();

    let lines = Array::new(&[Value::from("x,y"), Value::from("10,20")]);
    let decoder = ns.get("csv").unwrap().call(&[]).unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let collect = Stream::new(
        StreamMode::Consumer,
        stream_fn(move |_, v| {
            sink.borrow_mut().push(v);
            Ok(())
        }),
    );
    pipeline::chain(&lp, &[Value::Array(lines), decoder, Value::Stream(collect)]).unwrap();
    lp.run().unwrap();

    let records = seen.borrow();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].to_array().field("y"), Some(&Value::from_int(20)));
    assert_eq!(Value::from("20").send("number", &[]).unwrap(), Value::from_int(20));
}

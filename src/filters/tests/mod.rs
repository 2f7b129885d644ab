//! Filter 单元测试
//!
//! 测试 csv/tsv/ltsv 解码、表头检测、类型检查和 number 方法

use std::cell::RefCell;
use std::rc::Rc;

use crate::filters::csv::{ltsv_filter, parse_number, sv_filter};
use crate::filters::{exports, init, ExportScope};
use crate::runtime::error::RuntimeError;
use crate::runtime::namespace::{self, Namespace};
use crate::runtime::scheduler::{EventLoop, SchedulerConfig};
use crate::runtime::stream::{stream_fn, Stream, StreamMode};
use crate::runtime::value::{Array, Value};

fn new_loop() -> EventLoop {
    EventLoop::new(SchedulerConfig::default())
}

/// Feed `lines` through `filter` and collect what comes out.
fn decode(
    lp: &EventLoop,
    filter: &Stream,
    lines: &[&str],
) -> Vec<Value> {
    let mut items: Vec<Value> = lines.iter().map(|l| Value::from(*l)).collect();
    let src = Stream::with_loop(
        lp,
        StreamMode::Producer,
        stream_fn(move |strm, _| {
            for v in items.drain(..) {
                strm.emit(v, None)?;
            }
            strm.close();
            Ok(())
        }),
    );
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let dst = Stream::with_loop(
        lp,
        StreamMode::Consumer,
        stream_fn(move |_, v| {
            sink.borrow_mut().push(v);
            Ok(())
        }),
    );
    filter.connect(&dst).unwrap();
    src.connect(filter).unwrap();
    lp.run().unwrap();
    let out = seen.borrow().clone();
    out
}

fn row(values: &[Value]) -> Value {
    Value::Array(Array::new(values))
}

fn headers_of(v: &Value) -> Option<Array> {
    v.as_array()?.headers().cloned()
}

mod csv_tests {
    use super::*;

    #[test]
    fn test_header_record_comes_first() {
        let lp = new_loop();
        let out = decode(&lp, &sv_filter(&lp, b','), &["a,b,c", "1,2,3", "4,5,6"]);

        assert_eq!(out.len(), 3);
        assert_eq!(out[0], row(&["a".into(), "b".into(), "c".into()]));
        assert_eq!(out[1], row(&[1.into(), 2.into(), 3.into()]));
        assert_eq!(out[2], row(&[4.into(), 5.into(), 6.into()]));

        let expected = Array::of_strs(["a", "b", "c"]);
        assert_eq!(headers_of(&out[1]), Some(expected.clone()));
        assert_eq!(headers_of(&out[2]), Some(expected));
        assert!(out[1].to_array().field("b").is_some());
        assert_eq!(out[2].to_array().field("c"), Some(&Value::from_int(6)));
    }

    #[test]
    fn test_header_names_are_interned() {
        let lp = new_loop();
        let out = decode(
            &lp,
            &sv_filter(&lp, b','),
            &["identifier,quantity", "1,2"],
        );
        let headers = headers_of(&out[1]).unwrap();
        assert!(headers.iter().all(|h| h.to_str().is_interned()));
        // The emitted header record is the array attached to the rows.
        assert!(headers.ptr_eq(out[0].to_array()));
    }

    #[test]
    fn test_numeric_first_line_has_no_header() {
        let lp = new_loop();
        let out = decode(&lp, &sv_filter(&lp, b','), &["1,2", "3,4"]);

        assert_eq!(out, vec![row(&[1.into(), 2.into()]), row(&[3.into(), 4.into()])]);
        assert!(out.iter().all(|r| headers_of(r).is_none()));
    }

    #[test]
    fn test_two_string_lines() {
        let lp = new_loop();
        let out = decode(&lp, &sv_filter(&lp, b','), &["a,b", "x,y", "p,q"]);

        assert_eq!(out.len(), 3);
        assert!(headers_of(&out[0]).is_none());
        assert_eq!(headers_of(&out[1]), Some(Array::of_strs(["a", "b"])));
        assert!(headers_of(&out[2]).is_none());
    }

    #[test]
    fn test_lone_string_line_flushed_on_close() {
        let lp = new_loop();
        let out = decode(&lp, &sv_filter(&lp, b','), &["only,header"]);
        assert_eq!(out, vec![row(&["only".into(), "header".into()])]);
    }

    #[test]
    fn test_field_count_mismatch_skips_line() {
        let lp = new_loop();
        let filter = sv_filter(&lp, b',');
        let out = decode(&lp, &filter, &["1,2", "3", "5,6"]);

        assert_eq!(out, vec![row(&[1.into(), 2.into()]), row(&[5.into(), 6.into()])]);
        let errors = lp.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].stream, filter.id());
        assert!(errors[0].message.contains("field count mismatch"));
    }

    #[test]
    fn test_type_mismatch_skips_line() {
        let lp = new_loop();
        let out = decode(&lp, &sv_filter(&lp, b','), &["1,x", "y,2", "3,z"]);

        assert_eq!(out, vec![row(&[1.into(), "x".into()]), row(&[3.into(), "z".into()])]);
        assert!(lp.errors()[0].message.contains("csv type mismatch"));
    }

    #[test]
    fn test_digits_in_string_column_stay_strings() {
        let lp = new_loop();
        let out = decode(&lp, &sv_filter(&lp, b','), &["1,x", "2,3", "3,04100"]);

        assert_eq!(
            out,
            vec![
                row(&[1.into(), "x".into()]),
                row(&[2.into(), "3".into()]),
                row(&[3.into(), "04100".into()]),
            ]
        );
        assert!(lp.errors().is_empty());
    }

    #[test]
    fn test_int_and_float_are_both_numbers() {
        let lp = new_loop();
        let out = decode(&lp, &sv_filter(&lp, b','), &["1,2", "1.5,2"]);
        assert_eq!(out.len(), 2);
        assert!(out[1].to_array().as_slice()[0].is_float());
        assert!(lp.errors().is_empty());
    }

    #[test]
    fn test_quoted_fields() {
        let lp = new_loop();
        let out = decode(
            &lp,
            &sv_filter(&lp, b','),
            &[r#""a,b",1"#, r#""say ""hi""",2"#, r#""42",3"#],
        );

        assert_eq!(out[0], row(&["a,b".into(), 1.into()]));
        assert_eq!(out[1], row(&["say \"hi\"".into(), 2.into()]));
        // Quoted digits stay a string.
        assert_eq!(out[2], row(&["42".into(), 3.into()]));
    }

    #[test]
    fn test_open_quote_joins_next_line() {
        let lp = new_loop();
        let out = decode(&lp, &sv_filter(&lp, b','), &["\"multi", "line\",7"]);
        assert_eq!(out, vec![row(&["multi\nline".into(), 7.into()])]);
    }

    #[test]
    fn test_tsv_and_crlf() {
        let lp = new_loop();
        let out = decode(&lp, &sv_filter(&lp, b'\t'), &["k\tv\r", "1\t2.5\r"]);
        assert_eq!(out[1], row(&[1.into(), 2.5.into()]));
        assert_eq!(headers_of(&out[1]), Some(Array::of_strs(["k", "v"])));
    }

    #[test]
    fn test_non_string_input_is_reported() {
        let lp = new_loop();
        let filter = sv_filter(&lp, b',');
        filter.task_push(crate::runtime::stream::run_start, Value::from_int(3));
        lp.run().unwrap();

        assert!(filter.error_message().unwrap().contains("string required"));
    }
}

mod ltsv_tests {
    use super::*;

    #[test]
    fn test_labels_become_headers() {
        let lp = new_loop();
        let out = decode(&lp, &ltsv_filter(&lp), &["host:example\tstatus:200\tsize:1.5"]);

        assert_eq!(out, vec![row(&["example".into(), 200.into(), 1.5.into()])]);
        let rec = out[0].to_array();
        assert_eq!(rec.field("status"), Some(&Value::from_int(200)));
        assert!(rec.header_at(0).unwrap().is_interned());
    }

    #[test]
    fn test_unlabeled_and_empty_fields() {
        let lp = new_loop();
        let out = decode(&lp, &ltsv_filter(&lp), &["bare\tk:"]);

        let rec = out[0].to_array();
        assert_eq!(rec.as_slice(), &[Value::from("bare"), Value::from("")][..]);
        let headers = rec.headers().unwrap();
        assert!(headers.as_slice()[0].is_nil());
        assert_eq!(headers.as_slice()[1], Value::from("k"));
    }
}

mod export_tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(b"42"), Some(Value::from_int(42)));
        assert_eq!(parse_number(b"  7"), Some(Value::from_int(7)));
        assert_eq!(parse_number(b"2.25"), Some(Value::from_float(2.25)));
        assert!(parse_number(b"9999999999").unwrap().is_float());
        assert_eq!(parse_number(b"1.2.3"), None);
        assert_eq!(parse_number(b"-1"), None);
        assert_eq!(parse_number(b""), None);
    }

    #[test]
    fn test_number_method() {
        let ns = Namespace::scope(Some(&namespace::global()));
        init(&ns).unwrap();

        assert_eq!(Value::from("12").send("number", &[]).unwrap(), Value::from_int(12));
        let err = Value::from("twelve").send("number", &[]).unwrap_err();
        assert!(matches!(err, RuntimeError::Raised(_)));
        assert!(err.to_string().contains("invalid string for number"));
    }

    #[test]
    fn test_init_binds_exports() {
        let ns = Namespace::scope(Some(&namespace::global()));
        init(&ns).unwrap();

        for export in exports() {
            match export.scope {
                ExportScope::Target => assert!(ns.lookup_local(export.name).is_some()),
                ExportScope::StringMethod => {
                    assert!(namespace::string().lookup_local(export.name).is_some())
                }
            }
        }
        // Methods may be registered again from another scope.
        init(&Namespace::scope(None)).unwrap();
    }

    #[test]
    fn test_csv_cfunc_returns_filter() {
        let ns = Namespace::scope(None);
        init(&ns).unwrap();

        let strm = ns.get("csv").unwrap().call(&[]).unwrap();
        assert_eq!(strm.to_stream().mode(), StreamMode::Filter);
        assert!(ns.get("tsv").unwrap().call(&[Value::from_int(1)]).is_err());
    }
}

//! Namespace 单元测试

use crate::runtime::error::RuntimeError;
use crate::runtime::namespace::{self, Namespace};
use crate::runtime::value::{Array, Str, Value};

fn first_doubled(args: &[Value]) -> crate::runtime::RtResult<Value> {
    Ok(Value::from_int(args[0].to_array().as_slice()[0].to_int() * 2))
}

#[test]
fn test_define_and_lookup() {
    let ns = Namespace::scope(None);
    ns.define("x", Value::from_int(1)).unwrap();
    assert_eq!(ns.lookup("x"), Some(Value::from_int(1)));
    assert!(ns.lookup("y").is_none());
}

#[test]
fn test_define_twice_fails() {
    let ns = Namespace::scope(None);
    ns.define("x", Value::from_int(1)).unwrap();
    let err = ns.define("x", Value::from_int(2)).unwrap_err();
    assert!(matches!(err, RuntimeError::AlreadyDefined(name) if name == "x"));
    ns.set("x", Value::from_int(3));
    assert_eq!(ns.get("x").unwrap(), Value::from_int(3));
}

#[test]
fn test_lookup_walks_outward() {
    let outer = Namespace::scope(None);
    let inner = Namespace::scope(Some(&outer));
    outer.define("a", Value::from_int(1)).unwrap();
    outer.define("b", Value::from_int(2)).unwrap();
    inner.define("b", Value::from_int(20)).unwrap();

    assert_eq!(inner.lookup("a"), Some(Value::from_int(1)));
    assert_eq!(inner.lookup("b"), Some(Value::from_int(20)));
    assert!(inner.lookup_local("a").is_none());
    assert!(matches!(inner.get("zzz"), Err(RuntimeError::Unbound(_))));
}

#[test]
fn test_names_keep_definition_order() {
    let ns = Namespace::scope(None);
    for name in ["gamma", "alpha", "beta"] {
        ns.define(name, Value::nil()).unwrap();
    }
    let names: Vec<String> = ns.names().iter().map(Str::to_string).collect();
    assert_eq!(names, vec!["gamma", "alpha", "beta"]);
    assert_eq!(ns.len(), 3);
}

#[test]
fn test_registry_get_or_create() {
    let a = Namespace::new(None, "test_registry_point");
    let b = Namespace::new(None, "test_registry_point");
    assert!(a.ptr_eq(&b));
    assert!(Namespace::find("test_registry_point").is_some_and(|ns| ns.ptr_eq(&a)));
    assert!(matches!(
        Namespace::create(None, "test_registry_point"),
        Err(RuntimeError::NamespaceExists(_))
    ));
}

#[test]
fn test_builtin_namespaces() {
    let g = namespace::global();
    assert!(g.name().is_none());
    for (ns, name) in [
        (namespace::array(), "array"),
        (namespace::string(), "string"),
        (namespace::number(), "number"),
    ] {
        assert_eq!(ns.name().map(Str::to_string).as_deref(), Some(name));
        assert!(ns.prev().is_some_and(|p| p.ptr_eq(&g)));
    }
}

#[test]
fn test_dispatch_resolution() {
    assert!(Value::from("s").namespace().is_some_and(|ns| ns.ptr_eq(&namespace::string())));
    assert!(Value::from_int(1).namespace().is_some_and(|ns| ns.ptr_eq(&namespace::number())));
    assert!(Value::from_float(1.5).namespace().is_some_and(|ns| ns.ptr_eq(&namespace::number())));
    assert!(Value::from(Array::new(&[])).namespace().is_some_and(|ns| ns.ptr_eq(&namespace::array())));
    assert!(Value::nil().namespace().is_none());
}

#[test]
fn test_send_finds_method() {
    let ns = Namespace::create(None, "test_send_point").unwrap();
    ns.mark_instantiable();
    ns.define_func("first_doubled", first_doubled).unwrap();
    let obj = ns
        .instantiate(Array::of_strs(["x"]), vec![Value::from_int(21)])
        .unwrap();
    // 方法以自身为第一个参数
    assert_eq!(obj.send("first_doubled", &[]).unwrap(), Value::from_int(42));
    assert!(matches!(obj.send("missing", &[]), Err(RuntimeError::Unbound(_))));
}

#[test]
fn test_instantiate_requires_flag() {
    let ns = Namespace::create(None, "test_plain_ns").unwrap();
    assert!(!ns.is_instantiable());
    let err = ns.instantiate(Array::of_strs(["a"]), vec![Value::nil()]).unwrap_err();
    assert!(matches!(err, RuntimeError::NotInstantiable(name) if name == "test_plain_ns"));
}

#[test]
fn test_instance_carries_namespace_and_headers() {
    let ns = Namespace::create(None, "test_point").unwrap();
    ns.mark_instantiable();
    let obj = ns
        .instantiate(Array::of_strs(["x", "y"]), vec![Value::from_int(1), Value::from_int(2)])
        .unwrap();
    let ary = obj.to_array();
    assert!(ary.namespace().is_some_and(|bound| bound.ptr_eq(&ns)));
    assert_eq!(ary.field("y"), Some(&Value::from_int(2)));
    assert!(obj.namespace().is_some_and(|n| n.ptr_eq(&ns)));
}

use std::cell::Cell;
use std::rc::Rc;

use ctrkit::Error;
use ctrkit::container::field::{Kind, constant, derived, field, flag, region};
use ctrkit::container::node::{node, value};
use ctrkit::container::{Container, Node};
use ctrkit::source::{SourceRef, buffer};
use ctrkit::verify::Check;

fn sample() -> Container {
    let c = Container::new(buffer(vec![
        0x78, 0x56, 0x34, 0x12, 0x05, 0xAA, 0xBB, 0xCC, 0xDD,
    ]));
    c.install_list([
        field("Word", 0, Kind::U32),
        field("Flags", 4, Kind::U8),
        field("Tail", 5, Kind::Bytes(4)),
        flag("IsFirst", "Flags", 0x01),
        flag("IsSecond", "Flags", 0x02),
        region("TailView", 5, 4),
        constant("Label", "sample"),
    ]);
    c
}

#[test]
fn fixed_offset_fields() {
    let c = sample();
    assert_eq!(c.get::<u32>("Word").unwrap(), 0x1234_5678);
    assert_eq!(c.get::<u8>("Flags").unwrap(), 5);
    assert_eq!(c.get::<Vec<u8>>("Tail").unwrap(), [0xAA, 0xBB, 0xCC, 0xDD]);
    assert!(c.get::<bool>("IsFirst").unwrap());
    assert!(!c.get::<bool>("IsSecond").unwrap());
    assert_eq!(c.get::<String>("Label").unwrap(), "sample");

    let view: SourceRef = c.get("TailView").unwrap();
    assert_eq!(view.read_all().unwrap(), [0xAA, 0xBB, 0xCC, 0xDD]);
}

#[test]
fn names_keep_install_order() {
    let c = sample();
    assert_eq!(
        c.names(),
        ["Word", "Flags", "Tail", "IsFirst", "IsSecond", "TailView", "Label"]
    );
    assert!(c.contains("Tail"));
    assert!(!c.contains("Missing"));
}

#[test]
fn open_is_memoized() {
    let runs = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&runs);
    let c = Container::new(buffer(Vec::new()));
    c.install_list([derived("Counted", move |_| {
        counter.set(counter.get() + 1);
        Ok(value(7u32))
    })]);

    let first = c.open("Counted").unwrap();
    let second = c.open("Counted").unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(runs.get(), 1);
}

#[test]
fn failures_are_not_cached() {
    let runs = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&runs);
    let c = Container::new(buffer(vec![1, 2]));
    c.install_list([derived("Flaky", move |c| {
        counter.set(counter.get() + 1);
        if counter.get() == 1 {
            c.source().read(0, 4)?;
        }
        Ok(value(counter.get()))
    })]);

    assert!(matches!(c.open("Flaky"), Err(Error::OutOfRange { .. })));
    assert_eq!(c.get::<u32>("Flaky").unwrap(), 2);
    assert_eq!(c.get::<u32>("Flaky").unwrap(), 2);
    assert_eq!(runs.get(), 2);
}

#[test]
fn unknown_field() {
    let c = sample();
    assert!(matches!(c.open("Nope"), Err(Error::FieldNotFound(name)) if name == "Nope"));
}

#[test]
fn type_mismatch() {
    let c = sample();
    assert!(matches!(
        c.get::<u16>("Word"),
        Err(Error::TypeMismatch {
            expected: "u16",
            found: "u32"
        })
    ));
    assert!(matches!(c.child("Word"), Err(Error::TypeMismatch { .. })));
    assert!(matches!(c.verify("Label"), Err(Error::TypeMismatch { .. })));
}

#[test]
fn short_source_is_out_of_range() {
    let c = Container::new(buffer(vec![0; 3]));
    c.install_list([field("Word", 0, Kind::U32)]);
    assert!(matches!(
        c.open("Word"),
        Err(Error::OutOfRange {
            offset: 0,
            len: 4,
            size: 3
        })
    ));
}

#[test]
fn self_reference_is_a_cycle() {
    let c = Container::new(buffer(Vec::new()));
    c.install_list([
        derived("A", |c| c.open("B")),
        derived("B", |c| c.open("A")),
        derived("C", |c| Ok(value(c.get::<u8>("D")?))),
        constant("D", 4u8),
    ]);
    assert!(matches!(c.open("A"), Err(Error::Cycle(name)) if name == "A"));
    // The failed evaluation leaves nothing pending behind.
    assert!(matches!(c.open("B"), Err(Error::Cycle(name)) if name == "B"));
    assert_eq!(c.get::<u8>("C").unwrap(), 4);
}

#[test]
fn reinstall_replaces_cached_node() {
    let c = sample();
    assert_eq!(c.get::<String>("Label").unwrap(), "sample");
    c.install_list([constant("Label", "renamed")]);
    assert_eq!(c.get::<String>("Label").unwrap(), "renamed");
    assert_eq!(c.names().len(), 7);
}

#[test]
fn nested_containers_and_checks() {
    let c = sample();
    c.install_list([
        derived("Child", |c| {
            let child = Container::new(Rc::clone(c.source()));
            child.install_list([field("Flags", 4, Kind::U8)]);
            Ok(node(child))
        }),
        derived("TailHash", |c| {
            let data: SourceRef = c.get("TailView")?;
            let expected = buffer(ctrkit::crypto::sha256(&[0xAA, 0xBB, 0xCC, 0xDD]));
            Ok(node(Check::sha256(data, expected)))
        }),
    ]);

    let child = c.child("Child").unwrap();
    assert_eq!(child.as_container().unwrap().get::<u8>("Flags").unwrap(), 5);
    assert!(matches!(*child, Node::Container(_)));
    assert!(c.verify("TailHash").unwrap());
}

//! Trace line shapes accepted and rejected by the classifier

use allocdiff::classify::CallKind;
use allocdiff::{classify, AllocEvent, Line};
use test_case::test_case;

const TAG: &str = "TAG: ";

#[test_case("TAG: A(f,1): malloc(100) = 0x1",
    AllocEvent::Allocate { caller: "A", size: 100, address: "0x1" } ; "malloc")]
#[test_case("TAG: ./prog(main+0x1a) [0x4005d6]: free(0x602010)",
    AllocEvent::Release { caller: "./prog", address: "0x602010" } ; "free with backtrace symbol")]
#[test_case("TAG: A: realloc(0x1, 64) = 0x2",
    AllocEvent::Reallocate { caller: "A", old_address: "0x1", size: 64, new_address: "0x2" } ; "realloc")]
#[test_case("TAG: A: realloc((nil), 64) = 0x2",
    AllocEvent::Reallocate { caller: "A", old_address: "(nil)", size: 64, new_address: "0x2" } ; "realloc of null")]
#[test_case("TAG: A: realloc(0x1, 0) = (nil)",
    AllocEvent::Release { caller: "A", address: "0x1" } ; "realloc to zero frees")]
#[test_case("TAG: A: realloc(0x1, 64) = (nil)",
    AllocEvent::Failed { caller: "A", call: CallKind::Realloc } ; "failed realloc")]
#[test_case("TAG: A: calloc(10, 4) = 0x1",
    AllocEvent::AllocateZeroed { caller: "A", count: 10, elem_size: 4, address: "0x1" } ; "calloc")]
#[test_case("TAG: A: memalign(64, 200) = 0x40",
    AllocEvent::Allocate { caller: "A", size: 200, address: "0x40" } ; "memalign")]
#[test_case("TAG: A: valloc(4096) = 0x1000",
    AllocEvent::Allocate { caller: "A", size: 4096, address: "0x1000" } ; "valloc")]
#[test_case("TAG: A: posix_memalign(0x7ffc, 16, 48) = 0, 0x50",
    AllocEvent::Allocate { caller: "A", size: 48, address: "0x50" } ; "posix_memalign")]
#[test_case("TAG: A: posix_memalign(0x7ffc, 16, 48) = 12, NULL",
    AllocEvent::Failed { caller: "A", call: CallKind::PosixMemalign } ; "posix_memalign failure")]
#[test_case("TAG: UNK: malloc(0) = (nil)",
    AllocEvent::Failed { caller: "UNK", call: CallKind::Malloc } ; "null malloc")]
#[test_case("TAG: A: malloc(18446744073709551615) = (nil)",
    AllocEvent::Failed { caller: "A", call: CallKind::Malloc } ; "huge null malloc")]
#[test_case("TAG: A: calloc(18446744073709551615, 2) = 0x0",
    AllocEvent::Failed { caller: "A", call: CallKind::Calloc } ; "overflowing null calloc")]
fn recognized(line: &str, expected: AllocEvent<'static>) {
    assert_eq!(classify(line, TAG), Line::Event(expected));
}

#[test_case("TAG: A: malloc(-1) = 0x1" ; "negative size")]
#[test_case("TAG: A: malloc(abc) = 0x1" ; "non numeric size")]
#[test_case("TAG: A: malloc(8)" ; "missing result")]
#[test_case("TAG: A: malloc(8) = " ; "empty result")]
#[test_case("TAG: A: free()" ; "free without address")]
#[test_case("TAG: A: free(0x1) = 0" ; "free with result")]
#[test_case("TAG: A: calloc(10) = 0x1" ; "calloc arity")]
#[test_case("TAG: A: calloc(4294967296, 4294967296) = 0x1" ; "calloc overflow")]
#[test_case("TAG: A: malloc(18446744073709551615) = 0x1" ; "size beyond signed range")]
#[test_case("TAG: A: mmap(4096) = 0x1" ; "unknown call")]
#[test_case("TAG: (anon): malloc(1) = 0x1" ; "empty caller")]
#[test_case("TAG: malloc(1) = 0x1" ; "missing caller")]
#[test_case("TAG: " ; "bare prefix")]
fn unrecognized(line: &str) {
    let body = line.strip_prefix(TAG).unwrap();
    assert_eq!(classify(line, TAG), Line::Unrecognized(body));
}

#[test_case("hello" ; "plain output")]
#[test_case("" ; "empty line")]
#[test_case("TAG:A: malloc(1) = 0x1" ; "prefix missing its space")]
#[test_case("tag: A: malloc(1) = 0x1" ; "prefix is case sensitive")]
fn passthrough(line: &str) {
    assert_eq!(classify(line, TAG), Line::Passthrough(line));
}

#[test]
fn caller_is_reported_for_every_event() {
    let Line::Event(event) = classify("TAG: lib.so(x): free(0x1)", TAG) else {
        panic!("expected an event");
    };
    assert_eq!(event.caller(), "lib.so");
}

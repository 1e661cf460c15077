//! Parsers for the `<symbol>: <call>(<args>) = <result>` trace shapes

use super::event::{AllocEvent, CallKind};

/// Spellings of a null pointer across libc `%p` implementations
const NULL_TOKENS: [&str; 5] = ["(nil)", "(null)", "NULL", "0x0", "0"];

/// Parse the part of a trace line after the sentinel prefix.
pub(super) fn parse_trace(body: &str) -> Option<AllocEvent<'_>> {
    let (symbol, call) = body.rsplit_once(": ")?;
    let caller = caller_token(symbol)?;

    let (name, rest) = call.split_once('(')?;
    let kind = CallKind::from_name(name)?;
    let (args, tail) = split_call(rest)?;

    match kind {
        CallKind::Malloc | CallKind::Valloc => {
            let [size] = arguments(args)?;
            allocate(caller, kind, parse_count(size)?, result(tail)?)
        }
        CallKind::Memalign => {
            let [alignment, size] = arguments(args)?;
            parse_count(alignment)?;
            allocate(caller, kind, parse_count(size)?, result(tail)?)
        }
        CallKind::Calloc => {
            let [count, elem_size] = arguments(args)?;
            let count = parse_count(count)?;
            let elem_size = parse_count(elem_size)?;
            let address = result(tail)?;
            if is_null(address) {
                return Some(AllocEvent::Failed { caller, call: kind });
            }
            fits(count.checked_mul(elem_size)?)?;
            Some(AllocEvent::AllocateZeroed {
                caller,
                count,
                elem_size,
                address,
            })
        }
        CallKind::Realloc => {
            let [old_address, size] = arguments(args)?;
            let old_address = address_token(old_address)?;
            let size = parse_count(size)?;
            let new_address = result(tail)?;
            if is_null(new_address) {
                // realloc(p, 0) may free p and return null; any other null
                // return leaves p untouched.
                return Some(if size == 0 {
                    AllocEvent::Release {
                        caller,
                        address: old_address,
                    }
                } else {
                    AllocEvent::Failed { caller, call: kind }
                });
            }
            Some(AllocEvent::Reallocate {
                caller,
                old_address,
                size: fits(size)?,
                new_address,
            })
        }
        CallKind::Free => {
            if !tail.is_empty() {
                return None;
            }
            let [address] = arguments(args)?;
            Some(AllocEvent::Release {
                caller,
                address: address_token(address)?,
            })
        }
        CallKind::PosixMemalign => {
            let [memptr, alignment, size] = arguments(args)?;
            address_token(memptr)?;
            parse_count(alignment)?;
            let size = parse_count(size)?;
            let (rv, address) = result(tail)?.split_once(", ")?;
            let rv = rv.parse::<i32>().ok()?;
            if rv != 0 || is_null(address) {
                return Some(AllocEvent::Failed { caller, call: kind });
            }
            Some(AllocEvent::Allocate {
                caller,
                size: fits(size)?,
                address: address_token(address)?,
            })
        }
    }
}

fn allocate<'a>(
    caller: &'a str,
    call: CallKind,
    size: u64,
    address: &'a str,
) -> Option<AllocEvent<'a>> {
    if is_null(address) {
        return Some(AllocEvent::Failed { caller, call });
    }
    Some(AllocEvent::Allocate {
        caller,
        size: fits(size)?,
        address,
    })
}

/// Module part of a backtrace symbol such as `./prog(main+0x1a) [0x4005d6]`.
fn caller_token(symbol: &str) -> Option<&str> {
    let caller = match symbol.split_once('(') {
        Some((module, _)) => module,
        None => symbol,
    };
    (!caller.is_empty()).then_some(caller)
}

/// Split `<args>) = <result>` at the parenthesis closing the call.
///
/// Arguments may themselves be parenthesised, e.g. `free((nil))`.
fn split_call(rest: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (idx, ch) in rest.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' if depth == 0 => return Some((&rest[..idx], &rest[idx + 1..])),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn arguments<const N: usize>(args: &str) -> Option<[&str; N]> {
    let mut out = [""; N];
    let mut parts = args.split(", ");
    for slot in out.iter_mut() {
        *slot = parts.next()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

fn result(tail: &str) -> Option<&str> {
    tail.strip_prefix(" = ").and_then(address_token)
}

fn address_token(token: &str) -> Option<&str> {
    (!token.is_empty()).then_some(token)
}

/// Unsigned decimal, as printed by `%zu`.
fn parse_count(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

/// Sizes of successful allocations must fit a signed running total.
fn fits(size: u64) -> Option<u64> {
    (size <= i64::MAX as u64).then_some(size)
}

fn is_null(address: &str) -> bool {
    NULL_TOKENS.contains(&address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_call_skips_nested_parens() {
        assert_eq!(split_call("(nil))"), Some(("(nil)", "")));
        assert_eq!(split_call("(nil), 10) = 0x10"), Some(("(nil), 10", " = 0x10")));
        assert_eq!(split_call("10 = 0x1"), None);
    }

    #[test]
    fn test_caller_token_takes_module_path() {
        assert_eq!(caller_token("./prog(main+0x1a) [0x4005d6]"), Some("./prog"));
        assert_eq!(caller_token("UNK"), Some("UNK"));
        assert_eq!(caller_token("(anon)"), None);
    }

    #[test]
    fn test_parse_count_rejects_signs() {
        assert_eq!(parse_count("42"), Some(42));
        assert_eq!(parse_count("+42"), None);
        assert_eq!(parse_count("-1"), None);
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("18446744073709551615"), Some(u64::MAX));
        assert_eq!(parse_count("18446744073709551616"), None);
    }

    #[test]
    fn test_fits_signed_total() {
        assert_eq!(fits(i64::MAX as u64), Some(i64::MAX as u64));
        assert_eq!(fits(u64::MAX), None);
    }

    #[test]
    fn test_arguments_requires_exact_arity() {
        assert_eq!(arguments::<2>("1, 2"), Some(["1", "2"]));
        assert_eq!(arguments::<2>("1"), None);
        assert_eq!(arguments::<1>("1, 2"), None);
    }
}

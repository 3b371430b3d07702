//! Built-in template functions.
//!
//! Functions receive fully evaluated arguments; a piped value is the last
//! argument. String functions follow sprig argument order (`trimPrefix
//! "x" .s`, `replace "old" "new" .s`) so pipelines read naturally.
use super::value::Value;

type FuncResult = Result<Value, String>;

/// Signature shared by every built-in.
pub(super) type Func = fn(&[Value]) -> FuncResult;

const FUNCS: &[(&str, Func)] = &[
    ("and", and),
    ("contains", contains),
    ("default", default),
    ("eq", eq),
    ("hasPrefix", has_prefix),
    ("hasSuffix", has_suffix),
    ("join", join),
    ("lower", lower),
    ("ne", ne),
    ("not", not),
    ("or", or),
    ("quote", quote),
    ("replace", replace),
    ("trim", trim),
    ("trimPrefix", trim_prefix),
    ("trimSuffix", trim_suffix),
    ("upper", upper),
];

/// Look up a function by name.
pub(super) fn lookup(name: &str) -> Option<Func> {
    FUNCS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, f)| *f)
}

fn arity<const N: usize>(name: &str, args: &[Value]) -> Result<[Value; N], String> {
    <[Value; N]>::try_from(args.to_vec()).map_err(|_| {
        format!(
            "wrong number of args for {name}: want {N} got {}",
            args.len()
        )
    })
}

fn text(name: &str, value: &Value) -> Result<String, String> {
    value
        .to_text()
        .map_err(|_| format!("{name}: expected a scalar, got {}", value.type_name()))
}

fn not(args: &[Value]) -> FuncResult {
    let [v] = arity("not", args)?;
    Ok(Value::Bool(!v.is_truthy()))
}

fn and(args: &[Value]) -> FuncResult {
    let Some(last) = args.last() else {
        return Err("wrong number of args for and: want at least 1 got 0".to_string());
    };
    Ok(args
        .iter()
        .find(|v| !v.is_truthy())
        .unwrap_or(last)
        .clone())
}

fn or(args: &[Value]) -> FuncResult {
    let Some(last) = args.last() else {
        return Err("wrong number of args for or: want at least 1 got 0".to_string());
    };
    Ok(args.iter().find(|v| v.is_truthy()).unwrap_or(last).clone())
}

fn comparable(a: &Value, b: &Value) -> Result<bool, String> {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::Int(x), Value::Int(y)) => Ok(x == y),
        (Value::Str(x), Value::Str(y)) => Ok(x == y),
        _ => Err(format!(
            "incompatible types for comparison: {} and {}",
            a.type_name(),
            b.type_name()
        )),
    }
}

/// `eq a b c` is true when `a` equals any of the following arguments.
fn eq(args: &[Value]) -> FuncResult {
    let Some((first, rest)) = args.split_first().filter(|(_, rest)| !rest.is_empty()) else {
        return Err(format!(
            "wrong number of args for eq: want at least 2 got {}",
            args.len()
        ));
    };
    for other in rest {
        if comparable(first, other)? {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn ne(args: &[Value]) -> FuncResult {
    let [a, b] = arity("ne", args)?;
    Ok(Value::Bool(!comparable(&a, &b)?))
}

fn upper(args: &[Value]) -> FuncResult {
    let [s] = arity("upper", args)?;
    Ok(Value::Str(text("upper", &s)?.to_uppercase()))
}

fn lower(args: &[Value]) -> FuncResult {
    let [s] = arity("lower", args)?;
    Ok(Value::Str(text("lower", &s)?.to_lowercase()))
}

fn trim(args: &[Value]) -> FuncResult {
    let [s] = arity("trim", args)?;
    Ok(Value::Str(text("trim", &s)?.trim().to_string()))
}

fn trim_prefix(args: &[Value]) -> FuncResult {
    let [prefix, s] = arity("trimPrefix", args)?;
    let prefix = text("trimPrefix", &prefix)?;
    let s = text("trimPrefix", &s)?;
    Ok(Value::Str(
        s.strip_prefix(prefix.as_str()).unwrap_or(&s).to_string(),
    ))
}

fn trim_suffix(args: &[Value]) -> FuncResult {
    let [suffix, s] = arity("trimSuffix", args)?;
    let suffix = text("trimSuffix", &suffix)?;
    let s = text("trimSuffix", &s)?;
    Ok(Value::Str(
        s.strip_suffix(suffix.as_str()).unwrap_or(&s).to_string(),
    ))
}

fn replace(args: &[Value]) -> FuncResult {
    let [old, new, s] = arity("replace", args)?;
    Ok(Value::Str(text("replace", &s)?.replace(
        text("replace", &old)?.as_str(),
        &text("replace", &new)?,
    )))
}

fn contains(args: &[Value]) -> FuncResult {
    let [needle, s] = arity("contains", args)?;
    Ok(Value::Bool(
        text("contains", &s)?.contains(text("contains", &needle)?.as_str()),
    ))
}

fn has_prefix(args: &[Value]) -> FuncResult {
    let [prefix, s] = arity("hasPrefix", args)?;
    Ok(Value::Bool(
        text("hasPrefix", &s)?.starts_with(text("hasPrefix", &prefix)?.as_str()),
    ))
}

fn has_suffix(args: &[Value]) -> FuncResult {
    let [suffix, s] = arity("hasSuffix", args)?;
    Ok(Value::Bool(
        text("hasSuffix", &s)?.ends_with(text("hasSuffix", &suffix)?.as_str()),
    ))
}

fn quote(args: &[Value]) -> FuncResult {
    let [s] = arity("quote", args)?;
    let s = text("quote", &s)?;
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    Ok(Value::Str(out))
}

/// `default d v` yields `v` unless it is empty, in which case `d`.
fn default(args: &[Value]) -> FuncResult {
    let [fallback, v] = arity("default", args)?;
    Ok(if v.is_truthy() { v } else { fallback })
}

/// `join sep a b ...` concatenates the remaining arguments with `sep`.
fn join(args: &[Value]) -> FuncResult {
    let Some((sep, parts)) = args.split_first() else {
        return Err("wrong number of args for join: want at least 1 got 0".to_string());
    };
    let sep = text("join", sep)?;
    let parts = parts
        .iter()
        .map(|p| text("join", p))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Str(parts.join(&sep)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn s(v: &str) -> Value {
        Value::Str(v.to_string())
    }

    fn call(name: &str, args: &[Value]) -> FuncResult {
        lookup(name).unwrap()(args)
    }

    #[test]
    fn every_function_is_registered_once() {
        for (i, (name, _)) in FUNCS.iter().enumerate() {
            assert!(
                FUNCS.iter().skip(i + 1).all(|(other, _)| other != name),
                "{name} registered twice"
            );
        }
        assert!(lookup("printf").is_none());
    }

    #[test]
    fn eq_matches_any_candidate() {
        assert_eq!(
            call("eq", &[s("b"), s("a"), s("b")]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(call("eq", &[s("c"), s("a")]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn eq_rejects_mixed_types() {
        assert!(call("eq", &[s("1"), Value::Int(1)]).is_err());
    }

    #[test]
    fn and_or_return_operands() {
        assert_eq!(call("and", &[s("x"), s("")]).unwrap(), s(""));
        assert_eq!(call("and", &[s("x"), s("y")]).unwrap(), s("y"));
        assert_eq!(call("or", &[s(""), s("y")]).unwrap(), s("y"));
    }

    #[test]
    fn string_helpers_take_subject_last() {
        assert_eq!(
            call("trimPrefix", &[s("v"), s("v1.2")]).unwrap(),
            s("1.2")
        );
        assert_eq!(
            call("replace", &[s("-"), s("_"), s("a-b-c")]).unwrap(),
            s("a_b_c")
        );
        assert_eq!(
            call("hasSuffix", &[s(".gov"), s("ws.nasa.gov")]).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn quote_escapes() {
        assert_eq!(call("quote", &[s("a\"b")]).unwrap(), s("\"a\\\"b\""));
    }

    #[test]
    fn default_uses_fallback_for_empty() {
        assert_eq!(call("default", &[s("d"), s("")]).unwrap(), s("d"));
        assert_eq!(call("default", &[s("d"), s("v")]).unwrap(), s("v"));
    }

    #[test]
    fn join_concatenates_with_separator() {
        assert_eq!(
            call("join", &[s(":"), s("a"), Value::Int(2)]).unwrap(),
            s("a:2")
        );
    }

    #[test]
    fn wrong_arity_is_reported() {
        let err = call("upper", &[s("a"), s("b")]).unwrap_err();
        assert_eq!(err, "wrong number of args for upper: want 1 got 2");
    }
}

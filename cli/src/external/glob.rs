//! Path glob matching for include/exclude filters.
//!
//! `/` separates segments. `**` as a whole segment matches zero or more
//! segments; `*` matches any run of characters and `?` exactly one character,
//! both within a single segment.

/// Check whether `pattern` matches the whole of `path`.
#[must_use]
pub fn matches(pattern: &str, path: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match_segments(&pattern, &path)
}

/// Check whether any of `patterns` matches `path`.
#[must_use]
pub fn matches_any(patterns: &[String], path: &str) -> bool {
    patterns.iter().any(|p| matches(p, path))
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((&"**", rest)) => {
            (0..=path.len()).any(|skip| path.get(skip..).is_some_and(|tail| match_segments(rest, tail)))
        }
        Some((first, rest)) => path.split_first().is_some_and(|(segment, tail)| {
            match_segment(first, segment) && match_segments(rest, tail)
        }),
    }
}

// Backtracking matcher over one segment.
fn match_segment(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0usize, 0usize);
    let (mut star_pi, mut star_ti) = (None::<usize>, 0usize);

    while ti < t.len() {
        match (p.get(pi), t.get(ti)) {
            (Some('*'), _) => {
                star_pi = Some(pi);
                star_ti = ti;
                pi += 1;
            }
            (Some(pc), Some(tc)) if pc == tc || *pc == '?' => {
                pi += 1;
                ti += 1;
            }
            _ => {
                let Some(sp) = star_pi else {
                    return false;
                };
                pi = sp + 1;
                star_ti += 1;
                ti = star_ti;
            }
        }
    }

    p.get(pi..).is_some_and(|rest| rest.iter().all(|c| *c == '*'))
}

//! Preview diff: line-aligned, capped. Not a real diff algorithm.

pub const MAX_DIFF_LINES: usize = 10;

/// Compare `local` and `remote` line by line at equal indices. Emits up to
/// [`MAX_DIFF_LINES`] differing lines as `-`/`+` pairs, then a
/// `+N more lines` marker for the rest.
pub fn line_diff(local: &str, remote: &str) -> String {
    let local: Vec<&str> = local.lines().collect();
    let remote: Vec<&str> = remote.lines().collect();

    let mut out = String::new();
    let mut differing = 0usize;
    for i in 0..local.len().max(remote.len()) {
        let (l, r) = (local.get(i), remote.get(i));
        if l == r {
            continue;
        }
        differing += 1;
        if differing > MAX_DIFF_LINES {
            continue;
        }
        let line = i + 1;
        if let Some(l) = l {
            out.push_str(&format!("{line:>4} - {l}\n"));
        }
        if let Some(r) = r {
            out.push_str(&format!("{line:>4} + {r}\n"));
        }
    }

    if differing > MAX_DIFF_LINES {
        out.push_str(&format!("... +{} more lines\n", differing - MAX_DIFF_LINES));
    }
    out
}

/// First `max_lines` lines of `content`, with a marker for the remainder.
pub fn head(content: &str, max_lines: usize) -> String {
    let total = content.lines().count();
    let mut out: String = content.lines().take(max_lines).flat_map(|l| [l, "\n"]).collect();
    if total > max_lines {
        out.push_str(&format!("... +{} more lines\n", total - max_lines));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identical_is_empty() {
        assert_eq!(line_diff("a\nb", "a\nb"), "");
    }

    #[test]
    fn shows_changed_and_extra_lines() {
        assert_eq!(
            line_diff("a\nb\n", "a\nc\nd\n"),
            "   2 - b\n   2 + c\n   3 + d\n"
        );
    }

    #[test]
    fn caps_at_ten_lines() {
        let local: String = (0..15).map(|i| format!("l{i}\n")).collect();
        let remote: String = (0..15).map(|i| format!("r{i}\n")).collect();
        let diff = line_diff(&local, &remote);
        assert_eq!(diff.lines().filter(|l| l.contains(" - ")).count(), 10);
        assert!(diff.ends_with("... +5 more lines\n"));
    }

    #[test]
    fn head_truncates() {
        assert_eq!(head("a\nb\nc", 2), "a\nb\n... +1 more lines\n");
        assert_eq!(head("a", 5), "a\n");
    }
}

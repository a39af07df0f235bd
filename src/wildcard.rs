//! Name matching for `Driver::find_first` implementations.
//!
//! `?` matches exactly one character, `*` matches any run of characters
//! (including none). Comparison ignores ASCII case, as FAT names do.

pub fn matches(pattern: &str, name: &str) -> bool {
    let pattern: &[u8] = pattern.as_bytes();
    let name: &[u8] = name.as_bytes();

    let mut p = 0;
    let mut n = 0;
    // Position of the last `*` seen, and the name position it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            backtrack = Some((p, n));
            p += 1;
        } else if p < pattern.len()
            && (pattern[p] == b'?' || pattern[p].eq_ignore_ascii_case(&name[n]))
        {
            p += 1;
            n += 1;
        } else if let Some((star, tried)) = backtrack {
            // Let the star swallow one more character
            p = star + 1;
            n = tried + 1;
            backtrack = Some((star, tried + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}

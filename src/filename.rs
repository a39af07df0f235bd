//! Sequentially numbered filenames.
//!
//! Capture files are named from a stem pattern such as `CAP???`, where each
//! `?` stands for one decimal digit. The last number used is not stored
//! anywhere; it is recovered from the directory each time.

use alloc::borrow::ToOwned;
use alloc::format;
use alloc::string::String;

use crate::dir::DirIter;
use crate::driver::Driver;
use crate::error::FsResult;

/// Placeholder for one digit of the ordinal
pub const ORDINAL_PLACEHOLDER: char = '?';

/// Next unused stem for `stem_pattern` in the root directory
pub fn next_filename_stem_matching_pattern<D: Driver>(
    driver: &D,
    stem_pattern: &str,
) -> Option<String> {
    next_filename_stem_in(driver, "", stem_pattern)
}

/// Next unused stem for `stem_pattern` in `dir`.
///
/// Returns `None` if the directory cannot be searched, or if the last
/// existing name does not end in a number. The caller appends an extension.
pub fn next_filename_stem_in<D: Driver>(driver: &D, dir: &str, stem_pattern: &str) -> Option<String> {
    let last = match last_file_matching_pattern(driver, dir, &format!("{}.*", stem_pattern)) {
        Ok(last) => last,
        Err(error) => {
            log::warn!("cannot scan {:?} for {:?}: {}", dir, stem_pattern, error);
            return None;
        },
    };

    let stem = match &last {
        Some(name) => increment_stem_ordinal(remove_extension(name)),
        None => Some(stem_pattern.replace(ORDINAL_PLACEHOLDER, "0")),
    };
    log::debug!("after {:?} comes {:?}", last, stem);
    stem
}

/// Greatest regular file name matching `pattern`, by plain string ordering
fn last_file_matching_pattern<D: Driver>(
    driver: &D,
    dir: &str,
    pattern: &str,
) -> FsResult<Option<String>> {
    let mut last: Option<String> = None;
    for entry in DirIter::try_begin(driver, dir, pattern)? {
        if !entry.is_regular_file() {
            continue;
        }
        if last.as_ref().map_or(true, |l| entry.name > *l) {
            last = Some(entry.name);
        }
    }
    Ok(last)
}

/// The part of `name` before its last `.`
pub fn remove_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(i) => &name[..i],
        None => name,
    }
}

/// Add one to the decimal number at the end of `stem`.
///
/// The number keeps its width: `CAP999` wraps around to `CAP000`.
/// Returns `None` if `stem` is empty or does not end in a digit, or if the
/// carry runs into a character below `'0'`.
pub fn increment_stem_ordinal(stem: &str) -> Option<String> {
    if stem.is_empty() {
        return None;
    }
    let mut result = stem.to_owned().into_bytes();

    let mut carried = false;
    for digit in result.iter_mut().rev() {
        match *digit {
            b'0'..=b'8' => {
                *digit += 1;
                carried = false;
                break;
            },
            b'9' => {
                *digit = b'0';
                carried = true;
            },
            c if c < b'0' => return None,
            // Left edge of the number
            _ if carried => break,
            _ => return None,
        }
    }

    if carried {
        log::debug!("ordinal of {:?} wrapped around", stem);
    }
    // Only ASCII digits were touched
    String::from_utf8(result).ok()
}

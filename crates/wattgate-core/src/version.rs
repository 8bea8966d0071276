//! Firmware version parsing
//!
//! The gateway reports versions like `"23.44.0 eb113390"`. For threshold
//! comparisons the dotted prefix is packed into a single integer using
//! base-100 positional weights: `23.44.0` -> `234400`.

/// Parse a firmware version string into its packed integer encoding.
///
/// Returns `None` when no dotted numeric prefix can be extracted. Components
/// beyond the first three are ignored; missing components count as zero.
pub fn parse_version(version: &str) -> Option<u64> {
    let first = version.split_whitespace().next()?;
    let cleaned: String = first
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let mut parts = Vec::with_capacity(3);
    for component in cleaned.split('.').take(3) {
        parts.push(component.parse::<u64>().ok()?);
    }
    while parts.len() < 3 {
        parts.push(0);
    }

    Some(
        parts
            .iter()
            .rev()
            .enumerate()
            .map(|(i, x)| x * 100u64.pow(i as u32))
            .sum(),
    )
}

//! Textual include-directive scanning.
//!
//! Only the directive shape is recognized: optional leading blanks, `#`,
//! optional blanks, `include`, optional blanks, then a target enclosed in
//! `"..."` or `<...>`. Nothing else about the source language is understood,
//! so directives inside comments or disabled `#if` blocks are picked up too.

/// Extracts the include target from a single line, if the line is an
/// include directive.
///
/// The target is the text up to the first closing `"` or `>`, with
/// surrounding whitespace trimmed.
pub fn parse_include_directive(line: &str) -> Option<&str> {
    let rest = line
        .trim_start()
        .strip_prefix('#')?
        .trim_start()
        .strip_prefix("include")?
        .trim_start();
    let body = rest.strip_prefix(['"', '<'])?;
    let end = body.find(['"', '>'])?;
    let target = body[..end].trim();
    (!target.is_empty()).then_some(target)
}

/// Collects the raw include targets of a source text, in order of appearance.
pub fn scan_includes(text: &str) -> Vec<&str> {
    text.lines().filter_map(parse_include_directive).collect()
}

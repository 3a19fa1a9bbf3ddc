use transport::Breakpoint;

/// Parse a `path:line` breakpoint as given on the command line.
///
/// The split happens at the last colon, so paths may contain colons.
pub fn parse_breakpoint(s: &str) -> Result<Breakpoint, String> {
    let (path, line) = s
        .rsplit_once(':')
        .ok_or_else(|| format!("expected PATH:LINE, got {s:?}"))?;
    if path.is_empty() {
        return Err(format!("missing path in {s:?}"));
    }
    let line = line
        .parse()
        .map_err(|_| format!("invalid line number {line:?}"))?;
    Ok(Breakpoint::new(path, line))
}

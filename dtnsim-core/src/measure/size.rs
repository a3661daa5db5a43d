use anyhow::{bail, ensure};
use logos::{Lexer, Logos};

const K: u64 = 1_024;
const M: u64 = 1_024 * 1_024;
const G: u64 = 1_024 * 1_024 * 1_024;

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n\f]+")]
enum SizeToken {
    #[token("k")]
    K,
    #[token("M")]
    M,
    #[token("G")]
    G,

    #[regex("[0-9]+")]
    Value,
}

/// Parse a size in bytes, with an optional binary `k`, `M` or `G` suffix.
///
/// ```
/// # use dtnsim_core::measure::parse_size;
/// assert_eq!(parse_size("100").unwrap(), 100);
/// assert_eq!(parse_size("2M").unwrap(), 2 * 1_024 * 1_024);
/// ```
pub fn parse_size(s: &str) -> anyhow::Result<u64> {
    let mut lex = Lexer::<'_, SizeToken>::new(s);

    let Some(Ok(SizeToken::Value)) = lex.next() else {
        bail!("Expecting to parse a number")
    };
    let number: u64 = lex.slice().parse()?;
    let unit = match lex.next() {
        None => 1,
        Some(Ok(SizeToken::K)) => K,
        Some(Ok(SizeToken::M)) => M,
        Some(Ok(SizeToken::G)) => G,
        Some(_) => bail!("Expecting to parse a size unit (k, M or G)"),
    };

    ensure!(
        lex.next().is_none(),
        "Not expecting any other tokens to parse a size"
    );

    let Some(bytes) = number.checked_mul(unit) else {
        bail!("Size `{s}' is too large")
    };
    Ok(bytes)
}

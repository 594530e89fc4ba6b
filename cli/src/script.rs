use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use cascada_core::{Coord, Position};

/// One player action of a move script.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Swap(Position, Position),
    Tap(Position),
}

impl FromStr for Action {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let verb = words.next().context("Empty action")?;
        let numbers = words
            .map(|word| word.parse::<Coord>().with_context(|| format!("Bad coordinate {word:?}")))
            .collect::<Result<Vec<_>>>()?;

        match (verb, numbers.as_slice()) {
            ("swap", &[r1, c1, r2, c2]) => Ok(Self::Swap(Position::new(r1, c1), Position::new(r2, c2))),
            ("tap", &[row, col]) => Ok(Self::Tap(Position::new(row, col))),
            ("swap", _) => bail!("swap takes four coordinates: swap r1 c1 r2 c2"),
            ("tap", _) => bail!("tap takes two coordinates: tap r c"),
            _ => bail!("Unknown action {verb:?}"),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Swap(from, to) => write!(f, "swap {from} {to}"),
            Self::Tap(pos) => write!(f, "tap {pos}"),
        }
    }
}

/// Parses a move script, one action per line. Blank lines and `#` comments are skipped.
pub fn parse_script(text: &str) -> Result<Vec<Action>> {
    text.lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line.split('#').next().unwrap_or("").trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(n, line)| line.parse().with_context(|| format!("Line {n}: {line:?}")))
        .collect()
}

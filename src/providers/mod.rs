/// Provider template strategies and the rules that pick one for a sender
pub mod bright_horizons;
pub mod procare;
pub mod resolver;
pub mod tadpoles;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::ingest::LogSink;
use crate::report::ParsedReport;

pub use resolver::{ProviderBinding, ProviderResolver, Resolution, ResolvedVia};

/// Closed set of report templates; each variant owns its own grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ParserStrategy {
    /// Generic Tadpoles template
    Tadpoles,
    /// Bright Horizons centers sending through Tadpoles
    BrightHorizons,
    /// Placeholder, always yields no report
    Procare,
}

impl ParserStrategy {
    pub const ALL: [ParserStrategy; 3] = [
        ParserStrategy::Tadpoles,
        ParserStrategy::BrightHorizons,
        ParserStrategy::Procare,
    ];

    /// Stable identifier stored in provider bindings and on reports
    pub fn id(&self) -> &'static str {
        match self {
            ParserStrategy::Tadpoles => "tadpoles",
            ParserStrategy::BrightHorizons => "bright_horizons",
            ParserStrategy::Procare => "procare",
        }
    }

    /// `None` means the HTML is not a usable report for this template
    pub fn parse(&self, html: &str, log: &dyn LogSink) -> Option<ParsedReport> {
        match self {
            ParserStrategy::Tadpoles => tadpoles::parse(html, log),
            ParserStrategy::BrightHorizons => bright_horizons::parse(html, log),
            ParserStrategy::Procare => procare::parse(html, log),
        }
    }
}

impl fmt::Display for ParserStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStrategy(pub String);

impl fmt::Display for UnknownStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown parser strategy '{}'", self.0)
    }
}

impl std::error::Error for UnknownStrategy {}

impl FromStr for ParserStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "tadpoles" => Ok(ParserStrategy::Tadpoles),
            "bright_horizons" | "brighthorizons" | "tadpoles_bright_horizons" => Ok(ParserStrategy::BrightHorizons),
            "procare" => Ok(ParserStrategy::Procare),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}

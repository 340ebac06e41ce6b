//! Sender to strategy resolution
//!
//! Order of evaluation:
//! 1. first binding whose sender matcher fits the sender (exact address or `@domain` suffix)
//! 2. its explicit strategy id, if any and known
//! 3. otherwise the inference rules on (sender domain, binding hint)
//! 4. no binding matched: fallback rules on (sender domain, each binding's hint)
//! 5. nothing: `None`, never a default template

use serde::{Deserialize, Serialize};

use crate::email::sender_domain;
use crate::ingest::LogSink;
use super::ParserStrategy;

/// A user's mapping from sender address/domain to a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderBinding {
    /// Exact address, or a domain suffix starting with `@`
    pub sender_matcher: String,
    pub strategy_id: Option<String>,
    pub provider_name_hint: Option<String>,
}

impl ProviderBinding {
    pub fn matches_sender(&self, sender: &str) -> bool {
        let matcher = self.sender_matcher.trim().to_lowercase();
        if matcher.is_empty() {
            return false;
        }
        if matcher.starts_with('@') {
            sender.ends_with(&matcher)
        } else {
            sender == matcher
        }
    }
}

/// What a rule predicate is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub sender_domain: Option<&'a str>,
    pub hint: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub enum Predicate {
    /// Sender domain equals one of these, or is a subdomain of one
    SenderDomain(&'static [&'static str]),
    /// Provider name hint contains one of these keywords (case-insensitive)
    HintContains(&'static [&'static str]),
    All(Vec<Predicate>),
}

impl Predicate {
    pub fn matches(&self, ctx: &MatchContext<'_>) -> bool {
        match self {
            Predicate::SenderDomain(domains) => ctx.sender_domain
                .map(|sender| domains.iter().any(|d| sender == *d || sender.ends_with(&format!(".{}", d))))
                .unwrap_or(false),
            Predicate::HintContains(keywords) => ctx.hint
                .map(|hint| {
                    let hint = hint.to_lowercase();
                    keywords.iter().any(|k| hint.contains(k))
                })
                .unwrap_or(false),
            Predicate::All(all) => all.iter().all(|p| p.matches(ctx)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub predicate: Predicate,
    pub strategy: ParserStrategy,
}

impl Rule {
    pub fn new(predicate: Predicate, strategy: ParserStrategy) -> Self {
        Self { predicate, strategy }
    }
}

/// How a resolution was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedVia {
    ExplicitStrategy,
    Inferred,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub strategy: ParserStrategy,
    pub via: ResolvedVia,
}

const TADPOLES_DOMAINS: &[&str] = &["tadpoles.com"];
const BRIGHT_HORIZONS_DOMAINS: &[&str] = &["brighthorizons.com"];
const PROCARE_DOMAINS: &[&str] = &["procareconnect.com", "procaresoftware.com"];

const BRIGHT_HORIZONS_KEYWORDS: &[&str] = &["bright horizons", "brighthorizons"];
const TADPOLES_KEYWORDS: &[&str] = &["tadpoles"];
const PROCARE_KEYWORDS: &[&str] = &["procare"];

/// Rules applied to the binding that matched the sender
fn inference_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            Predicate::All(vec![
                Predicate::SenderDomain(TADPOLES_DOMAINS),
                Predicate::HintContains(BRIGHT_HORIZONS_KEYWORDS),
            ]),
            ParserStrategy::BrightHorizons,
        ),
        Rule::new(Predicate::SenderDomain(BRIGHT_HORIZONS_DOMAINS), ParserStrategy::BrightHorizons),
        Rule::new(Predicate::SenderDomain(TADPOLES_DOMAINS), ParserStrategy::Tadpoles),
        Rule::new(Predicate::SenderDomain(PROCARE_DOMAINS), ParserStrategy::Procare),
    ]
}

/// Rules applied to every binding's hint when no binding matched; each needs a keyword and a known domain
fn fallback_rules() -> Vec<Rule> {
    vec![
        Rule::new(
            Predicate::All(vec![
                Predicate::SenderDomain(&["tadpoles.com", "brighthorizons.com"]),
                Predicate::HintContains(BRIGHT_HORIZONS_KEYWORDS),
            ]),
            ParserStrategy::BrightHorizons,
        ),
        Rule::new(
            Predicate::All(vec![
                Predicate::SenderDomain(TADPOLES_DOMAINS),
                Predicate::HintContains(TADPOLES_KEYWORDS),
            ]),
            ParserStrategy::Tadpoles,
        ),
        Rule::new(
            Predicate::All(vec![
                Predicate::SenderDomain(PROCARE_DOMAINS),
                Predicate::HintContains(PROCARE_KEYWORDS),
            ]),
            ParserStrategy::Procare,
        ),
    ]
}

pub struct ProviderResolver {
    inference: Vec<Rule>,
    fallback: Vec<Rule>,
}

impl Default for ProviderResolver {
    fn default() -> Self {
        Self::with_rules(inference_rules(), fallback_rules())
    }
}

impl ProviderResolver {
    pub fn with_rules(inference: Vec<Rule>, fallback: Vec<Rule>) -> Self {
        Self { inference, fallback }
    }

    /// Pick the strategy for `sender_email` given the user's bindings, in configured order
    pub fn resolve(&self, sender_email: &str, bindings: &[ProviderBinding], log: &dyn LogSink) -> Option<Resolution> {
        let sender = sender_email.trim().to_lowercase();
        let domain = sender_domain(&sender);

        if let Some(binding) = bindings.iter().find(|b| b.matches_sender(&sender)) {
            log.debug(&format!("Sender matched binding '{}'", binding.sender_matcher));

            if let Some(explicit) = binding.strategy_id.as_deref().filter(|s| !s.trim().is_empty()) {
                match explicit.parse::<ParserStrategy>() {
                    Ok(strategy) => {
                        return Some(Resolution { strategy, via: ResolvedVia::ExplicitStrategy });
                    }
                    Err(e) => log.warn(&format!("Binding '{}': {}, inferring instead", binding.sender_matcher, e)),
                }
            }

            let ctx = MatchContext {
                sender_domain: domain.as_deref(),
                hint: binding.provider_name_hint.as_deref(),
            };
            return first_match(&self.inference, &ctx)
                .map(|strategy| Resolution { strategy, via: ResolvedVia::Inferred });
        }

        bindings.iter().find_map(|binding| {
            let ctx = MatchContext {
                sender_domain: domain.as_deref(),
                hint: binding.provider_name_hint.as_deref(),
            };
            first_match(&self.fallback, &ctx)
        })
        .map(|strategy| {
            log.debug(&format!("No binding matched; hint fallback selected {}", strategy));
            Resolution { strategy, via: ResolvedVia::Fallback }
        })
    }
}

fn first_match(rules: &[Rule], ctx: &MatchContext<'_>) -> Option<ParserStrategy> {
    rules.iter().find(|rule| rule.predicate.matches(ctx)).map(|rule| rule.strategy)
}

//! URL-centric phishing heuristics.
//!
//! Every `http`/`https` URL in a text is decomposed lexically and run
//! through ten independent weighted checks. Nothing here touches the
//! network: all signals come from the URL string itself.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use url::Url;

pub const DEFAULT_SUSPICIOUS_TLDS: &[&str] = &[
    "tk", "ml", "ga", "cf", "gq", "xyz", "top", "work", "click", "link", "download", "racing",
    "accountant", "loan", "win", "bid",
];

pub const DEFAULT_URL_SHORTENERS: &[&str] = &[
    "bit.ly", "goo.gl", "tinyurl.com", "ow.ly", "t.co", "is.gd", "buff.ly", "adf.ly",
    "short.link", "cutt.ly", "rb.gy",
];

pub const DEFAULT_PROTECTED_BRANDS: &[&str] = &[
    "paypal", "amazon", "microsoft", "google", "apple", "facebook", "netflix", "instagram",
    "linkedin", "twitter", "dropbox", "adobe", "ebay", "wellsfargo", "chase", "bankofamerica",
    "irs", "usps", "fedex", "dhl",
];

/// Two-label public suffixes that must not be mistaken for `domain.tld`.
const COMPOUND_SUFFIXES: &[&str] = &[
    "co.uk", "org.uk", "ac.uk", "gov.uk", "ltd.uk", "com.au", "net.au", "org.au", "co.nz",
    "co.jp", "co.in", "co.kr", "co.za", "com.br", "com.cn", "com.mx", "com.tr", "com.sg",
];

const LONG_URL_CHARS: usize = 150;
const MAX_SUBDOMAINS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Heuristic {
    IpAddressHost,
    SuspiciousTld,
    UrlShortener,
    ExcessiveSubdomains,
    /// Counted once per URL however many brands the domain label contains;
    /// every matched brand is named in the reason.
    BrandImpersonation,
    NumericDomain,
    ExcessiveLength,
    AtSymbol,
    DoubleSlashPath,
    MalformedUrl,
}

impl Heuristic {
    pub const ALL: [Heuristic; 10] = [
        Heuristic::IpAddressHost,
        Heuristic::SuspiciousTld,
        Heuristic::UrlShortener,
        Heuristic::ExcessiveSubdomains,
        Heuristic::BrandImpersonation,
        Heuristic::NumericDomain,
        Heuristic::ExcessiveLength,
        Heuristic::AtSymbol,
        Heuristic::DoubleSlashPath,
        Heuristic::MalformedUrl,
    ];

    pub fn weight(&self) -> u32 {
        match self {
            Heuristic::IpAddressHost => 8,
            Heuristic::SuspiciousTld => 6,
            Heuristic::UrlShortener => 7,
            Heuristic::ExcessiveSubdomains => 5,
            Heuristic::BrandImpersonation => 9,
            Heuristic::NumericDomain => 4,
            Heuristic::ExcessiveLength => 3,
            Heuristic::AtSymbol => 8,
            Heuristic::DoubleSlashPath => 5,
            Heuristic::MalformedUrl => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            RiskLevel::High
        } else if score >= 40.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => f.write_str("Low"),
            RiskLevel::Medium => f.write_str("Medium"),
            RiskLevel::High => f.write_str("High"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlFinding {
    pub url: String,
    pub risk_score: u32,
    pub reasons: Vec<String>,
    pub matched: Vec<Heuristic>,
}

impl UrlFinding {
    pub fn is_suspicious(&self) -> bool {
        !self.matched.is_empty()
    }

    fn record(&mut self, heuristic: Heuristic, reason: String) {
        if self.matched.contains(&heuristic) {
            return;
        }
        self.risk_score += heuristic.weight();
        self.matched.push(heuristic);
        self.reasons.push(reason);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhishingResult {
    pub score: f64,
    pub risk_level: RiskLevel,
    pub url_count: usize,
    pub suspicious_findings: Vec<UrlFinding>,
    /// Reasons across all URLs, de-duplicated, first occurrence first.
    pub indicators: Vec<String>,
    pub explanation: String,
}

impl PhishingResult {
    pub fn no_urls() -> Self {
        Self {
            score: 0.0,
            risk_level: RiskLevel::Low,
            url_count: 0,
            suspicious_findings: Vec::new(),
            indicators: Vec::new(),
            explanation: "No URLs found.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhishingConfig {
    pub suspicious_tlds: Vec<String>,
    pub url_shorteners: Vec<String>,
    pub protected_brands: Vec<String>,
}

impl Default for PhishingConfig {
    fn default() -> Self {
        Self {
            suspicious_tlds: owned(DEFAULT_SUSPICIOUS_TLDS),
            url_shorteners: owned(DEFAULT_URL_SHORTENERS),
            protected_brands: owned(DEFAULT_PROTECTED_BRANDS),
        }
    }
}

fn owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn lowercased(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Lexical split of a URL. Never fails; a URL with no `://` simply has an
/// empty authority.
#[derive(Debug)]
struct UrlParts<'a> {
    authority: &'a str,
    path: &'a str,
    host: String,
    /// Host-looking text after an `@` inside the path, e.g. `evil.tk` in
    /// `/login@evil.tk`.
    embedded_target: Option<String>,
}

impl<'a> UrlParts<'a> {
    fn split(url: &'a str) -> Self {
        let rest = match url.find("://") {
            Some(pos) => &url[pos + 3..],
            None => "",
        };

        let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let authority = &rest[..authority_end];
        let after_authority = &rest[authority_end..];
        let path = if after_authority.starts_with('/') {
            let end = after_authority.find(['?', '#']).unwrap_or(after_authority.len());
            &after_authority[..end]
        } else {
            ""
        };

        let host_port = authority.rsplit('@').next().unwrap_or("");
        let host = if host_port.starts_with('[') {
            match host_port.find(']') {
                Some(end) => &host_port[..=end],
                None => host_port,
            }
        } else {
            host_port.split(':').next().unwrap_or("")
        };

        let embedded_target = path.rsplit_once('@').and_then(|(_, target)| {
            let target = target.split('/').next().unwrap_or("");
            let looks_like_host = target.contains('.')
                && target.chars().any(|c| c.is_ascii_alphabetic())
                && !target.starts_with('.');
            looks_like_host.then(|| target.trim_end_matches('.').to_lowercase())
        });

        Self {
            authority,
            path,
            host: host.trim_end_matches('.').to_lowercase(),
            embedded_target,
        }
    }
}

/// Public suffix, registered-domain label and subdomain labels of a host.
#[derive(Debug, PartialEq)]
struct HostParts {
    suffix: Option<String>,
    domain: String,
    subdomains: Vec<String>,
}

impl HostParts {
    fn registered_domain(&self) -> Option<String> {
        self.suffix
            .as_ref()
            .filter(|_| !self.domain.is_empty())
            .map(|suffix| format!("{}.{}", self.domain, suffix))
    }
}

pub struct UrlRiskScorer {
    url_regex: Regex,
    ipv4_regex: Regex,
    digit_run_regex: Regex,
    suspicious_tlds: HashSet<String>,
    url_shorteners: HashSet<String>,
    protected_brands: Vec<String>,
}

impl Default for UrlRiskScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlRiskScorer {
    pub fn new() -> Self {
        Self::from_config(&PhishingConfig::default())
    }

    pub fn from_config(config: &PhishingConfig) -> Self {
        Self {
            url_regex: Regex::new(r"https?://[A-Za-z0-9!$%&'()*+,\-./:;<=>?@\[\\\]^_]+")
                .expect("static URL pattern"),
            ipv4_regex: Regex::new(r"^(\d{1,3}\.){3}\d{1,3}$").expect("static IPv4 pattern"),
            digit_run_regex: Regex::new(r"[0-9]{4,}").expect("static digit pattern"),
            suspicious_tlds: lowercased(&config.suspicious_tlds).into_iter().collect(),
            url_shorteners: lowercased(&config.url_shorteners).into_iter().collect(),
            protected_brands: lowercased(&config.protected_brands),
        }
    }

    /// Distinct URLs in first-occurrence order.
    pub fn extract_urls(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.url_regex
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|url| seen.insert(*url))
            .map(str::to_string)
            .collect()
    }

    pub fn score_urls(&self, text: &str) -> PhishingResult {
        let urls = self.extract_urls(text);
        if urls.is_empty() {
            return PhishingResult::no_urls();
        }

        let findings: Vec<UrlFinding> = urls.iter().map(|url| self.score_url(url)).collect();
        let total_risk: u32 = findings.iter().map(|f| f.risk_score).sum();
        let average = total_risk as f64 / urls.len() as f64;
        let score = round2((average * 10.0).min(100.0));
        let risk_level = RiskLevel::from_score(score);

        let mut indicators: Vec<String> = Vec::new();
        for reason in findings.iter().flat_map(|f| f.reasons.iter()) {
            if !indicators.contains(reason) {
                indicators.push(reason.clone());
            }
        }

        let suspicious_findings: Vec<UrlFinding> =
            findings.into_iter().filter(UrlFinding::is_suspicious).collect();
        for finding in &suspicious_findings {
            log::debug!(
                "Suspicious URL {} (risk {}): {}",
                finding.url,
                finding.risk_score,
                finding.reasons.join("; ")
            );
        }

        let explanation = explain_risk(risk_level, urls.len(), indicators.len());

        PhishingResult {
            score,
            risk_level,
            url_count: urls.len(),
            suspicious_findings,
            indicators,
            explanation,
        }
    }

    /// Run every heuristic against one URL.
    pub fn score_url(&self, url: &str) -> UrlFinding {
        let parts = UrlParts::split(url);
        let host = self.host_parts(&parts.host);
        let target = parts.embedded_target.as_deref().map(|t| self.host_parts(t));

        let mut finding = UrlFinding {
            url: url.to_string(),
            risk_score: 0,
            reasons: Vec::new(),
            matched: Vec::new(),
        };

        for heuristic in Heuristic::ALL {
            if let Some(reason) = self.check(heuristic, url, &parts, &host, target.as_ref()) {
                finding.record(heuristic, reason);
            }
        }

        finding
    }

    fn check(
        &self,
        heuristic: Heuristic,
        url: &str,
        parts: &UrlParts,
        host: &HostParts,
        target: Option<&HostParts>,
    ) -> Option<String> {
        match heuristic {
            Heuristic::IpAddressHost => self
                .is_ipv4(&parts.host)
                .then(|| "Uses IP address instead of domain name".to_string()),
            Heuristic::SuspiciousTld => std::iter::once(host)
                .chain(target)
                .filter_map(|h| h.suffix.as_ref())
                .find(|suffix| self.suspicious_tlds.contains(suffix.as_str()))
                .map(|suffix| format!("Suspicious domain extension (.{})", suffix)),
            Heuristic::UrlShortener => host
                .registered_domain()
                .filter(|domain| self.url_shorteners.contains(domain))
                .map(|_| "Uses URL shortener (hides real destination)".to_string()),
            Heuristic::ExcessiveSubdomains => (host.subdomains.len() > MAX_SUBDOMAINS)
                .then(|| format!("Excessive subdomains ({})", host.subdomains.len())),
            Heuristic::BrandImpersonation => {
                let brands: Vec<&str> = self
                    .protected_brands
                    .iter()
                    .filter(|brand| host.domain.contains(brand.as_str()) && host.domain != **brand)
                    .map(String::as_str)
                    .collect();
                (!brands.is_empty())
                    .then(|| format!("Possible impersonation of {}", brands.join(", ")))
            }
            Heuristic::NumericDomain => self
                .digit_run_regex
                .is_match(&host.domain)
                .then(|| "Domain contains many numbers".to_string()),
            Heuristic::ExcessiveLength => (url.chars().count() > LONG_URL_CHARS)
                .then(|| "Unusually long URL".to_string()),
            Heuristic::AtSymbol => (parts.authority.contains('@') || target.is_some())
                .then(|| "Contains @ symbol (redirect trick)".to_string()),
            Heuristic::DoubleSlashPath => parts
                .path
                .contains("//")
                .then(|| "Double slashes in URL path".to_string()),
            Heuristic::MalformedUrl => (!is_well_formed(url, &parts.host))
                .then(|| "Malformed URL structure".to_string()),
        }
    }

    fn is_ipv4(&self, host: &str) -> bool {
        self.ipv4_regex.is_match(host)
    }

    fn host_parts(&self, host: &str) -> HostParts {
        if self.is_ipv4(host) {
            return HostParts {
                suffix: None,
                domain: host.to_string(),
                subdomains: Vec::new(),
            };
        }

        let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
        let suffix_len = match labels.len() {
            0 | 1 => 0,
            n if n >= 3 && COMPOUND_SUFFIXES.contains(&labels[n - 2..].join(".").as_str()) => 2,
            _ => 1,
        };

        if suffix_len == 0 {
            return HostParts {
                suffix: None,
                domain: labels.first().map(|l| l.to_string()).unwrap_or_default(),
                subdomains: Vec::new(),
            };
        }

        let domain_pos = labels.len() - suffix_len - 1;
        HostParts {
            suffix: Some(labels[domain_pos + 1..].join(".")),
            domain: labels[domain_pos].to_string(),
            subdomains: labels[..domain_pos].iter().map(|l| l.to_string()).collect(),
        }
    }
}

/// A strict parse must succeed and the lexical host must be present; the
/// strict parser alone would accept `http:///x` by skipping the extra slash.
fn is_well_formed(url: &str, lexical_host: &str) -> bool {
    if lexical_host.is_empty() {
        return false;
    }
    match Url::parse(url) {
        Ok(parsed) => parsed.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

fn explain_risk(level: RiskLevel, url_count: usize, indicator_count: usize) -> String {
    match level {
        RiskLevel::High => format!(
            "HIGH RISK: Found {} URL(s) with {} phishing indicators. This email shows strong signs of phishing.",
            url_count, indicator_count
        ),
        RiskLevel::Medium => format!(
            "MEDIUM RISK: Found {} URL(s) with {} suspicious patterns. Exercise caution before clicking links.",
            url_count, indicator_count
        ),
        RiskLevel::Low => format!(
            "LOW RISK: Found {} URL(s) with {} suspicious indicators.",
            url_count, indicator_count
        ),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

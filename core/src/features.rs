//! Feature extraction: turns a call, bid or account into a FeatureBag.
//!
//! RULE: Everything here is pure. No I/O, no clock reads, no error path.
//! Missing or zero-valued inputs fall back to neutral defaults so the
//! classifier and rule engine always get a fully populated record.

use crate::{
    entity::{Account, Bid, Call},
    types::EntityKind,
};
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Heuristic tables ─────────────────────────────────────────────────────────

const DEFAULT_REPUTATION: f64 = 0.5;
const DEFAULT_QUALITY: f64 = 50.0;
const SHORT_CALL_SECS: u32 = 10;

const TOLL_FREE_PREFIXES: &[&str] = &[
    "+1800", "+1833", "+1844", "+1855", "+1866", "+1877", "+1888",
];
const PREMIUM_RATE_PREFIXES: &[&str] = &["+1900", "+1976"];

/// Throwaway mail providers. Matched as substrings of the lowercased address.
pub const SUSPICIOUS_EMAIL_DOMAINS: &[&str] = &[
    "tempmail",
    "guerrillamail",
    "10minutemail",
    "mailinator",
    "throwaway",
    "yopmail",
    "trashmail",
    "sharklasers",
    "getnada",
    "dispostable",
];

/// Amounts buyers use when probing the exchange with test traffic.
pub const SUSPICIOUS_TEST_AMOUNTS: &[f64] = &[
    0.01, 0.99, 1.00, 1.11, 9.99, 10.00, 11.11, 12.34, 99.99, 100.00, 111.11, 999.99, 1000.00,
];

// ── Feature records ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallFeatures {
    pub hour_of_day:       u32,
    pub is_weekend:        bool,
    pub duration_secs:     u32,
    pub is_short_call:     bool,
    pub caller_reputation: f64,
    pub callee_reputation: f64,
    pub is_international:  bool,
    pub is_toll_free:      bool,
    pub is_premium_rate:   bool,
    pub carrier_known:     bool,
    pub is_self_call:      bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BidFeatures {
    pub amount:                 f64,
    pub hour_of_day:            u32,
    pub buyer_quality:          f64,
    pub account_age_days:       i64,
    pub is_round_amount:        bool,
    pub has_repeated_cents:     bool,
    pub is_suspicious_amount:   bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountFeatures {
    pub account_age_days:   i64,
    pub is_free_mail:       bool,
    pub has_valid_phone:    bool,
    pub quality_score:      f64,
    pub has_company:        bool,
    pub email_digit_ratio:  f64,
}

/// One bag, three shapes. Built fresh per evaluation and never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureBag {
    Call(CallFeatures),
    Bid(BidFeatures),
    Account(AccountFeatures),
}

impl FeatureBag {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Call(_)    => EntityKind::Call,
            Self::Bid(_)     => EntityKind::Bid,
            Self::Account(_) => EntityKind::Account,
        }
    }

    /// Flatten into named numeric signals. Booleans become 0.0 / 1.0.
    /// Names are stable: classifier weights and rule predicates key on them.
    pub fn numeric(&self) -> BTreeMap<&'static str, f64> {
        let mut m = BTreeMap::new();
        match self {
            Self::Call(f) => {
                m.insert("hour_of_day", f.hour_of_day as f64);
                m.insert("is_weekend", flag(f.is_weekend));
                m.insert("duration_secs", f.duration_secs as f64);
                m.insert("is_short_call", flag(f.is_short_call));
                m.insert("caller_reputation", f.caller_reputation);
                m.insert("callee_reputation", f.callee_reputation);
                m.insert("is_international", flag(f.is_international));
                m.insert("is_toll_free", flag(f.is_toll_free));
                m.insert("is_premium_rate", flag(f.is_premium_rate));
                m.insert("carrier_known", flag(f.carrier_known));
                m.insert("is_self_call", flag(f.is_self_call));
            }
            Self::Bid(f) => {
                m.insert("amount", f.amount);
                m.insert("hour_of_day", f.hour_of_day as f64);
                m.insert("buyer_quality", f.buyer_quality);
                m.insert("account_age_days", f.account_age_days as f64);
                m.insert("is_round_amount", flag(f.is_round_amount));
                m.insert("has_repeated_cents", flag(f.has_repeated_cents));
                m.insert("is_suspicious_amount", flag(f.is_suspicious_amount));
            }
            Self::Account(f) => {
                m.insert("account_age_days", f.account_age_days as f64);
                m.insert("is_free_mail", flag(f.is_free_mail));
                m.insert("has_valid_phone", flag(f.has_valid_phone));
                m.insert("quality_score", f.quality_score);
                m.insert("has_company", flag(f.has_company));
                m.insert("email_digit_ratio", f.email_digit_ratio);
            }
        }
        m
    }
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

// ── Extraction ───────────────────────────────────────────────────────────────

pub fn extract_call(call: &Call) -> FeatureBag {
    let from = normalize_number(&call.from_number);
    let to = normalize_number(&call.to_number);

    FeatureBag::Call(CallFeatures {
        hour_of_day:       call.started_at.hour(),
        is_weekend:        matches!(call.started_at.weekday(), Weekday::Sat | Weekday::Sun),
        duration_secs:     call.duration_secs,
        is_short_call:     call.duration_secs > 0 && call.duration_secs < SHORT_CALL_SECS,
        caller_reputation: number_reputation(&from),
        callee_reputation: number_reputation(&to),
        is_international:  !from.is_empty() && !from.starts_with("+1"),
        is_toll_free:      TOLL_FREE_PREFIXES.iter().any(|p| to.starts_with(p)),
        is_premium_rate:   PREMIUM_RATE_PREFIXES.iter().any(|p| to.starts_with(p)),
        carrier_known:     call.carrier.as_deref().is_some_and(|c| !c.trim().is_empty()),
        is_self_call:      !from.is_empty() && from == to,
    })
}

/// `account` is the buyer behind the bid, when the caller has it.
/// `now` anchors the account-age computation.
pub fn extract_bid(bid: &Bid, account: Option<&Account>, now: DateTime<Utc>) -> FeatureBag {
    FeatureBag::Bid(BidFeatures {
        amount:               bid.amount,
        hour_of_day:          bid.placed_at.hour(),
        buyer_quality:        account.and_then(|a| a.quality_score).unwrap_or(DEFAULT_QUALITY),
        account_age_days:     account.map(|a| age_days(a.created_at, now)).unwrap_or(0),
        is_round_amount:      is_round_amount(bid.amount),
        has_repeated_cents:   has_repeated_cents(bid.amount),
        is_suspicious_amount: is_suspicious_test_amount(bid.amount),
    })
}

pub fn extract_account(account: &Account, now: DateTime<Utc>) -> FeatureBag {
    FeatureBag::Account(AccountFeatures {
        account_age_days:  age_days(account.created_at, now),
        is_free_mail:      is_suspicious_email(&account.email),
        has_valid_phone:   account.phone.as_deref().is_some_and(is_valid_phone),
        quality_score:     account.quality_score.unwrap_or(DEFAULT_QUALITY),
        has_company:       account.company_name.as_deref().is_some_and(|c| !c.trim().is_empty()),
        email_digit_ratio: email_digit_ratio(&account.email),
    })
}

// ── Shared heuristics ────────────────────────────────────────────────────────

pub fn is_suspicious_email(email: &str) -> bool {
    let email = email.to_ascii_lowercase();
    SUSPICIOUS_EMAIL_DOMAINS.iter().any(|d| email.contains(d))
}

/// E.164-ish: optional '+', 10 to 15 digits, no leading zero.
/// Spaces, dashes, dots and parentheses are tolerated as separators.
pub fn is_valid_phone(phone: &str) -> bool {
    let n = normalize_number(phone);
    let digits = n.strip_prefix('+').unwrap_or(&n);
    (10..=15).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0')
}

pub fn is_suspicious_test_amount(amount: f64) -> bool {
    SUSPICIOUS_TEST_AMOUNTS.iter().any(|a| (a - amount).abs() < 0.005)
}

fn is_round_amount(amount: f64) -> bool {
    amount >= 10.0 && (amount % 10.0).abs() < 0.005
}

/// True for cents like .11, .22 ... .99.
fn has_repeated_cents(amount: f64) -> bool {
    let cents = ((amount * 100.0).round() as i64).rem_euclid(100);
    cents != 0 && cents / 10 == cents % 10
}

fn normalize_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect()
}

/// Crude standing of a number from its shape alone. Real reputation
/// lives with the denylist and classifier; this just separates obviously
/// junk numbers from ordinary ones.
fn number_reputation(normalized: &str) -> f64 {
    if normalized.is_empty() {
        return DEFAULT_REPUTATION;
    }
    if !is_valid_phone(normalized) {
        return 0.2;
    }

    let mut rep: f64 = if normalized.starts_with("+1") || !normalized.starts_with('+') {
        0.7
    } else {
        DEFAULT_REPUTATION
    };

    let tail: Vec<char> = normalized.chars().rev().take(7).collect();
    if tail.len() == 7 && tail.iter().all(|c| *c == tail[0]) {
        rep -= 0.3;
    }
    if PREMIUM_RATE_PREFIXES.iter().any(|p| normalized.starts_with(p)) {
        rep -= 0.3;
    }
    rep.clamp(0.0, 1.0)
}

fn age_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created_at).num_days().max(0)
}

fn email_digit_ratio(email: &str) -> f64 {
    let local = email.split('@').next().unwrap_or_default();
    if local.is_empty() {
        return 0.0;
    }
    let digits = local.chars().filter(|c| c.is_ascii_digit()).count();
    digits as f64 / local.chars().count() as f64
}

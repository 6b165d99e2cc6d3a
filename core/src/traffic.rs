//! Seeded synthetic exchange traffic.
//!
//! Produces a realistic-looking mix of calls, bids and account checks with
//! a small share of abusive patterns (pump numbers, call bursts, throwaway
//! sign-ups, probe bids). Used by the runner and the determinism tests.

use crate::{
    check_result::FraudCheckResult,
    entity::{Account, Bid, Call},
    error::RiskResult,
    orchestrator::FraudOrchestrator,
    rng::{StreamRng, TrafficStream},
};
use chrono::{DateTime, Duration, Utc};

const BUYER_POOL: usize = 40;
const CALLER_POOL: u64 = 500;

const ABUSE_RATE: f64 = 0.08;
const CALL_SHARE: f64 = 0.6;
const BID_SHARE: f64 = 0.3;

const DESTINATIONS: &[&str] = &[
    "+18005550100", "+18885550111", "+14155550140", "+12125550188", "+13125550177",
];
const PUMP_NUMBERS: &[&str] = &["+19005550199", "+19765550123"];
const CARRIERS: &[&str] = &["att", "verizon", "tmobile", "bandwidth"];
const MAIL_DOMAINS: &[&str] = &["acme-leads.com", "callpath.io", "gmail.com", "outlook.com"];
const THROWAWAY_DOMAINS: &[&str] = &["mailinator.com", "yopmail.com", "10minutemail.net"];
const PROBE_AMOUNTS: &[f64] = &[0.01, 1.00, 9.99, 99.99];

#[derive(Debug, Clone)]
pub enum TrafficEvent {
    Call(Call),
    Bid { bid: Bid, buyer: Option<Account> },
    Account(Account),
}

impl TrafficEvent {
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::Call(c)        => c.started_at,
            Self::Bid { bid, .. } => bid.placed_at,
            Self::Account(a)     => a.created_at,
        }
    }

    /// Route the event to the matching orchestrator entry point.
    pub fn evaluate(&self, orchestrator: &FraudOrchestrator) -> RiskResult<FraudCheckResult> {
        match self {
            Self::Call(c)            => orchestrator.check_call(c),
            Self::Bid { bid, buyer } => orchestrator.check_bid(bid, buyer.as_ref()),
            Self::Account(a)         => orchestrator.check_account(a),
        }
    }
}

pub struct TrafficGenerator {
    start:    DateTime<Utc>,
    mix:      StreamRng,
    calls:    StreamRng,
    bids:     StreamRng,
    accounts: StreamRng,
    abuse:    StreamRng,
    buyers:   Vec<Account>,
    seq:      u64,
}

impl TrafficGenerator {
    pub fn new(seed: u64, start: DateTime<Utc>) -> Self {
        let mut accounts = StreamRng::new(seed, TrafficStream::Accounts);
        let buyers = (0..BUYER_POOL)
            .map(|i| buyer_account(&mut accounts, i, start))
            .collect();
        Self {
            start,
            mix:   StreamRng::new(seed, TrafficStream::Mix),
            calls: StreamRng::new(seed, TrafficStream::Calls),
            bids:  StreamRng::new(seed, TrafficStream::Bids),
            accounts,
            abuse: StreamRng::new(seed, TrafficStream::Abuse),
            buyers,
            seq: 0,
        }
    }

    /// Next `n` events, one second apart.
    pub fn generate(&mut self, n: usize) -> Vec<TrafficEvent> {
        (0..n).map(|_| self.next_event()).collect()
    }

    fn next_event(&mut self) -> TrafficEvent {
        self.seq += 1;
        let at = self.start + Duration::seconds(self.seq as i64);
        let abusive = self.abuse.chance(ABUSE_RATE);
        let roll = self.mix.next_f64();

        if roll < CALL_SHARE {
            TrafficEvent::Call(self.call(at, abusive))
        } else if roll < CALL_SHARE + BID_SHARE {
            let (bid, buyer) = self.bid(at, abusive);
            TrafficEvent::Bid { bid, buyer }
        } else {
            TrafficEvent::Account(self.signup(at, abusive))
        }
    }

    fn call(&mut self, at: DateTime<Utc>, abusive: bool) -> Call {
        let r = &mut self.calls;
        // Abusive callers come from a tiny pool so they trip velocity limits.
        let caller = if abusive {
            format!("+1415555{:04}", r.below(3))
        } else {
            format!("+1{}{:07}", 200 + r.below(700), r.below(CALLER_POOL) * 7919 % 10_000_000)
        };
        let to = if abusive && r.chance(0.5) {
            r.pick(PUMP_NUMBERS).to_string()
        } else {
            r.pick(DESTINATIONS).to_string()
        };
        let buyer = r.below(BUYER_POOL as u64) as usize;

        Call {
            id:            format!("call-{:07}", self.seq),
            from_number:   caller,
            to_number:     to,
            buyer_id:      Some(self.buyers[buyer].id.clone()),
            seller_id:     Some(format!("seller-{:03}", r.below(25))),
            started_at:    at,
            duration_secs: if abusive { r.below(8) as u32 } else { 30 + r.below(600) as u32 },
            carrier:       if abusive && r.chance(0.7) { None } else { Some(r.pick(CARRIERS).to_string()) },
        }
    }

    fn bid(&mut self, at: DateTime<Utc>, abusive: bool) -> (Bid, Option<Account>) {
        let r = &mut self.bids;
        let buyer = self.buyers[r.below(BUYER_POOL as u64) as usize].clone();
        let amount = if abusive {
            *r.pick(PROBE_AMOUNTS)
        } else {
            (r.between(4.0, 180.0) * 100.0).round() / 100.0
        };
        let bid = Bid {
            id:        format!("bid-{:07}", self.seq),
            call_id:   format!("call-{:07}", self.seq.saturating_sub(1)),
            buyer_id:  buyer.id.clone(),
            amount,
            placed_at: at,
        };
        // The bidding service does not always have the account loaded.
        let account = if r.chance(0.9) { Some(buyer) } else { None };
        (bid, account)
    }

    fn signup(&mut self, at: DateTime<Utc>, abusive: bool) -> Account {
        let r = &mut self.accounts;
        let id = format!("acct-{:07}", self.seq);
        let (email, phone) = if abusive {
            (
                format!("{}@{}", r.below(99_999_999), r.pick(THROWAWAY_DOMAINS)),
                Some(format!("{}", r.below(99_999))),
            )
        } else {
            (
                format!("ops{}@{}", r.below(1000), r.pick(MAIL_DOMAINS)),
                Some(format!("+1{}555{:04}", 200 + r.below(700), r.below(10_000))),
            )
        };
        Account {
            id,
            email,
            phone,
            company_name: if abusive { None } else { Some(format!("Lead Co {}", r.below(500))) },
            created_at:   at,
            quality_score: None,
        }
    }
}

fn buyer_account(r: &mut StreamRng, i: usize, start: DateTime<Utc>) -> Account {
    Account {
        id:            format!("buyer-{i:03}"),
        email:         format!("buying{i}@{}", r.pick(MAIL_DOMAINS)),
        phone:         Some(format!("+1312555{:04}", r.below(10_000))),
        company_name:  Some(format!("Buyer Group {i}")),
        created_at:    start - Duration::days(30 + r.below(700) as i64),
        quality_score: Some(r.between(20.0, 100.0).round()),
    }
}

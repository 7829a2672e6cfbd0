//! Deterministic demo data for the simulated CRM.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use shadowcrm_model::{DealStage, NewContact, NewDeal};
use shadowcrm_storage::{RecordStore, StorageError};

const COMPANIES: &[&str] = &[
    "Acme Corp",
    "Globex Industries",
    "Initech",
    "Umbrella Corp",
    "Stark Industries",
    "Wayne Enterprises",
    "Cyberdyne Systems",
    "Soylent Corp",
    "Massive Dynamic",
    "Hooli",
    "Pied Piper",
    "Dunder Mifflin",
    "Sterling Cooper",
    "Wonka Industries",
    "Aperture Science",
];

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael", "Linda", "David",
    "Elizabeth", "William", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
    "Charles", "Karen", "Daniel", "Lisa", "Matthew", "Nancy", "Anthony", "Betty", "Mark",
    "Sandra", "Steven", "Margaret", "Paul", "Ashley", "Andrew", "Dorothy", "Joshua", "Kimberly",
    "Kenneth", "Emily", "Kevin", "Donna", "Brian", "Michelle", "George", "Carol", "Timothy",
    "Amanda", "Ronald", "Melissa",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson", "Thomas", "Taylor",
    "Moore", "Jackson", "Martin", "Lee", "Perez", "Thompson", "White", "Harris", "Sanchez",
    "Clark", "Ramirez", "Lewis", "Robinson", "Walker", "Young", "Allen", "King", "Wright",
    "Scott", "Torres", "Nguyen", "Hill", "Flores", "Green", "Adams", "Nelson", "Baker", "Hall",
    "Rivera", "Campbell", "Mitchell",
];

const TITLES: &[&str] = &[
    "CEO",
    "CTO",
    "CFO",
    "VP of Engineering",
    "VP of Sales",
    "VP of Marketing",
    "Director of Operations",
    "Director of Engineering",
    "Head of Product",
    "Head of Sales",
    "Senior Account Executive",
    "Account Manager",
    "Sales Engineer",
    "Product Manager",
    "Engineering Manager",
];

const DEAL_TEMPLATES: &[&str] = &[
    "Enterprise License",
    "Platform Migration",
    "Annual Renewal",
    "Expansion Deal",
    "Pilot Program",
    "Professional Services",
    "Data Integration",
];

/// Deal sizes are drawn from one of these bands, picked uniformly.
const AMOUNT_BANDS: &[(f64, f64)] = &[
    (5_000.0, 25_000.0),
    (25_000.0, 75_000.0),
    (75_000.0, 200_000.0),
    (200_000.0, 500_000.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedOptions {
    pub contacts: usize,
    pub deals: usize,
    pub rng_seed: u64,
}

impl Default for SeedOptions {
    fn default() -> Self {
        SeedOptions {
            contacts: 47,
            deals: 23,
            rng_seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub contacts: usize,
    pub deals: usize,
}

/// Replace the store's contents with generated contacts and deals.
///
/// Writes straight to the store; admission control is not involved.
pub fn seed_demo_data(store: &RecordStore, options: &SeedOptions) -> Result<SeedSummary, StorageError> {
    let mut rng = StdRng::seed_from_u64(options.rng_seed);
    let now = OffsetDateTime::now_utc();
    store.clear()?;

    let mut used_emails = HashSet::new();
    let mut contact_ids = Vec::with_capacity(options.contacts);
    for _ in 0..options.contacts {
        let first = pick(&mut rng, FIRST_NAMES);
        let last = pick(&mut rng, LAST_NAMES);
        let company = pick(&mut rng, COMPANIES);
        let domain: String = company
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let base = format!("{}.{}", first.to_lowercase(), last.to_lowercase());
        let mut email = format!("{}@{}.com", base, domain);
        let mut suffix = 1;
        while !used_emails.insert(email.clone()) {
            email = format!("{}{}@{}.com", base, suffix, domain);
            suffix += 1;
        }

        let contact = NewContact {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email,
            company: company.to_string(),
            title: pick(&mut rng, TITLES).to_string(),
            phone: Some(format!(
                "+1-{}-{}-{}",
                rng.gen_range(200..=999),
                rng.gen_range(100..=999),
                rng.gen_range(1000..=9999)
            )),
        };
        let created = timestamp(now - Duration::days(rng.gen_range(1..=365)));
        contact_ids.push(store.insert_contact(&contact, &created)?.id);
    }

    for _ in 0..options.deals {
        let company = pick(&mut rng, COMPANIES);
        let (low, high) = AMOUNT_BANDS[rng.gen_range(0..AMOUNT_BANDS.len())];
        let amount = Decimal::from_f64(rng.gen_range(low..high))
            .unwrap_or_default()
            .round_dp(2);
        let deal = NewDeal {
            name: format!("{} - {}", company, pick(&mut rng, DEAL_TEMPLATES)),
            company: company.to_string(),
            amount,
            stage: DealStage::ALL[rng.gen_range(0..DealStage::ALL.len())],
            close_date: (now + Duration::days(rng.gen_range(-30..=180))).date(),
            contact_id: contact_ids.choose(&mut rng).copied(),
        };
        let created = timestamp(now - Duration::days(rng.gen_range(1..=180)));
        store.insert_deal(&deal, &created)?;
    }

    let summary = SeedSummary {
        contacts: options.contacts,
        deals: options.deals,
    };
    tracing::info!(contacts = summary.contacts, deals = summary.deals, "seeded CRM database");
    Ok(summary)
}

fn pick<'a>(rng: &mut StdRng, values: &[&'a str]) -> &'a str {
    values.choose(rng).copied().unwrap_or_default()
}

fn timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_default()
}

//! Gigmatch Demo
//!
//! Walks through one evening in the marketplace:
//! - a DJ publishes a slot running past midnight
//! - a requester finds nearby House DJs
//! - two requesters propose for the same slot and the DJ confirms both;
//!   the second confirm loses and comes back declined
//! - the winning booking is cancelled and the slot can be booked again
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=gigmatch=debug cargo run --bin demo
//! ```

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use gigmatch::{
    Actor, Config, Coordinate, DjId, DjProfile, Gigmatch, InMemoryProfiles, MatchQuery, Money,
    UserId, metrics,
};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Point `km` kilometres due north of `origin`
fn north_of(origin: Coordinate, km: f64) -> Result<Coordinate, gigmatch::BookingError> {
    let degrees = (km / gigmatch::geo::EARTH_RADIUS_KM).to_degrees();
    Coordinate::new(origin.latitude() + degrees, origin.longitude())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    metrics::register_engine_metrics();

    println!("\n🎧 ============================================");
    println!("   Gigmatch - Booking Engine Demo");
    println!("============================================\n");

    // ========== Setup ==========

    let venue = Coordinate::new(52.52, 13.405)?;
    let nightshift = DjProfile::new(DjId::new(), "Nightshift".to_string(), north_of(venue, 10.0)?)
        .with_styles(["House", "Disco"]);
    let lowend = DjProfile::new(DjId::new(), "Low End".to_string(), north_of(venue, 30.0)?)
        .with_styles(["House", "Garage"]);
    let faraway = DjProfile::new(DjId::new(), "Far Away".to_string(), north_of(venue, 60.0)?)
        .with_styles(["House"]);

    let profiles: InMemoryProfiles = [nightshift.clone(), lowend, faraway]
        .into_iter()
        .collect();

    let app = Gigmatch::builder()
        .with_config(config)
        .with_profiles(Arc::new(profiles))
        .build()?;

    // Step 1: DJ publishes a slot
    println!("1️⃣  Nightshift opens Saturday 20:00 - 02:00...");
    let date = NaiveDate::from_ymd_opt(2024, 6, 15).ok_or("invalid demo date")?;
    let start = Utc
        .with_ymd_and_hms(2024, 6, 15, 20, 0, 0)
        .single()
        .ok_or("invalid demo time")?;
    let slot = app
        .slots
        .add_slot(nightshift.dj_id, date, start, start + Duration::hours(6))?;
    println!(
        "   ✓ Slot {slot} ({:?})\n",
        app.availability.day_status(nightshift.dj_id, date)
    );

    // Step 2: discovery
    println!("2️⃣  Searching House DJs within 50 km...");
    let query = MatchQuery::new(venue, 50.0).with_styles(["house"]);
    for found in app.discovery.find_matches(&query)? {
        println!(
            "   • {} at {:.1} km",
            found.profile.display_name, found.distance_km
        );
    }
    println!();

    // Step 3: two proposals, two confirms
    println!("3️⃣  Two organizers propose for the same slot...");
    let alice = UserId::new();
    let bob = UserId::new();
    let price = Money::from_cents(80_000);
    let first = app
        .bookings
        .propose(alice, nightshift.dj_id, slot, price, "Rooftop Opening")?;
    let second = app
        .bookings
        .propose(bob, nightshift.dj_id, slot, price, "Basement Rave")?;

    let dj = Actor::Dj(nightshift.dj_id);
    let won = app.bookings.confirm(first.id, dj)?;
    let lost = app.bookings.confirm(second.id, dj)?;
    println!("   ✓ First confirm:  {:?}", won.status);
    println!("   ✓ Second confirm: {:?}\n", lost.status);

    // Step 4: the day is now fully booked
    println!("4️⃣  Searching again for {date}...");
    let dated = MatchQuery::new(venue, 50.0).with_styles(["house"]).on(date);
    let available: Vec<String> = app
        .discovery
        .find_matches(&dated)?
        .into_iter()
        .map(|found| found.profile.display_name)
        .collect();
    println!("   ✓ Bookable DJs: {available:?}");
    println!(
        "   ✓ Nightshift is {:?}\n",
        app.availability.day_status(nightshift.dj_id, date)
    );

    // Step 5: cancel and re-book
    println!("5️⃣  Rooftop Opening is cancelled...");
    let cancelled = app.bookings.cancel(first.id, Actor::User(alice))?;
    let status = app.availability.day_status(nightshift.dj_id, date);
    println!("   ✓ Booking {:?}, day is {status:?}", cancelled.status);

    let retry = app
        .bookings
        .propose(bob, nightshift.dj_id, slot, price, "Basement Rave")?;
    let rebooked = app.bookings.confirm(retry.id, dj)?;
    println!("   ✓ Basement Rave re-proposed and {:?}\n", rebooked.status);

    println!("============================================");
    println!("   Demo complete");
    println!("============================================\n");

    Ok(())
}

//! Discovery: find DJs near a requester who play the right styles and are
//! still bookable on a date.
//!
//! Profiles come from an external [`ProfileSource`]. Availability is read
//! live through the [`AvailabilityProjector`], never from a copy stored on
//! the profile.

use crate::error::{BookingError, Result};
use crate::geo::{self, BoundingBox};
use crate::metrics;
use crate::projections::{AvailabilityProjector, DayStatus};
use crate::types::{Coordinate, DjId, DjProfile, StyleTag};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

// ============================================================================
// Profile source
// ============================================================================

/// Supplies DJ profiles to discovery.
///
/// Implemented by the profile-management subsystem.
pub trait ProfileSource: Send + Sync {
    /// Profiles that may lie inside `area`.
    ///
    /// May return profiles outside the area; must not omit any inside it.
    fn profiles_within(&self, area: &BoundingBox) -> Vec<DjProfile>;
}

/// Profile source backed by an in-memory map
#[derive(Debug, Default)]
pub struct InMemoryProfiles {
    profiles: RwLock<BTreeMap<DjId, DjProfile>>,
}

impl InMemoryProfiles {
    /// Creates an empty source
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a profile
    pub fn upsert(&self, profile: DjProfile) {
        self.profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(profile.dj_id, profile);
    }

    /// Removes a profile, returning it if present
    pub fn remove(&self, dj_id: DjId) -> Option<DjProfile> {
        self.profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&dj_id)
    }

    /// Copy of one profile
    #[must_use]
    pub fn get(&self, dj_id: DjId) -> Option<DjProfile> {
        self.profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&dj_id)
            .cloned()
    }

    /// Number of profiles
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether there are no profiles
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<DjProfile> for InMemoryProfiles {
    fn from_iter<I: IntoIterator<Item = DjProfile>>(iter: I) -> Self {
        Self {
            profiles: RwLock::new(
                iter.into_iter()
                    .map(|profile| (profile.dj_id, profile))
                    .collect(),
            ),
        }
    }
}

impl ProfileSource for InMemoryProfiles {
    fn profiles_within(&self, area: &BoundingBox) -> Vec<DjProfile> {
        self.profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|profile| area.contains(profile.coordinate))
            .cloned()
            .collect()
    }
}

// ============================================================================
// Queries
// ============================================================================

/// A discovery search
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchQuery {
    /// Where the requester is
    pub origin: Coordinate,
    /// Search radius in kilometres; must be positive
    pub max_distance_km: f64,
    /// Only DJs still bookable on this date
    pub date: Option<NaiveDate>,
    /// Only DJs playing at least one of these; empty matches everyone
    pub styles: Vec<StyleTag>,
    /// At most this many results
    pub limit: Option<usize>,
}

impl MatchQuery {
    /// Everyone within `max_distance_km` of `origin`
    #[must_use]
    pub const fn new(origin: Coordinate, max_distance_km: f64) -> Self {
        Self {
            origin,
            max_distance_km,
            date: None,
            styles: Vec::new(),
            limit: None,
        }
    }

    /// Restrict to DJs bookable on `date`
    #[must_use]
    pub const fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Restrict to DJs playing any of `styles`
    #[must_use]
    pub fn with_styles<I, S>(mut self, styles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StyleTag>,
    {
        self.styles.extend(styles.into_iter().map(Into::into));
        self
    }

    /// Return at most `limit` matches
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One discovery result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DjMatch {
    /// The DJ
    pub profile: DjProfile,
    /// Distance from the query origin
    pub distance_km: f64,
    /// Status on the queried date, when the query had one
    pub day_status: Option<DayStatus>,
}

// ============================================================================
// Matcher
// ============================================================================

/// Runs discovery queries
pub struct DiscoveryMatcher {
    profiles: Arc<dyn ProfileSource>,
    availability: AvailabilityProjector,
    default_radius_km: f64,
    max_results: usize,
}

impl DiscoveryMatcher {
    /// Creates a matcher.
    ///
    /// `max_results` caps a query's `limit`; a query without a limit gets
    /// every match.
    #[must_use]
    pub fn new(
        profiles: Arc<dyn ProfileSource>,
        availability: AvailabilityProjector,
        default_radius_km: f64,
        max_results: usize,
    ) -> Self {
        Self {
            profiles,
            availability,
            default_radius_km,
            max_results,
        }
    }

    /// A query around `origin` with the configured default radius
    #[must_use]
    pub const fn query_near(&self, origin: Coordinate) -> MatchQuery {
        MatchQuery::new(origin, self.default_radius_km)
    }

    /// DJs matching `query`, nearest first, ties broken by DJ id.
    ///
    /// No match is an empty list, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidRange`] if `max_distance_km` is not a
    /// positive finite number.
    pub fn find_matches(&self, query: &MatchQuery) -> Result<Vec<DjMatch>> {
        let max_km = query.max_distance_km;
        if !max_km.is_finite() || max_km <= 0.0 {
            let error = BookingError::InvalidRange(format!(
                "max distance must be positive, got {max_km} km"
            ));
            metrics::record_rejection(&error);
            return Err(error);
        }

        let area = BoundingBox::around(query.origin, max_km);
        let candidates = self.profiles.profiles_within(&area);
        let candidate_count = candidates.len();

        let mut matches: Vec<DjMatch> = candidates
            .into_iter()
            .filter(|profile| profile.supports_any(&query.styles))
            .filter_map(|profile| {
                let distance_km = geo::distance_km(query.origin, profile.coordinate);
                if distance_km > max_km {
                    return None;
                }

                let day_status = query
                    .date
                    .map(|date| self.availability.day_status(profile.dj_id, date));
                if day_status.is_some_and(|status| !status.is_bookable()) {
                    return None;
                }

                Some(DjMatch {
                    profile,
                    distance_km,
                    day_status,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            a.distance_km
                .total_cmp(&b.distance_km)
                .then_with(|| a.profile.dj_id.cmp(&b.profile.dj_id))
        });
        if let Some(limit) = query.limit {
            matches.truncate(limit.min(self.max_results));
        }

        tracing::debug!(
            origin = %query.origin,
            max_km,
            candidates = candidate_count,
            results = matches.len(),
            "Discovery query served"
        );
        metrics::record_discovery(candidate_count, matches.len());
        Ok(matches)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::aggregates::SlotsEnvironment;
    use crate::store::SlotStore;
    use crate::types::{BookingRef, Money, UserId};
    use chrono::{Duration, TimeZone, Utc};
    use gigmatch_core::event::NoopSink;
    use gigmatch_testing::test_clock;

    /// Point `km` kilometres due north of `origin`
    fn north_of(origin: Coordinate, km: f64) -> Coordinate {
        let degrees = (km / geo::EARTH_RADIUS_KM).to_degrees();
        Coordinate::new(origin.latitude() + degrees, origin.longitude()).unwrap()
    }

    fn berlin() -> Coordinate {
        Coordinate::new(52.52, 13.405).unwrap()
    }

    fn profile(name: &str, at: Coordinate, styles: &[&str]) -> DjProfile {
        DjProfile::new(DjId::new(), name.to_string(), at).with_styles(styles.iter().copied())
    }

    fn matcher(profiles: Vec<DjProfile>) -> (DiscoveryMatcher, Arc<SlotStore>) {
        capped_matcher(profiles, 100)
    }

    fn capped_matcher(
        profiles: Vec<DjProfile>,
        max_results: usize,
    ) -> (DiscoveryMatcher, Arc<SlotStore>) {
        let env = SlotsEnvironment::new(Arc::new(test_clock()), Duration::hours(24));
        let store = Arc::new(SlotStore::new(env, Arc::new(NoopSink)));
        let source: Arc<dyn ProfileSource> =
            Arc::new(profiles.into_iter().collect::<InMemoryProfiles>());
        let availability = AvailabilityProjector::new(store.clone());
        let matcher = DiscoveryMatcher::new(source, availability, 50.0, max_results);
        (matcher, store)
    }

    #[test]
    fn returns_in_range_djs_nearest_first() {
        let near = profile("Near", north_of(berlin(), 10.0), &["House"]);
        let far = profile("Far", north_of(berlin(), 60.0), &["House"]);
        let mid = profile("Mid", north_of(berlin(), 30.0), &["House"]);
        let (matcher, _) = matcher(vec![near.clone(), far, mid.clone()]);

        let results = matcher
            .find_matches(&MatchQuery::new(berlin(), 50.0).with_styles(["House"]))
            .unwrap();
        let names: Vec<_> = results.iter().map(|m| m.profile.display_name.as_str()).collect();
        assert_eq!(names, vec!["Near", "Mid"]);
        assert!((results[0].distance_km - 10.0).abs() < 0.01);
    }

    #[test]
    fn style_filter_is_case_insensitive() {
        let house = profile("House", north_of(berlin(), 5.0), &["Deep House"]);
        let techno = profile("Techno", north_of(berlin(), 6.0), &["Techno"]);
        let (matcher, _) = matcher(vec![house, techno]);

        let results = matcher
            .find_matches(&MatchQuery::new(berlin(), 50.0).with_styles(["deep house"]))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].profile.display_name, "House");

        let everyone = matcher.find_matches(&matcher.query_near(berlin())).unwrap();
        assert_eq!(everyone.len(), 2);
    }

    #[test]
    fn date_filter_excludes_unavailable_and_fully_booked() {
        let open = profile("Open", north_of(berlin(), 5.0), &[]);
        let booked = profile("Booked", north_of(berlin(), 6.0), &[]);
        let idle = profile("Idle", north_of(berlin(), 7.0), &[]);
        let (matcher, store) = matcher(vec![open.clone(), booked.clone(), idle]);

        let date = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 6, 15, 20, 0, 0).unwrap();
        store.add_slot(open.dj_id, date, start, start + Duration::hours(6)).unwrap();
        let slot = store
            .add_slot(booked.dj_id, date, start, start + Duration::hours(6))
            .unwrap();
        store
            .mark_booked(
                booked.dj_id,
                slot,
                BookingRef::new(None, "Gig".to_string(), UserId::new(), Money::from_cents(1)),
            )
            .unwrap();

        let results = matcher
            .find_matches(&MatchQuery::new(berlin(), 50.0).on(date))
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].profile.dj_id, open.dj_id);
        assert_eq!(results[0].day_status, Some(DayStatus::Available));
    }

    #[test]
    fn ties_break_on_dj_id() {
        let spot = north_of(berlin(), 3.0);
        let a = profile("A", spot, &[]);
        let b = profile("B", spot, &[]);
        let mut expected = vec![a.dj_id, b.dj_id];
        expected.sort();
        let (matcher, _) = matcher(vec![a, b]);

        let ids: Vec<_> = matcher
            .find_matches(&MatchQuery::new(berlin(), 10.0))
            .unwrap()
            .into_iter()
            .map(|m| m.profile.dj_id)
            .collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn limit_truncates_after_sorting() {
        let profiles: Vec<_> = (1..=5)
            .map(|km| profile(&format!("DJ {km}"), north_of(berlin(), f64::from(km)), &[]))
            .collect();
        let (matcher, _) = matcher(profiles);

        let results = matcher
            .find_matches(&MatchQuery::new(berlin(), 50.0).limit(2))
            .unwrap();
        let names: Vec<_> = results.iter().map(|m| m.profile.display_name.as_str()).collect();
        assert_eq!(names, vec!["DJ 1", "DJ 2"]);
    }

    #[test]
    fn max_results_only_caps_explicit_limits() {
        let profiles: Vec<_> = (1..=5)
            .map(|km| profile(&format!("DJ {km}"), north_of(berlin(), f64::from(km)), &[]))
            .collect();
        let (matcher, _) = capped_matcher(profiles, 3);

        let everyone = matcher.find_matches(&MatchQuery::new(berlin(), 50.0)).unwrap();
        assert_eq!(everyone.len(), 5);

        let capped = matcher
            .find_matches(&MatchQuery::new(berlin(), 50.0).limit(10))
            .unwrap();
        assert_eq!(capped.len(), 3);
        assert_eq!(capped[2].profile.display_name, "DJ 3");
    }

    #[test]
    fn non_positive_radius_is_invalid() {
        let (matcher, _) = matcher(Vec::new());
        for radius in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                matcher.find_matches(&MatchQuery::new(berlin(), radius)),
                Err(BookingError::InvalidRange(_))
            ));
        }
        assert!(matcher.find_matches(&MatchQuery::new(berlin(), 1.0)).unwrap().is_empty());
    }
}

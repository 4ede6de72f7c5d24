//! Domain types for the gigmatch booking engine.
//!
//! This module contains the value objects and entities shared by the slot
//! store, the booking coordinator and discovery: identifiers, money,
//! coordinates, genre tags, time slots and booking requests.

use crate::error::BookingError;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a DJ
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DjId(Uuid);

impl DjId {
    /// Creates a new random `DjId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `DjId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DjId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a marketplace user (organizer, client)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a time slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId(Uuid);

impl SlotId {
    /// Creates a new random `SlotId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a booking request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Creates a new random `BookingId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole currency units, `None` on overflow
    #[must_use]
    pub const fn checked_from_dollars(dollars: u64) -> Option<Self> {
        match dollars.checked_mul(100) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns the amount in whole units (rounded down)
    #[must_use]
    pub const fn dollars(&self) -> u64 {
        self.0 / 100
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.dollars(), self.0 % 100)
    }
}

// ============================================================================
// Geography
// ============================================================================

/// A WGS84 position in degrees.
///
/// Construction validates the ranges, so every `Coordinate` in the engine
/// is physically meaningful.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate from latitude and longitude in degrees.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidRange`] if either value is not finite,
    /// latitude is outside `[-90, 90]` or longitude outside `[-180, 180]`.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, BookingError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(BookingError::InvalidRange(format!(
                "latitude {latitude} outside [-90, 90]"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(BookingError::InvalidRange(format!(
                "longitude {longitude} outside [-180, 180]"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Latitude in degrees
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            latitude: f64,
            longitude: f64,
        }

        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.latitude, raw.longitude).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}

// ============================================================================
// Styles
// ============================================================================

/// A genre/style tag such as "House" or "Drum & Bass".
///
/// Tags compare case-insensitively and ignore surrounding whitespace; the
/// original spelling is kept for display.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct StyleTag {
    label: String,
    key: String,
}

impl StyleTag {
    /// Creates a tag from its display label
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into().trim().to_string();
        let key = label.to_lowercase();
        Self { label, key }
    }

    /// Display label as entered
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.label
    }

    /// Normalized comparison key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl From<String> for StyleTag {
    fn from(label: String) -> Self {
        Self::new(label)
    }
}

impl From<&str> for StyleTag {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<StyleTag> for String {
    fn from(tag: StyleTag) -> Self {
        tag.label
    }
}

impl PartialEq for StyleTag {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for StyleTag {}

impl Hash for StyleTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for StyleTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StyleTag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for StyleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

// ============================================================================
// Time Slots
// ============================================================================

/// Details of the gig occupying a booked slot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRef {
    /// Booking request that booked the slot (`None` for gigs the DJ entered directly)
    pub booking_id: Option<BookingId>,
    /// Event title shown on the calendar
    pub event_title: String,
    /// Client who booked the DJ
    pub client_id: UserId,
    /// Agreed fee
    pub agreed_price: Money,
}

impl BookingRef {
    /// Creates a booking reference
    #[must_use]
    pub const fn new(
        booking_id: Option<BookingId>,
        event_title: String,
        client_id: UserId,
        agreed_price: Money,
    ) -> Self {
        Self {
            booking_id,
            event_title,
            client_id,
            agreed_price,
        }
    }
}

/// Booking state of a slot.
///
/// A booked slot always carries its reference; a free slot cannot carry one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotState {
    /// Open for booking
    Free,
    /// Occupied by a gig
    Booked(BookingRef),
}

/// A bounded interval on a DJ's calendar
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Slot identifier
    pub id: SlotId,
    /// Owning DJ
    pub dj_id: DjId,
    /// Calendar date the slot belongs to (the date it starts on)
    pub date: NaiveDate,
    /// Start instant (inclusive)
    pub start: DateTime<Utc>,
    /// End instant (exclusive)
    pub end: DateTime<Utc>,
    /// Booking state
    pub state: SlotState,
}

impl TimeSlot {
    /// Creates a new free slot
    #[must_use]
    pub const fn new(
        id: SlotId,
        dj_id: DjId,
        date: NaiveDate,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            dj_id,
            date,
            start,
            end,
            state: SlotState::Free,
        }
    }

    /// Whether the slot can still be booked
    #[must_use]
    pub const fn is_free(&self) -> bool {
        matches!(self.state, SlotState::Free)
    }

    /// The booking occupying this slot, if any
    #[must_use]
    pub const fn booking_ref(&self) -> Option<&BookingRef> {
        match &self.state {
            SlotState::Free => None,
            SlotState::Booked(booking) => Some(booking),
        }
    }

    /// Length of the slot
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether `[start, end)` intersects this slot's `[start, end)`
    #[must_use]
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

/// All slots of one DJ on one calendar date, ordered by start
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    /// DJ the schedule belongs to
    pub dj_id: DjId,
    /// Calendar date
    pub date: NaiveDate,
    /// Slots ordered by start time
    pub slots: Vec<TimeSlot>,
}

// ============================================================================
// Actors
// ============================================================================

/// Authenticated identity performing a booking action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    /// A marketplace user acting for themselves (e.g. the requester)
    User(UserId),
    /// A DJ acting on their own calendar
    Dj(DjId),
    /// A user acting on behalf of a DJ (manager, agency)
    Delegate {
        /// The acting user
        user_id: UserId,
        /// The DJ they claim to represent
        dj_id: DjId,
    },
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user {id}"),
            Self::Dj(id) => write!(f, "dj {id}"),
            Self::Delegate { user_id, dj_id } => write!(f, "user {user_id} for dj {dj_id}"),
        }
    }
}

// ============================================================================
// Booking Requests
// ============================================================================

/// Why a booking request ended up declined
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclineReason {
    /// The DJ turned the request down
    ByDj,
    /// Another request was confirmed for the slot first
    SlotTaken,
    /// The slot no longer exists
    SlotRemoved,
    /// The proposal sat unanswered past its time-to-live
    Expired,
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ByDj => "declined by dj",
            Self::SlotTaken => "slot taken",
            Self::SlotRemoved => "slot removed",
            Self::Expired => "proposal expired",
        };
        f.write_str(text)
    }
}

/// Booking request lifecycle (state machine)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Awaiting the DJ's answer
    Proposed,
    /// The slot is booked for this request
    Confirmed,
    /// Turned down, by the DJ or automatically
    Declined {
        /// Why
        reason: DeclineReason,
    },
    /// Withdrawn by the requester or the DJ
    Cancelled {
        /// Who cancelled
        by: Actor,
    },
}

impl BookingStatus {
    /// Terminal states never change again
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::Declined { .. } | Self::Cancelled { .. }
        )
    }

    /// Short name for logs and metrics labels
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Confirmed => "confirmed",
            Self::Declined { .. } => "declined",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

/// A proposal to occupy one slot on a DJ's calendar
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    /// Booking identifier
    pub id: BookingId,
    /// Who asked for the booking
    pub requester_id: UserId,
    /// Target DJ
    pub dj_id: DjId,
    /// Target slot
    pub slot_id: SlotId,
    /// Offered fee
    pub price: Money,
    /// Title of the event the DJ would play
    pub event_title: String,
    /// Lifecycle status
    pub status: BookingStatus,
    /// When the request was made
    pub created_at: DateTime<Utc>,
    /// When the status last changed
    pub updated_at: DateTime<Utc>,
}

impl BookingRequest {
    /// Creates a new request in the `Proposed` state
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        id: BookingId,
        requester_id: UserId,
        dj_id: DjId,
        slot_id: SlotId,
        price: Money,
        event_title: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            requester_id,
            dj_id,
            slot_id,
            price,
            event_title,
            status: BookingStatus::Proposed,
            created_at,
            updated_at: created_at,
        }
    }

    /// The reference stored on the slot once this request is confirmed
    #[must_use]
    pub fn booking_ref(&self) -> BookingRef {
        BookingRef::new(
            Some(self.id),
            self.event_title.clone(),
            self.requester_id,
            self.price,
        )
    }
}

// ============================================================================
// Discovery Profiles
// ============================================================================

/// The slice of a DJ's public profile that discovery needs.
///
/// Owned by the profile-management subsystem; the engine only reads it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DjProfile {
    /// DJ identifier
    pub dj_id: DjId,
    /// Display name
    pub display_name: String,
    /// Current base location
    pub coordinate: Coordinate,
    /// Supported genres/styles
    pub styles: BTreeSet<StyleTag>,
}

impl DjProfile {
    /// Creates a profile without styles
    #[must_use]
    pub const fn new(dj_id: DjId, display_name: String, coordinate: Coordinate) -> Self {
        Self {
            dj_id,
            display_name,
            coordinate,
            styles: BTreeSet::new(),
        }
    }

    /// Adds style tags
    #[must_use]
    pub fn with_styles<I, S>(mut self, styles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StyleTag>,
    {
        self.styles.extend(styles.into_iter().map(Into::into));
        self
    }

    /// Whether the DJ plays at least one of `styles`; an empty filter matches everyone
    #[must_use]
    pub fn supports_any(&self, styles: &[StyleTag]) -> bool {
        styles.is_empty() || styles.iter().any(|style| self.styles.contains(style))
    }
}

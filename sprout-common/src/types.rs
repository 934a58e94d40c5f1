//! Shared domain model for the Sprout portal services
//!
//! Serde names use the portal's wire vocabulary (kebab-case status strings);
//! the same strings are used for TEXT column storage via `as_str`/`FromStr`.

use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Session
// ============================================================================

/// Session teaching format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionFormat {
    Group,
    OneOnOne,
}

impl SessionFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionFormat::Group => "group",
            SessionFormat::OneOnOne => "one-on-one",
        }
    }
}

impl FromStr for SessionFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "group" => Ok(SessionFormat::Group),
            "one-on-one" => Ok(SessionFormat::OneOnOne),
            other => Err(Error::InvalidInput(format!("Unknown format: {}", other))),
        }
    }
}

/// Session delivery mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionDelivery {
    Online,
    InPerson,
}

impl SessionDelivery {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionDelivery::Online => "online",
            SessionDelivery::InPerson => "in-person",
        }
    }
}

impl FromStr for SessionDelivery {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "online" => Ok(SessionDelivery::Online),
            "in-person" => Ok(SessionDelivery::InPerson),
            other => Err(Error::InvalidInput(format!("Unknown delivery: {}", other))),
        }
    }
}

/// Session lifecycle status
///
/// `WrapUpPending` is derived from the wall clock for `Assigned` sessions;
/// the stored value may lag behind until the promotion sweep runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    /// Open for instructor pickup, roster not yet attached
    Available,
    /// Assigned but not yet confirmed by the instructor
    Pending,
    /// Instructor confirmed, roster attached
    Assigned,
    /// Assigned instructor cannot attend; open for pickup again
    CoverageNeeded,
    /// Scheduled time fully elapsed, wrap-up not yet committed
    WrapUpPending,
    /// Wrap-up committed (terminal)
    Completed,
    /// Cancelled before completion (terminal)
    Cancelled,
    /// Session-level no-show (terminal)
    NoShow,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Available => "available",
            SessionStatus::Pending => "pending",
            SessionStatus::Assigned => "assigned",
            SessionStatus::CoverageNeeded => "coverage-needed",
            SessionStatus::WrapUpPending => "wrap-up-pending",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::NoShow => "no-show",
        }
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Cancelled | SessionStatus::NoShow
        )
    }
}

impl FromStr for SessionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "available" => Ok(SessionStatus::Available),
            "pending" => Ok(SessionStatus::Pending),
            "assigned" => Ok(SessionStatus::Assigned),
            "coverage-needed" => Ok(SessionStatus::CoverageNeeded),
            "wrap-up-pending" => Ok(SessionStatus::WrapUpPending),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            "no-show" => Ok(SessionStatus::NoShow),
            other => Err(Error::InvalidInput(format!("Unknown status: {}", other))),
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Online meeting room references (online delivery only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineRoom {
    /// Instructor's host link (carries the room key)
    pub host_room_url: String,
    pub participant_room_url: String,
}

/// Physical location (in-person delivery only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLocation {
    pub center_id: String,
    pub center_name: String,
    pub address: String,
    pub room: Option<String>,
}

/// One scheduled teaching occurrence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub course_id: String,
    pub course_name: String,

    // Schedule
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    /// Minutes of `duration_minutes` reserved for closing work
    pub wrap_up_minutes: i64,

    // Format
    pub format: SessionFormat,
    pub delivery: SessionDelivery,
    pub session_number: i64,
    pub total_sessions: i64,

    // Status
    pub status: SessionStatus,
    pub instructor_id: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,

    // Delivery-specific references
    pub online: Option<OnlineRoom>,
    pub location: Option<SessionLocation>,

    // Enrolled students (empty until claimed for available sessions)
    pub roster: Vec<StudentContext>,
}

impl Session {
    /// End of instruction time: scheduled start plus teaching minutes
    /// (duration minus the wrap-up allowance)
    pub fn instruction_end(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(self.duration_minutes - self.wrap_up_minutes)
    }

    /// End of the full scheduled window, wrap-up allowance included
    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(self.duration_minutes)
    }
}

// ============================================================================
// Students
// ============================================================================

/// One of the six fixed developmental capacities observed per student
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capacity {
    Curiosity,
    Reasoning,
    Expression,
    Focus,
    Collaboration,
    Adaptability,
}

impl Capacity {
    /// All six capacities, in display order
    pub const ALL: [Capacity; 6] = [
        Capacity::Curiosity,
        Capacity::Reasoning,
        Capacity::Expression,
        Capacity::Focus,
        Capacity::Collaboration,
        Capacity::Adaptability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capacity::Curiosity => "curiosity",
            Capacity::Reasoning => "reasoning",
            Capacity::Expression => "expression",
            Capacity::Focus => "focus",
            Capacity::Collaboration => "collaboration",
            Capacity::Adaptability => "adaptability",
        }
    }
}

/// Observed level for one capacity in one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObservationLevel {
    Strong,
    Developing,
    NotObserved,
}

/// Longer-horizon trend supplied by the profile service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapacityTrend {
    Improving,
    Stable,
    NeedsAttention,
}

/// Recent capacity summary for one student (read-only context)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    pub capacity: Capacity,
    pub level: ObservationLevel,
    pub trend: CapacityTrend,
}

/// Per-student context attached to a session roster
///
/// Supplied by the external profile service; never mutated by the
/// workflow engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentContext {
    pub child_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub age: i64,
    pub enrollment_id: String,
    #[serde(default)]
    pub recent_capacities: Vec<CapacitySnapshot>,
    pub previous_session_summary: Option<String>,
    pub parent_notes: Option<String>,
}

// ============================================================================
// Artifacts
// ============================================================================

/// Kind of student-submitted work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactType {
    Code,
    Document,
    Image,
    Video,
    Audio,
    QuizResult,
    Project,
}

impl ArtifactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactType::Code => "code",
            ArtifactType::Document => "document",
            ArtifactType::Image => "image",
            ArtifactType::Video => "video",
            ArtifactType::Audio => "audio",
            ArtifactType::QuizResult => "quiz-result",
            ArtifactType::Project => "project",
        }
    }
}

impl FromStr for ArtifactType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "code" => Ok(ArtifactType::Code),
            "document" => Ok(ArtifactType::Document),
            "image" => Ok(ArtifactType::Image),
            "video" => Ok(ArtifactType::Video),
            "audio" => Ok(ArtifactType::Audio),
            "quiz-result" => Ok(ArtifactType::QuizResult),
            "project" => Ok(ArtifactType::Project),
            other => Err(Error::InvalidInput(format!(
                "Unknown artifact type: {}",
                other
            ))),
        }
    }
}

/// Artifact review status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactStatus {
    Submitted,
    Approved,
    NeedsRevision,
    Skipped,
}

impl ArtifactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactStatus::Submitted => "submitted",
            ArtifactStatus::Approved => "approved",
            ArtifactStatus::NeedsRevision => "needs-revision",
            ArtifactStatus::Skipped => "skipped",
        }
    }
}

impl FromStr for ArtifactStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "submitted" => Ok(ArtifactStatus::Submitted),
            "approved" => Ok(ArtifactStatus::Approved),
            "needs-revision" => Ok(ArtifactStatus::NeedsRevision),
            "skipped" => Ok(ArtifactStatus::Skipped),
            other => Err(Error::InvalidInput(format!(
                "Unknown artifact status: {}",
                other
            ))),
        }
    }
}

/// Who uploaded the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmittedBy {
    Student,
    Parent,
    Instructor,
}

/// One uploaded file belonging to an artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub id: Uuid,
    pub filename: String,
    pub url: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

/// A unit of student-submitted work tied to a course/session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub child_id: Uuid,
    pub child_first_name: String,
    pub course_id: String,
    pub course_name: String,
    /// May be absent: artifacts can arrive after the session closes
    pub session_id: Option<Uuid>,
    pub session_number: Option<i64>,

    // What was submitted
    pub kind: ArtifactType,
    pub title: String,
    pub description: Option<String>,
    pub files: Vec<ArtifactFile>,

    // Submission
    pub submitted_at: DateTime<Utc>,
    pub submitted_by: SubmittedBy,

    // Review (immutable once decided)
    pub status: ArtifactStatus,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<Uuid>,
    pub instructor_feedback: Option<String>,

    /// Badge ids this artifact can count toward
    #[serde(default)]
    pub contributes_to_badges: Vec<String>,
}

// ============================================================================
// Wrap-Up
// ============================================================================

/// Per-student attendance outcome for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttendanceStatus {
    Attended,
    NoShow,
    LeftEarly,
}

/// Attendance record produced by wrap-up step 1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentAttendance {
    pub child_id: Uuid,
    pub status: AttendanceStatus,
    pub left_early_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// One capacity/level pair inside a student's observation set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityObservation {
    pub capacity: Capacity,
    pub level: ObservationLevel,
}

/// Observation set produced by wrap-up step 3
///
/// Valid only when it holds all six capacities exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentObservations {
    pub child_id: Uuid,
    pub capacity_observations: Vec<CapacityObservation>,
    pub additional_notes: Option<String>,
}

impl StudentObservations {
    /// True iff every capacity appears exactly once
    pub fn is_complete(&self) -> bool {
        self.capacity_observations.len() == Capacity::ALL.len()
            && self.missing_capacities().is_empty()
            && self.duplicate_capacities().is_empty()
    }

    /// Capacities with no recorded level
    pub fn missing_capacities(&self) -> Vec<Capacity> {
        Capacity::ALL
            .iter()
            .copied()
            .filter(|c| !self.capacity_observations.iter().any(|o| o.capacity == *c))
            .collect()
    }

    /// Capacities recorded more than once
    pub fn duplicate_capacities(&self) -> Vec<Capacity> {
        Capacity::ALL
            .iter()
            .copied()
            .filter(|c| {
                self.capacity_observations
                    .iter()
                    .filter(|o| o.capacity == *c)
                    .count()
                    > 1
            })
            .collect()
    }
}

/// Instructor's decision on one artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewDecision {
    Approved,
    NeedsRevision,
    /// Deferred to a later review queue; not a completed review
    Skipped,
}

/// One artifact review action taken during wrap-up step 2
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactReview {
    pub artifact_id: Uuid,
    pub decision: ReviewDecision,
    pub feedback: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

/// Wrap-up lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WrapUpStatus {
    InProgress,
    Completed,
}

impl WrapUpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WrapUpStatus::InProgress => "in-progress",
            WrapUpStatus::Completed => "completed",
        }
    }
}

impl FromStr for WrapUpStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "in-progress" => Ok(WrapUpStatus::InProgress),
            "completed" => Ok(WrapUpStatus::Completed),
            other => Err(Error::InvalidInput(format!(
                "Unknown wrap-up status: {}",
                other
            ))),
        }
    }
}

/// The aggregate committed by a finished wrap-up workflow
///
/// Immutable once `Completed`; a session has at most one completed wrap-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionWrapUp {
    pub session_id: Uuid,
    pub instructor_id: Uuid,

    // Step 1: Attendance
    pub attendance: Vec<StudentAttendance>,

    // Step 2: Artifacts (decided reviews only)
    pub artifact_reviews: Vec<ArtifactReview>,

    // Step 3: Observations
    pub observations: Vec<StudentObservations>,

    // Step 4: Summary
    pub summary: String,

    // Meta
    pub status: WrapUpStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Earnings
// ============================================================================

/// Payable activity code resolved from (format, delivery) or a sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayableActivity {
    GroupSessionOnline,
    GroupSessionInperson,
    OneOnOneOnline,
    OneOnOneInperson,
    /// Bonus for picking up a coverage-needed session (sentinel code)
    CoverageBonus,
    /// Paid training attendance (sentinel code)
    TrainingSession,
}

impl PayableActivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayableActivity::GroupSessionOnline => "group-session-online",
            PayableActivity::GroupSessionInperson => "group-session-inperson",
            PayableActivity::OneOnOneOnline => "one-on-one-online",
            PayableActivity::OneOnOneInperson => "one-on-one-inperson",
            PayableActivity::CoverageBonus => "coverage-bonus",
            PayableActivity::TrainingSession => "training-session",
        }
    }
}

impl FromStr for PayableActivity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "group-session-online" => Ok(PayableActivity::GroupSessionOnline),
            "group-session-inperson" => Ok(PayableActivity::GroupSessionInperson),
            "one-on-one-online" => Ok(PayableActivity::OneOnOneOnline),
            "one-on-one-inperson" => Ok(PayableActivity::OneOnOneInperson),
            "coverage-bonus" => Ok(PayableActivity::CoverageBonus),
            "training-session" => Ok(PayableActivity::TrainingSession),
            other => Err(Error::InvalidInput(format!("Unknown activity: {}", other))),
        }
    }
}

impl std::fmt::Display for PayableActivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate table row for one activity code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRate {
    pub activity: PayableActivity,
    /// Minor currency units (cents)
    pub base_rate_cents: i64,
    pub currency: String,
    pub duration_minutes: i64,
    /// Whether wrap-up time is bundled into the paid duration
    pub includes_wrap_up: bool,
}

/// Earnings entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EarningsStatus {
    Pending,
    Approved,
    Paid,
}

impl EarningsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EarningsStatus::Pending => "pending",
            EarningsStatus::Approved => "approved",
            EarningsStatus::Paid => "paid",
        }
    }
}

impl FromStr for EarningsStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(EarningsStatus::Pending),
            "approved" => Ok(EarningsStatus::Approved),
            "paid" => Ok(EarningsStatus::Paid),
            other => Err(Error::InvalidInput(format!(
                "Unknown earnings status: {}",
                other
            ))),
        }
    }
}

/// One monetary credit produced by a completed wrap-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningsEntry {
    pub id: Uuid,
    pub session_id: Uuid,
    pub activity: PayableActivity,
    /// Minor currency units (cents)
    pub amount_cents: i64,
    pub currency: String,
    pub earned_at: DateTime<Utc>,
    pub status: EarningsStatus,
    pub pay_period_id: Uuid,
}

/// Pay period status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayPeriodStatus {
    Open,
    Processing,
    Paid,
}

impl PayPeriodStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayPeriodStatus::Open => "open",
            PayPeriodStatus::Processing => "processing",
            PayPeriodStatus::Paid => "paid",
        }
    }
}

impl FromStr for PayPeriodStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(PayPeriodStatus::Open),
            "processing" => Ok(PayPeriodStatus::Processing),
            "paid" => Ok(PayPeriodStatus::Paid),
            other => Err(Error::InvalidInput(format!(
                "Unknown pay period status: {}",
                other
            ))),
        }
    }
}

/// An accounting window aggregating one instructor's earnings entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPeriod {
    pub id: Uuid,
    pub instructor_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: PayPeriodStatus,
    pub total_earned_cents: i64,
    pub session_count: i64,
    pub paid_at: Option<DateTime<Utc>>,
}

//! Circles facade for in-process library usage.
//!
//! One async method per collaborator-facing operation. The facade owns the
//! transaction boundary of every call; the services in [`crate::services`]
//! own the rules.
//!
//! # Example
//!
//! ```ignore
//! use circles::config::Config;
//! use circles::facade::Circles;
//! use circles::model::{NewGroup, NewMember};
//!
//! let circles = Circles::builder(Config::for_test()).build().await?;
//!
//! let asha = circles
//!     .register_member(NewMember::customer("asha", "Asha Rao", "9876543210"), None)
//!     .await?;
//! let group = circles.create_group(NewGroup::new("Monthly 1000", 1000).with_max_members(3)).await?;
//! let outcome = circles.on_membership_joined(group.id, asha.id).await?;
//! ```

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, PolicyConfig};
use crate::error::{EngineError, Result};
use crate::model::member::NEUTRAL_TRUST_SCORE;
use crate::model::{
    EarlyPayoutRequest, FeePayment, FeeStatus, Group, GroupUpdate, KycDocument, KycDocuments,
    Member, Membership, MembershipDecision, NewGroup, NewMember, PayoutDecision,
    PayoutRequestStatus, Referral, ReferralSummary, TrustEvent, TrustEventType,
};
use crate::services::groups::{load_group, load_member};
use crate::services::{
    generate_referral_code, normalize_referral_code, EarlyPayoutWorkflow, Eligibility,
    FeeReconciler, GroupCycleController, JoinOutcome, ReferralLedger, TrustScore,
    TrustScoreCalculator,
};
use crate::storage::sqlite::{
    early_payouts, fee_payments, groups, members, memberships, referrals, trust_events,
};
use crate::storage::{init_storage, SqliteStore};

/// Attempts at drawing an unused referral code before giving up.
const REFERRAL_CODE_ATTEMPTS: usize = 8;

/// Builder for a [`Circles`] engine.
pub struct CirclesBuilder {
    config: Config,
    clock: Option<Arc<dyn Clock>>,
    store: Option<SqliteStore>,
}

impl CirclesBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            clock: None,
            store: None,
        }
    }

    /// Use a specific clock instead of the system clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use an already opened store instead of opening `config.storage`.
    pub fn with_store(mut self, store: SqliteStore) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn build(self) -> Result<Circles> {
        self.config
            .validate()
            .map_err(|e| EngineError::validation(e.to_string()))?;

        let store = match self.store {
            Some(store) => {
                store.init().await?;
                store
            }
            None => init_storage(&self.config.storage).await?,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        Ok(Circles::new(store, self.config.policy, clock))
    }
}

/// The circles engine.
pub struct Circles {
    store: SqliteStore,
    policy: PolicyConfig,
    clock: Arc<dyn Clock>,
    trust: TrustScoreCalculator,
    groups: GroupCycleController,
    early_payout: EarlyPayoutWorkflow,
    referrals: ReferralLedger,
    fees: FeeReconciler,
}

impl std::fmt::Debug for Circles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Circles")
            .field("policy", &self.policy)
            .field("now", &self.clock.now())
            .finish_non_exhaustive()
    }
}

impl Circles {
    pub fn builder(config: Config) -> CirclesBuilder {
        CirclesBuilder::new(config)
    }

    /// Assemble an engine over an initialized store.
    pub fn new(store: SqliteStore, policy: PolicyConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            trust: TrustScoreCalculator::new(&policy.trust),
            groups: GroupCycleController::new(&policy.groups),
            early_payout: EarlyPayoutWorkflow::new(&policy.early_payout),
            referrals: ReferralLedger::new(&policy.referral),
            fees: FeeReconciler::new(&policy.fees),
            store,
            policy,
            clock,
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    // ---------------------------------------------------------------------
    // Members
    // ---------------------------------------------------------------------

    /// Create a member and, when a code is given, link their referrer.
    ///
    /// A code that was entered but cannot be used aborts the registration.
    #[tracing::instrument(name = "circles.register_member", skip_all, fields(username = %new_member.username))]
    pub async fn register_member(
        &self,
        new_member: NewMember,
        referral_code: Option<&str>,
    ) -> Result<Member> {
        let code = referral_code
            .map(normalize_referral_code)
            .transpose()?
            .flatten();
        let username = new_member.username.trim().to_string();
        if username.is_empty() {
            return Err(EngineError::validation("Username is required"));
        }
        let now = self.clock.now();

        let mut conn = self.store.begin_immediate().await?;
        let result = self
            .register_in_tx(&mut conn, new_member, username, code, now)
            .await;
        SqliteStore::finish(&mut conn, result).await
    }

    async fn register_in_tx(
        &self,
        conn: &mut SqliteConnection,
        new_member: NewMember,
        username: String,
        code: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Member> {
        if members::username_taken(conn, &username).await? {
            return Err(EngineError::rejected(format!(
                "Username {username} is already taken"
            )));
        }

        let mut referral_code = None;
        for _ in 0..REFERRAL_CODE_ATTEMPTS {
            let candidate = generate_referral_code();
            if !members::referral_code_taken(conn, &candidate).await? {
                referral_code = Some(candidate);
                break;
            }
        }
        let referral_code = referral_code
            .ok_or_else(|| EngineError::rejected("Could not allocate a referral code"))?;

        let member = Member {
            id: new_member.id,
            username,
            full_name: new_member.full_name.trim().to_string(),
            phone: new_member.phone.trim().to_string(),
            role: new_member.role,
            upi_id: None,
            trust_score: NEUTRAL_TRUST_SCORE,
            kyc: KycDocuments::default(),
            referral_code,
            join_blocked: false,
            first_fee_verified: false,
            fee_paid_month: None,
            created_at: now,
        };
        members::insert(conn, &member).await?;

        if let Some(code) = code {
            self.referrals.link(conn, &member, &code, now).await?;
        }

        info!(member_id = %member.id, role = member.role.as_str(), "Member registered");
        Ok(member)
    }

    /// Link a referral code to an already registered member.
    ///
    /// `None` or a blank code records nothing.
    #[tracing::instrument(name = "circles.register_with_referral", skip_all, fields(%member_id))]
    pub async fn register_with_referral(
        &self,
        member_id: Uuid,
        referral_code: Option<&str>,
    ) -> Result<Option<Referral>> {
        let Some(code) = referral_code
            .map(normalize_referral_code)
            .transpose()?
            .flatten()
        else {
            return Ok(None);
        };
        let now = self.clock.now();

        let mut conn = self.store.begin_immediate().await?;
        let result = async {
            let member = load_member(&mut conn, member_id).await?;
            self.referrals.link(&mut conn, &member, &code, now).await
        }
        .await;
        SqliteStore::finish(&mut conn, result).await.map(Some)
    }

    pub async fn get_member(&self, member_id: Uuid) -> Result<Member> {
        let mut conn = self.store.acquire().await?;
        load_member(&mut conn, member_id).await
    }

    /// Set or clear the member's UPI payment handle.
    #[tracing::instrument(name = "circles.update_payment_handle", skip_all, fields(%member_id))]
    pub async fn update_payment_handle(
        &self,
        member_id: Uuid,
        upi_id: Option<&str>,
    ) -> Result<Member> {
        let upi_id = upi_id.map(str::trim).filter(|u| !u.is_empty());
        if let Some(upi) = upi_id {
            if !upi.contains('@') || upi.starts_with('@') || upi.ends_with('@') {
                return Err(EngineError::validation("Enter a valid UPI ID (name@bank)"));
            }
        }

        let mut conn = self.store.begin_immediate().await?;
        let result = async {
            load_member(&mut conn, member_id).await?;
            members::set_upi_id(&mut conn, member_id, upi_id.map(str::to_string)).await?;
            load_member(&mut conn, member_id).await
        }
        .await;
        SqliteStore::finish(&mut conn, result).await
    }

    /// Note that a KYC document is on file.
    #[tracing::instrument(name = "circles.record_kyc_document", skip_all, fields(%member_id))]
    pub async fn record_kyc_document(
        &self,
        member_id: Uuid,
        document: KycDocument,
    ) -> Result<Member> {
        let mut conn = self.store.begin_immediate().await?;
        let result = async {
            let member = load_member(&mut conn, member_id).await?;
            members::set_kyc(&mut conn, member_id, member.kyc.with(document)).await?;
            info!(member_id = %member_id, document = ?document, "KYC document recorded");
            load_member(&mut conn, member_id).await
        }
        .await;
        SqliteStore::finish(&mut conn, result).await
    }

    /// Block or unblock a member from joining groups. Admins cannot be blocked.
    #[tracing::instrument(name = "circles.set_join_blocked", skip_all, fields(%member_id, blocked = blocked))]
    pub async fn set_join_blocked(&self, member_id: Uuid, blocked: bool) -> Result<Member> {
        let mut conn = self.store.begin_immediate().await?;
        let result = async {
            let member = load_member(&mut conn, member_id).await?;
            if member.is_admin() && blocked {
                return Err(EngineError::rejected("Admin accounts cannot be blocked"));
            }
            members::set_join_blocked(&mut conn, member_id, blocked).await?;
            info!(member_id = %member_id, blocked, "Join block updated");
            load_member(&mut conn, member_id).await
        }
        .await;
        SqliteStore::finish(&mut conn, result).await
    }

    // ---------------------------------------------------------------------
    // Groups
    // ---------------------------------------------------------------------

    #[tracing::instrument(name = "circles.create_group", skip_all, fields(name = %new_group.name))]
    pub async fn create_group(&self, new_group: NewGroup) -> Result<Group> {
        let now = self.clock.now();
        let mut conn = self.store.begin_immediate().await?;
        let result = self.groups.create_group(&mut conn, new_group, now).await;
        SqliteStore::finish(&mut conn, result).await
    }

    /// A customer creates a group and joins it as the first member.
    #[tracing::instrument(name = "circles.create_member_group", skip_all, fields(%creator_id, name = %new_group.name))]
    pub async fn create_member_group(
        &self,
        creator_id: Uuid,
        new_group: NewGroup,
    ) -> Result<JoinOutcome> {
        let now = self.clock.now();
        let mut conn = self.store.begin_immediate().await?;
        let result = self
            .groups
            .create_member_group(&mut conn, creator_id, new_group, now)
            .await;
        SqliteStore::finish(&mut conn, result).await
    }

    #[tracing::instrument(name = "circles.update_group", skip_all, fields(%group_id))]
    pub async fn update_group(&self, group_id: Uuid, update: GroupUpdate) -> Result<Group> {
        let mut conn = self.store.begin_immediate().await?;
        let result = self.groups.update_group(&mut conn, group_id, update).await;
        SqliteStore::finish(&mut conn, result).await
    }

    /// Remove a forming group and all of its memberships.
    #[tracing::instrument(name = "circles.delete_group", skip_all, fields(%group_id))]
    pub async fn delete_group(&self, group_id: Uuid) -> Result<Group> {
        let mut conn = self.store.begin_immediate().await?;
        let result = self.groups.delete_group(&mut conn, group_id).await;
        SqliteStore::finish(&mut conn, result).await
    }

    pub async fn get_group(&self, group_id: Uuid) -> Result<Group> {
        let mut conn = self.store.acquire().await?;
        load_group(&mut conn, group_id).await
    }

    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        let mut conn = self.store.acquire().await?;
        Ok(groups::list(&mut conn).await?)
    }

    pub async fn group_memberships(&self, group_id: Uuid) -> Result<Vec<Membership>> {
        let mut conn = self.store.acquire().await?;
        load_group(&mut conn, group_id).await?;
        Ok(memberships::list_for_group(&mut conn, group_id).await?)
    }

    pub async fn member_memberships(&self, member_id: Uuid) -> Result<Vec<Membership>> {
        let mut conn = self.store.acquire().await?;
        load_member(&mut conn, member_id).await?;
        Ok(memberships::list_for_member(&mut conn, member_id).await?)
    }

    #[tracing::instrument(name = "circles.request_join", skip_all, fields(%group_id, %member_id))]
    pub async fn request_join(&self, group_id: Uuid, member_id: Uuid) -> Result<Membership> {
        let now = self.clock.now();
        let mut conn = self.store.begin_immediate().await?;
        let result = self
            .groups
            .request_join(&mut conn, group_id, member_id, now)
            .await;
        SqliteStore::finish(&mut conn, result).await
    }

    #[tracing::instrument(name = "circles.decide_membership", skip_all, fields(%group_id, %member_id))]
    pub async fn decide_membership(
        &self,
        group_id: Uuid,
        member_id: Uuid,
        decision: MembershipDecision,
    ) -> Result<JoinOutcome> {
        let now = self.clock.now();
        let mut conn = self.store.begin_immediate().await?;
        let result = self
            .groups
            .decide_membership(&mut conn, group_id, member_id, decision, now)
            .await;
        SqliteStore::finish(&mut conn, result).await
    }

    /// Confirm a joined membership and activate the group if it is now full.
    ///
    /// The count and the activation run in one write transaction, so racing
    /// joins on the last open slot are serialized.
    #[tracing::instrument(name = "circles.on_membership_joined", skip_all, fields(%group_id, %member_id))]
    pub async fn on_membership_joined(
        &self,
        group_id: Uuid,
        member_id: Uuid,
    ) -> Result<JoinOutcome> {
        let now = self.clock.now();
        let mut conn = self.store.begin_immediate().await?;
        let result = self
            .groups
            .on_membership_joined(&mut conn, group_id, member_id, now)
            .await;
        SqliteStore::finish(&mut conn, result).await
    }

    #[tracing::instrument(name = "circles.select_payout_receiver", skip_all, fields(%group_id, %member_id))]
    pub async fn select_payout_receiver(&self, group_id: Uuid, member_id: Uuid) -> Result<Group> {
        let today = self.clock.today();
        let mut conn = self.store.begin_immediate().await?;
        let result = self
            .groups
            .select_receiver(&mut conn, group_id, member_id, today)
            .await;
        SqliteStore::finish(&mut conn, result).await
    }

    #[tracing::instrument(name = "circles.pause_group", skip_all, fields(%group_id))]
    pub async fn pause_group(&self, group_id: Uuid) -> Result<Group> {
        let mut conn = self.store.begin_immediate().await?;
        let result = self.groups.pause(&mut conn, group_id).await;
        SqliteStore::finish(&mut conn, result).await
    }

    #[tracing::instrument(name = "circles.resume_group", skip_all, fields(%group_id))]
    pub async fn resume_group(&self, group_id: Uuid) -> Result<Group> {
        let today = self.clock.today();
        let mut conn = self.store.begin_immediate().await?;
        let result = self.groups.resume(&mut conn, group_id, today).await;
        SqliteStore::finish(&mut conn, result).await
    }

    #[tracing::instrument(name = "circles.complete_group", skip_all, fields(%group_id))]
    pub async fn complete_group(&self, group_id: Uuid) -> Result<Group> {
        let now = self.clock.now();
        let mut conn = self.store.begin_immediate().await?;
        let result = self
            .groups
            .complete(&mut conn, &self.trust, group_id, now)
            .await;
        SqliteStore::finish(&mut conn, result).await
    }

    // ---------------------------------------------------------------------
    // Trust
    // ---------------------------------------------------------------------

    /// Recompute the member's score from their history and refresh the cache.
    #[tracing::instrument(name = "circles.get_trust_score", skip_all, fields(%member_id))]
    pub async fn get_trust_score(&self, member_id: Uuid) -> Result<TrustScore> {
        let mut conn = self.store.begin_immediate().await?;
        let result = self
            .trust
            .refresh(&mut conn, member_id)
            .await
            .map_err(EngineError::from);
        SqliteStore::finish(&mut conn, result).await
    }

    pub async fn trust_history(&self, member_id: Uuid) -> Result<Vec<TrustEvent>> {
        let mut conn = self.store.acquire().await?;
        load_member(&mut conn, member_id).await?;
        Ok(trust_events::list_for_member(&mut conn, member_id).await?)
    }

    /// Log a contribution outcome reported by the payments collaborator.
    #[tracing::instrument(name = "circles.record_contribution", skip_all, fields(%member_id, %group_id, accepted = accepted))]
    pub async fn record_contribution(
        &self,
        member_id: Uuid,
        group_id: Uuid,
        due_date: NaiveDate,
        verified_at: DateTime<Utc>,
        accepted: bool,
    ) -> Result<TrustEvent> {
        let event = if accepted {
            TrustEvent::new(member_id, TrustEventType::ContributionVerified, self.clock.now())
                .verified_at(verified_at)
        } else {
            TrustEvent::new(member_id, TrustEventType::ContributionRejected, self.clock.now())
        }
        .in_group(group_id)
        .due_on(due_date);

        self.record_trust_event(event).await
    }

    #[tracing::instrument(name = "circles.record_missed_payment", skip_all, fields(%member_id, %group_id))]
    pub async fn record_missed_payment(
        &self,
        member_id: Uuid,
        group_id: Uuid,
        due_date: NaiveDate,
    ) -> Result<TrustEvent> {
        let event = TrustEvent::new(member_id, TrustEventType::PaymentMissed, self.clock.now())
            .in_group(group_id)
            .due_on(due_date);
        self.record_trust_event(event).await
    }

    #[tracing::instrument(name = "circles.record_default_after_payout", skip_all, fields(%member_id, %group_id))]
    pub async fn record_default_after_payout(
        &self,
        member_id: Uuid,
        group_id: Uuid,
    ) -> Result<TrustEvent> {
        let event =
            TrustEvent::new(member_id, TrustEventType::DefaultAfterPayout, self.clock.now())
                .in_group(group_id);
        self.record_trust_event(event).await
    }

    async fn record_trust_event(&self, event: TrustEvent) -> Result<TrustEvent> {
        let mut conn = self.store.begin_immediate().await?;
        let result = async {
            load_member(&mut conn, event.member_id).await?;
            if let Some(group_id) = event.group_id {
                load_group(&mut conn, group_id).await?;
            }
            let event = self.trust.record(&mut conn, event).await?;
            info!(
                member_id = %event.member_id,
                event_type = event.event_type.as_str(),
                sequence = event.sequence,
                "Trust event recorded"
            );
            Ok::<_, EngineError>(event)
        }
        .await;
        SqliteStore::finish(&mut conn, result).await
    }

    // ---------------------------------------------------------------------
    // Early payout
    // ---------------------------------------------------------------------

    /// Run the eligibility gate without creating a request.
    pub async fn early_payout_eligibility(
        &self,
        member_id: Uuid,
        group_id: Option<Uuid>,
    ) -> Result<Eligibility> {
        let mut conn = self.store.begin_immediate().await?;
        let result = async {
            let member = load_member(&mut conn, member_id).await?;
            self.early_payout
                .check_eligibility(&mut conn, &self.trust, &member, group_id)
                .await
        }
        .await;
        SqliteStore::finish(&mut conn, result).await
    }

    #[tracing::instrument(name = "circles.request_early_payout", skip_all, fields(%member_id, %group_id))]
    pub async fn request_early_payout(
        &self,
        member_id: Uuid,
        group_id: Uuid,
        reason: &str,
    ) -> Result<EarlyPayoutRequest> {
        let now = self.clock.now();
        let mut conn = self.store.begin_immediate().await?;
        let result = self
            .early_payout
            .request(&mut conn, &self.trust, member_id, group_id, reason, now)
            .await;
        SqliteStore::finish(&mut conn, result).await
    }

    #[tracing::instrument(name = "circles.submit_deposit", skip_all, fields(%request_id))]
    pub async fn submit_deposit(&self, request_id: Uuid, utr: &str) -> Result<EarlyPayoutRequest> {
        let now = self.clock.now();
        let mut conn = self.store.begin_immediate().await?;
        let result = self
            .early_payout
            .submit_deposit(&mut conn, request_id, utr, now)
            .await;
        SqliteStore::finish(&mut conn, result).await
    }

    #[tracing::instrument(name = "circles.verify_deposit", skip_all, fields(%request_id))]
    pub async fn verify_deposit(&self, request_id: Uuid, utr: &str) -> Result<EarlyPayoutRequest> {
        let now = self.clock.now();
        let mut conn = self.store.begin_immediate().await?;
        let result = self
            .early_payout
            .verify_deposit(&mut conn, &self.trust, request_id, utr, now)
            .await;
        SqliteStore::finish(&mut conn, result).await
    }

    #[tracing::instrument(name = "circles.decide_early_payout", skip_all, fields(%request_id, ?decision))]
    pub async fn decide_early_payout(
        &self,
        request_id: Uuid,
        decision: PayoutDecision,
        reason: Option<&str>,
    ) -> Result<EarlyPayoutRequest> {
        let now = self.clock.now();
        let mut conn = self.store.begin_immediate().await?;
        let result = self
            .early_payout
            .decide(&mut conn, request_id, decision, reason, now)
            .await;
        SqliteStore::finish(&mut conn, result).await
    }

    pub async fn get_early_payout_request(&self, request_id: Uuid) -> Result<EarlyPayoutRequest> {
        let mut conn = self.store.acquire().await?;
        early_payouts::find(&mut conn, request_id)
            .await?
            .ok_or_else(|| EngineError::not_found("early payout request", request_id))
    }

    /// The member's requests, newest first.
    pub async fn early_payout_requests(
        &self,
        member_id: Uuid,
        group_id: Option<Uuid>,
    ) -> Result<Vec<EarlyPayoutRequest>> {
        let mut conn = self.store.acquire().await?;
        Ok(early_payouts::list_for_member(&mut conn, member_id, group_id).await?)
    }

    /// Requests with a verified deposit awaiting an admin decision.
    pub async fn early_payouts_under_review(&self) -> Result<Vec<EarlyPayoutRequest>> {
        let mut conn = self.store.acquire().await?;
        Ok(early_payouts::list_by_status(&mut conn, PayoutRequestStatus::UnderReview).await?)
    }

    // ---------------------------------------------------------------------
    // Referrals and fees
    // ---------------------------------------------------------------------

    /// Re-run the eligibility promotion for the referral naming `member_id`.
    pub async fn mark_referral_eligible(&self, member_id: Uuid) -> Result<Option<Referral>> {
        let now = self.clock.now();
        let mut conn = self.store.begin_immediate().await?;
        let result = self
            .referrals
            .mark_eligible_if_qualified(&mut conn, member_id, now)
            .await;
        SqliteStore::finish(&mut conn, result).await
    }

    #[tracing::instrument(name = "circles.credit_referral", skip_all, fields(%referral_id))]
    pub async fn credit_referral(&self, referral_id: Uuid) -> Result<Referral> {
        let now = self.clock.now();
        let mut conn = self.store.begin_immediate().await?;
        let result = self.referrals.credit(&mut conn, referral_id, now).await;
        SqliteStore::finish(&mut conn, result).await
    }

    /// Credit that would be applied against a fee of `gross` right now.
    pub async fn preview_credit_for_month(&self, member_id: Uuid, gross: i64) -> Result<i64> {
        if gross < 0 {
            return Err(EngineError::validation("Fee amount cannot be negative"));
        }
        let mut conn = self.store.acquire().await?;
        load_member(&mut conn, member_id).await?;
        self.referrals
            .preview(&mut conn, member_id, gross, self.clock.now())
            .await
    }

    pub async fn referrals_made(&self, member_id: Uuid) -> Result<Vec<Referral>> {
        let mut conn = self.store.acquire().await?;
        Ok(referrals::list_for_referrer(&mut conn, member_id).await?)
    }

    pub async fn referral_summary(&self, member_id: Uuid) -> Result<ReferralSummary> {
        let mut conn = self.store.acquire().await?;
        load_member(&mut conn, member_id).await?;
        self.referrals
            .summary(&mut conn, member_id, self.clock.now())
            .await
    }

    /// Verify the member's fee for the current month.
    #[tracing::instrument(name = "circles.verify_fee_payment", skip_all, fields(%member_id))]
    pub async fn verify_fee_payment(&self, member_id: Uuid) -> Result<FeePayment> {
        let now = self.clock.now();
        let month = self.clock.current_month();
        let mut conn = self.store.begin_immediate().await?;
        let result = self
            .fees
            .verify(&mut conn, &self.referrals, member_id, month, now)
            .await;
        SqliteStore::finish(&mut conn, result).await
    }

    pub async fn fee_status(&self, member_id: Uuid) -> Result<FeeStatus> {
        let mut conn = self.store.acquire().await?;
        self.fees
            .status(&mut conn, member_id, self.clock.current_month())
            .await
    }

    pub async fn fee_history(&self, member_id: Uuid) -> Result<Vec<FeePayment>> {
        let mut conn = self.store.acquire().await?;
        load_member(&mut conn, member_id).await?;
        Ok(fee_payments::list_for_member(&mut conn, member_id).await?)
    }
}

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, info, trace, warn};

use crate::commit_tracker::CommitTracker;
use crate::config::Config;
use crate::message::{
    AggregatedMessages, HareMessage, InstanceId, MessageBuilder, MessageType, PROTOCOL_NAME,
};
use crate::network::NetworkService;
use crate::notify_tracker::NotifyTracker;
use crate::oracle::Rolacle;
use crate::pre_round_tracker::PreRoundTracker;
use crate::set::Set;
use crate::signing::{PubKey, Signing};
use crate::status_tracker::StatusTracker;
use crate::{Error, Result};

/// Everything one instance mutates. Owned by the instance's event loop, never shared.
pub(super) struct RoundState {
    pub(super) cfg: Config,
    pub(super) instance_id: InstanceId,
    pub(super) pub_key: PubKey,
    /// The working set, refined as the instance progresses.
    pub(super) s: Set,
    pub(super) k: u32,
    /// Present until the pre-round ends.
    pub(super) pre_round: Option<PreRoundTracker>,
    pub(super) status_tracker: StatusTracker,
    /// Status tracker of the round that just ended, consumed by our proposal.
    pub(super) closed_statuses: Option<StatusTracker>,
    pub(super) proposal: Option<HareMessage>,
    pub(super) commit_tracker: Option<CommitTracker>,
    pub(super) notify_tracker: NotifyTracker,
    pub(super) certificate: Option<AggregatedMessages>,
    pub(super) result: Option<Set>,
    oracle: Arc<dyn Rolacle>,
    signing: Arc<dyn Signing>,
    network: Arc<dyn NetworkService>,
}

impl RoundState {
    pub(super) fn new(
        cfg: Config,
        instance_id: InstanceId,
        s: Set,
        oracle: Arc<dyn Rolacle>,
        signing: Arc<dyn Signing>,
        network: Arc<dyn NetworkService>,
    ) -> Self {
        Self {
            pub_key: signing.public_key(),
            pre_round: Some(PreRoundTracker::new(cfg.pre_round_threshold(), cfg.n)),
            status_tracker: StatusTracker::new(cfg.threshold, cfg.n),
            closed_statuses: None,
            proposal: None,
            commit_tracker: None,
            notify_tracker: NotifyTracker::new(cfg.threshold, cfg.n),
            certificate: None,
            result: None,
            k: 0,
            instance_id,
            s,
            cfg,
            oracle,
            signing,
            network,
        }
    }

    pub(super) fn iteration(&self) -> u32 {
        self.k / 4
    }

    pub(super) fn take_result(&mut self) -> Option<Set> {
        self.result.take()
    }

    fn tag(&self) -> String {
        format!("[HARE-{}-{}]", self.instance_id, self.pub_key.short())
    }

    /// Whether `msg` may be processed in the current round.
    ///
    /// Notify matches everywhere so that a peer lagging behind can still
    /// learn about a finished instance. Pre-round messages match everywhere
    /// too, but are only applied during the pre-round.
    pub(super) fn does_message_match_round(&self, msg: &HareMessage) -> bool {
        let current = MessageType::for_round(self.k);
        match msg.msg_type() {
            MessageType::PreRound => true,
            MessageType::Status => current == MessageType::Status,
            MessageType::Proposal => {
                current == MessageType::Proposal || current == MessageType::Commit
            }
            MessageType::Commit => current == MessageType::Commit,
            MessageType::Notify => true,
        }
    }

    /// Ends the pre-round, or moves to the next round.
    pub(super) fn advance(&mut self) {
        match self.pre_round.take() {
            Some(tracker) => {
                let filtered = tracker.filter_set(&self.s);
                info!(
                    "{} pre-round over, kept {} of {} values",
                    self.tag(),
                    filtered.len(),
                    self.s.len()
                );
                self.s = filtered;
                self.begin_round();
            }
            None => self.next_round(),
        }
    }

    pub(super) fn next_round(&mut self) {
        self.k += 1;
        self.begin_round();
    }

    /// Rolls over the per-round state when round `k` begins.
    fn begin_round(&mut self) {
        debug!("{} entering round {} ({:?})", self.tag(), self.k, MessageType::for_round(self.k));

        match MessageType::for_round(self.k) {
            MessageType::Status => {
                self.proposal = None;
                self.commit_tracker = None;
                self.closed_statuses = None;
            }
            MessageType::Proposal => {
                let fresh = StatusTracker::new(self.cfg.threshold, self.cfg.n);
                self.closed_statuses = Some(std::mem::replace(&mut self.status_tracker, fresh));
            }
            MessageType::Commit => {}
            MessageType::Notify => {
                let cert = self
                    .commit_tracker
                    .as_ref()
                    .and_then(CommitTracker::build_certificate);
                if let (Some(cert), Some(proposal)) = (cert, &self.proposal) {
                    info!("{} got a commit certificate for {:?}", self.tag(), proposal.values());
                    self.s = proposal.values();
                    self.certificate = Some(cert);
                }
            }
            MessageType::PreRound => unreachable!("no round number maps to the pre-round"),
        }
    }

    /// Broadcasts our message for the current round, if we have one to send.
    pub(super) fn send_round_messages(&mut self) -> Result<()> {
        if self.pre_round.is_some() {
            let msg = self.build(MessageType::PreRound, &self.s)?.build();
            return self.broadcast(msg);
        }

        match MessageType::for_round(self.k) {
            MessageType::Status => {
                let msg = self.build(MessageType::Status, &self.s)?.build();
                self.broadcast(msg)
            }
            MessageType::Proposal => {
                let statuses = match self.closed_statuses.take() {
                    Some(statuses) => statuses,
                    None => return Ok(()),
                };
                let svp = match statuses.build_svp() {
                    Some(svp) => svp,
                    None => {
                        debug!("{} no SVP, {} statuses", self.tag(), statuses.len());
                        return Ok(());
                    }
                };
                if !self.is_eligible() {
                    return Ok(());
                }
                let union = statuses.build_union_set(self.cfg.set_size);
                let msg = self
                    .build(MessageType::Proposal, &union)?
                    .set_svp(svp)
                    .build();
                self.broadcast(msg)
            }
            MessageType::Commit => {
                let proposed = match &self.proposal {
                    Some(proposal) => proposal.values(),
                    None => return Ok(()),
                };
                if !self.is_eligible() {
                    return Ok(());
                }
                let msg = self.build(MessageType::Commit, &proposed)?.build();
                self.broadcast(msg)
            }
            MessageType::Notify => {
                let cert = match &self.certificate {
                    Some(cert) => cert.clone(),
                    None => return Ok(()),
                };
                if !self.is_eligible() {
                    return Ok(());
                }
                let msg = self
                    .build(MessageType::Notify, &self.s)?
                    .set_certificate(cert)
                    .build();
                self.broadcast(msg)
            }
            MessageType::PreRound => unreachable!("no round number maps to the pre-round"),
        }
    }

    /// Protocol mismatches are dropped and answered with `Ok`, an `Err` means
    /// the message failed authentication or carried invalid evidence.
    pub(super) fn handle_message(&mut self, msg: HareMessage) -> Result<()> {
        if msg.instance_id() != self.instance_id {
            warn!("{} message for instance {} dropped", self.tag(), msg.instance_id());
            return Ok(());
        }

        if !carries_own_round(&msg) {
            warn!("{} {:?} carries a round of another type", self.tag(), msg);
            return Ok(());
        }

        if !self.does_message_match_round(&msg) {
            warn!("{} {:?} does not match round {}", self.tag(), msg, self.k);
            return Ok(());
        }

        if self.is_stale(&msg) {
            trace!("{} {:?} is from another iteration", self.tag(), msg);
            return Ok(());
        }

        msg.validate_signature(self.signing.as_ref())?;

        match msg.msg_type() {
            MessageType::PreRound => {
                match &mut self.pre_round {
                    Some(tracker) => tracker.on_pre_round(&msg),
                    None => trace!("{} pre-round is over, ignoring {:?}", self.tag(), msg),
                }
                Ok(())
            }
            MessageType::Status => {
                self.status_tracker.record_status(msg);
                Ok(())
            }
            MessageType::Proposal => self.on_proposal(msg),
            MessageType::Commit => self.on_commit(msg),
            MessageType::Notify => self.on_notify(msg),
        }
    }

    fn is_stale(&self, msg: &HareMessage) -> bool {
        match msg.msg_type() {
            MessageType::Status | MessageType::Proposal | MessageType::Commit => {
                msg.k() / 4 != self.iteration()
            }
            MessageType::PreRound | MessageType::Notify => false,
        }
    }

    fn sender_is_eligible(&self, msg: &HareMessage) -> Result<bool> {
        Ok(self
            .oracle
            .eligible(self.instance_id, msg.k(), &msg.sender()?))
    }

    fn on_proposal(&mut self, msg: HareMessage) -> Result<()> {
        if !self.sender_is_eligible(&msg)? {
            warn!("{} proposal from ineligible sender dropped: {:?}", self.tag(), msg);
            return Ok(());
        }

        let svp = msg
            .svp
            .as_ref()
            .ok_or_else(|| Error::InvalidSvp("proposal without SVP".to_string()))?;
        self.validate_svp(&msg, svp)?;

        let proposed = msg.values();
        if let Some(current) = &self.proposal {
            let late = MessageType::for_round(self.k) != MessageType::Proposal;
            if late || current.values().id() <= proposed.id() {
                trace!("{} keeping proposal {:?}", self.tag(), current.values());
                return Ok(());
            }
        }

        info!("{} accepted proposal {:?}", self.tag(), proposed);
        self.commit_tracker = Some(CommitTracker::new(self.cfg.threshold, proposed.id()));
        self.proposal = Some(msg);
        Ok(())
    }

    fn validate_svp(&self, proposal: &HareMessage, svp: &AggregatedMessages) -> Result<()> {
        if svp.messages.len() != self.cfg.threshold {
            return Err(Error::InvalidSvp(format!(
                "expected {} statuses, got {}",
                self.cfg.threshold,
                svp.messages.len()
            )));
        }

        let senders = BTreeSet::from_iter(svp.messages.iter().map(|m| &m.pub_key));
        if senders.len() != svp.messages.len() {
            return Err(Error::InvalidSvp("repeated status sender".to_string()));
        }

        let mut union = Set::new_empty(self.cfg.set_size);
        for status in svp.messages.iter() {
            if status.msg_type() != MessageType::Status
                || !carries_own_round(status)
                || status.instance_id() != self.instance_id
                || status.k() / 4 != proposal.k() / 4
            {
                return Err(Error::InvalidSvp(format!("unexpected {:?}", status)));
            }
            status.validate_signature(self.signing.as_ref())?;
            union.extend(status.inner.values.iter().copied());
        }

        if !union.equals(&proposal.values()) {
            return Err(Error::InvalidSvp(
                "proposed set is not the union of its statuses".to_string(),
            ));
        }
        Ok(())
    }

    fn on_commit(&mut self, msg: HareMessage) -> Result<()> {
        if !self.sender_is_eligible(&msg)? {
            warn!("{} commit from ineligible sender dropped: {:?}", self.tag(), msg);
            return Ok(());
        }

        match &mut self.commit_tracker {
            Some(tracker) => tracker.on_commit(msg),
            None => debug!("{} no proposal to count {:?} against", self.tag(), msg),
        }
        Ok(())
    }

    fn on_notify(&mut self, msg: HareMessage) -> Result<()> {
        if !self.sender_is_eligible(&msg)? {
            warn!("{} notify from ineligible sender dropped: {:?}", self.tag(), msg);
            return Ok(());
        }

        let set = msg.values();
        let cert = msg
            .cert
            .as_ref()
            .ok_or_else(|| Error::InvalidCertificate("notify without certificate".to_string()))?;
        let cert_round = self.validate_certificate(&set, cert)?;

        let newer = match &self.certificate {
            Some(ours) => cert_round > certificate_round(ours),
            None => true,
        };
        if newer {
            info!("{} adopting certified set {:?}", self.tag(), set);
            self.s = set.clone();
            self.certificate = Some(cert.clone());
        }

        if self.notify_tracker.on_notify(&msg) {
            info!("{} notify quorum reached on {:?}", self.tag(), set);
            self.result = Some(set);
        }
        Ok(())
    }

    /// Returns the round in which the certified commits were sent.
    fn validate_certificate(&self, set: &Set, cert: &AggregatedMessages) -> Result<u32> {
        if cert.messages.len() != self.cfg.threshold {
            return Err(Error::InvalidCertificate(format!(
                "expected {} commits, got {}",
                self.cfg.threshold,
                cert.messages.len()
            )));
        }

        let senders = BTreeSet::from_iter(cert.messages.iter().map(|m| &m.pub_key));
        if senders.len() != cert.messages.len() {
            return Err(Error::InvalidCertificate("repeated commit sender".to_string()));
        }

        let round = certificate_round(cert);
        let set_id = set.id();
        for commit in cert.messages.iter() {
            if commit.msg_type() != MessageType::Commit
                || !carries_own_round(commit)
                || commit.instance_id() != self.instance_id
                || commit.k() != round
                || commit.values().id() != set_id
            {
                return Err(Error::InvalidCertificate(format!("unexpected {:?}", commit)));
            }
            commit.validate_signature(self.signing.as_ref())?;
        }
        Ok(round)
    }

    fn is_eligible(&self) -> bool {
        let eligible = self.oracle.eligible(self.instance_id, self.k, &self.pub_key);
        if !eligible {
            debug!("{} not eligible in round {}", self.tag(), self.k);
        }
        eligible
    }

    fn build(&self, msg_type: MessageType, values: &Set) -> Result<MessageBuilder> {
        MessageBuilder::new()
            .set_type(msg_type)
            .set_instance_id(self.instance_id)
            .set_round(self.k)
            .set_pub_key(&self.pub_key)
            .set_values(values)
            .sign(self.signing.as_ref())
    }

    // broadcast sends `msg` to every peer and processes it locally, so our own
    // messages count towards our quorums.
    fn broadcast(&mut self, msg: HareMessage) -> Result<()> {
        debug!("{} broadcasting {:?}", self.tag(), msg);
        self.network.broadcast(PROTOCOL_NAME, msg.to_bytes()?)?;
        self.handle_message(msg)
    }
}

/// Every type but PreRound is only ever sent in the round `k` maps to, so
/// the oracle is never asked about a round the sender could not send in.
fn carries_own_round(msg: &HareMessage) -> bool {
    match msg.msg_type() {
        MessageType::PreRound => true,
        msg_type => MessageType::for_round(msg.k()) == msg_type,
    }
}

fn certificate_round(cert: &AggregatedMessages) -> u32 {
    cert.messages.first().map(HareMessage::k).unwrap_or_default()
}

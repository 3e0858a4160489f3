//! Invitation receipt

use super::{AcceptedInvitation, OutOfBandEngine, ReceiveInvitationConfig};
use crate::error::{OutOfBandError, Result};
use crate::invitation::OutOfBandInvitation;
use crate::record::{OutOfBandRecord, OutOfBandRole, OutOfBandState};

impl OutOfBandEngine {
    /// Parse an `oob`, `c_i` or `d_m` invitation URL
    pub fn parse_invitation(&self, invitation_url: &str) -> Result<OutOfBandInvitation> {
        crate::url::parse_invitation(invitation_url)
    }

    /// Parse an invitation URL and receive the invitation
    pub async fn receive_invitation_from_url(
        &self,
        invitation_url: &str,
        config: ReceiveInvitationConfig,
    ) -> Result<AcceptedInvitation> {
        let invitation = self.parse_invitation(invitation_url)?;
        self.receive_invitation(invitation, config).await
    }

    /// Persist a receiver record for `invitation`, accepting it unless disabled
    pub async fn receive_invitation(
        &self,
        invitation: OutOfBandInvitation,
        config: ReceiveInvitationConfig,
    ) -> Result<AcceptedInvitation> {
        invitation.validate()?;

        if self
            .store
            .find_by_invitation_id(&invitation.id, OutOfBandRole::Sender)
            .await?
            .is_some()
        {
            return Err(OutOfBandError::AlreadyReceived {
                invitation_id: invitation.id,
                reason: "created by this agent".to_string(),
            });
        }
        if self
            .store
            .find_by_invitation_id(&invitation.id, OutOfBandRole::Receiver)
            .await?
            .is_some()
        {
            return Err(OutOfBandError::AlreadyReceived {
                invitation_id: invitation.id,
                reason: "received".to_string(),
            });
        }

        let mut record =
            OutOfBandRecord::new(OutOfBandRole::Receiver, OutOfBandState::Initial, invitation);
        record.auto_accept_connection = config
            .auto_accept_connection
            .unwrap_or(self.config.auto_accept_connections);

        self.store.save(&record).await?;
        self.events.state_changed(&record, None);

        tracing::info!(
            record_id = %record.id,
            invitation_id = %record.invitation_id(),
            label = ?record.out_of_band_invitation.label,
            "Received out-of-band invitation"
        );

        if config.auto_accept_invitation.unwrap_or(true) {
            self.accept_invitation(&record.id, config.into()).await
        } else {
            Ok(AcceptedInvitation {
                record,
                connection: None,
            })
        }
    }
}
